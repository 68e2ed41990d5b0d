//! Page rasterization and OCR backends.

use async_trait::async_trait;
use lectern_core::ExtractError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Settings for the PDF OCR pipeline.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// `pdftoppm` executable
    pub pdftoppm: PathBuf,
    /// `tesseract` executable
    pub tesseract: PathBuf,
    /// Tesseract language code
    pub language: String,
    /// Rasterization resolution
    pub dpi: u32,
    /// Time allowed to recognize a single page
    pub page_timeout: Duration,
    /// Pages recognized concurrently
    pub max_workers: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            dpi: 200,
            page_timeout: Duration::from_secs(30),
            max_workers: 4,
        }
    }
}

/// Renders the pages of a PDF to image files.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Write one image per page into `out_dir` and return their paths in page order.
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError>;
}

/// Reads the text of a single page image.
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, ExtractError>;
}

// ============================================================================
// poppler
// ============================================================================

/// Rasterizer shelling out to poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    program: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            program: program.into(),
            dpi,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let output = Command::new(&self.program)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(out_dir.join("page"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExtractError::Ocr(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Failed(format!(
                "pdftoppm failed on {}: {}",
                pdf.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_pages(out_dir).await?;
        debug!("Rasterized {} pages from {:?}", pages.len(), pdf);
        Ok(pages)
    }
}

/// List `page-N.png` files in `dir`, ordered by page number.
///
/// `pdftoppm` zero-pads N to the width of the page count, so pages are ordered
/// by the parsed number rather than the file name.
async fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(number) = page_number(&path) {
            pages.push((number, path));
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if !path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
    {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix("page-")?
        .parse()
        .ok()
}

// ============================================================================
// tesseract
// ============================================================================

/// Recognizer shelling out to `tesseract <image> stdout -l <lang>`.
pub struct TesseractRecognizer {
    program: PathBuf,
    language: String,
}

impl TesseractRecognizer {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl PageRecognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path) -> Result<String, ExtractError> {
        // Dropping the future (page timeout) kills the child.
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ExtractError::Ocr(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Ocr(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
