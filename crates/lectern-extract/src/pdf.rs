//! OCR-based PDF extractor.
//!
//! Rasterizes every page, then recognizes pages concurrently on a bounded
//! worker pool. Each page has its own timeout; slow or failing pages leave a
//! marker in the output and the rest of the document is kept.

use async_trait::async_trait;
use lectern_core::{ContentExtractor, ExtractError, ExtractedContent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::ocr::{OcrConfig, PageRasterizer, PageRecognizer, PdftoppmRasterizer, TesseractRecognizer};

/// Text inserted for a page whose recognition exceeded the timeout.
pub const TIMEOUT_MARKER: &str = "\n[Timeout]\n";

/// Extractor for PDF files using page OCR.
pub struct PdfOcrExtractor {
    rasterizer: Arc<dyn PageRasterizer>,
    recognizer: Arc<dyn PageRecognizer>,
    page_timeout: Duration,
    max_workers: usize,
}

impl PdfOcrExtractor {
    /// Create an extractor using `pdftoppm` and `tesseract`.
    #[must_use]
    pub fn new(config: &OcrConfig) -> Self {
        Self::with_backends(
            Arc::new(PdftoppmRasterizer::new(config.pdftoppm.clone(), config.dpi)),
            Arc::new(TesseractRecognizer::new(
                config.tesseract.clone(),
                config.language.clone(),
            )),
            config.page_timeout,
            config.max_workers,
        )
    }

    /// Create an extractor with custom rasterization and recognition backends.
    #[must_use]
    pub fn with_backends(
        rasterizer: Arc<dyn PageRasterizer>,
        recognizer: Arc<dyn PageRecognizer>,
        page_timeout: Duration,
        max_workers: usize,
    ) -> Self {
        Self {
            rasterizer,
            recognizer,
            page_timeout,
            max_workers: max_workers.max(1),
        }
    }

    async fn recognize_pages(&self, pdf: &Path, pages: Vec<PathBuf>) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = Vec::with_capacity(pages.len());

        for (index, image) in pages.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let recognizer = self.recognizer.clone();
            let page_timeout = self.page_timeout;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ExtractError::Failed(format!("worker pool closed: {e}")))?;

                match tokio::time::timeout(page_timeout, recognizer.recognize(&image)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExtractError::Timeout {
                        page: index as u32 + 1,
                        secs: page_timeout.as_secs(),
                    }),
                }
            }));
        }

        let mut texts = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let page = index + 1;
            let text = match task.await {
                Ok(Ok(text)) => text,
                Ok(Err(ExtractError::Timeout { .. })) => {
                    warn!("Timeout processing page {} of {:?}", page, pdf);
                    TIMEOUT_MARKER.to_string()
                }
                Ok(Err(e)) => {
                    warn!("Error processing page {} of {:?}: {}", page, pdf, e);
                    error_marker(&e.to_string())
                }
                Err(e) => {
                    warn!("OCR task for page {} of {:?} panicked: {}", page, pdf, e);
                    error_marker(&e.to_string())
                }
            };
            texts.push(text);
        }
        texts
    }
}

fn error_marker(message: &str) -> String {
    format!("\n[Error: {message}]\n")
}

#[async_trait]
impl ContentExtractor for PdfOcrExtractor {
    fn name(&self) -> &str {
        "pdf-ocr"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractError> {
        debug!("Extracting PDF with OCR: {:?}", path);

        let scratch = tempfile::tempdir()?;
        let pages = self.rasterizer.rasterize(path, scratch.path()).await?;
        let page_count = pages.len() as u32;

        let texts = self.recognize_pages(path, pages).await;
        let text = texts.concat().trim().to_string();

        debug!("OCR produced {} chars from {} pages", text.len(), page_count);
        Ok(ExtractedContent {
            text,
            page_count: Some(page_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pretends the PDF has the given pages; writes nothing.
    struct StubRasterizer {
        pages: usize,
    }

    #[async_trait]
    impl PageRasterizer for StubRasterizer {
        async fn rasterize(
            &self,
            _pdf: &Path,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, ExtractError> {
            Ok((1..=self.pages)
                .map(|n| out_dir.join(format!("page-{n}.png")))
                .collect())
        }
    }

    struct FailingRasterizer;

    #[async_trait]
    impl PageRasterizer for FailingRasterizer {
        async fn rasterize(&self, _pdf: &Path, _out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
            Err(ExtractError::Failed("not a pdf".to_string()))
        }
    }

    enum PageBehavior {
        Text(&'static str),
        Delay(Duration, &'static str),
        Fail(&'static str),
    }

    /// Recognizer scripted per page file name; tracks peak concurrency.
    struct StubRecognizer {
        pages: HashMap<String, PageBehavior>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubRecognizer {
        fn new(pages: Vec<(&str, PageBehavior)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(name, behavior)| (name.to_string(), behavior))
                    .collect(),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRecognizer for StubRecognizer {
        async fn recognize(&self, image: &Path) -> Result<String, ExtractError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let name = image.file_name().unwrap().to_string_lossy().into_owned();
            let result = match self.pages.get(&name) {
                Some(PageBehavior::Text(text)) => Ok((*text).to_string()),
                Some(PageBehavior::Delay(delay, text)) => {
                    tokio::time::sleep(*delay).await;
                    Ok((*text).to_string())
                }
                Some(PageBehavior::Fail(msg)) => Err(ExtractError::Ocr((*msg).to_string())),
                None => Ok(String::new()),
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn extractor(pages: usize, recognizer: Arc<StubRecognizer>, timeout: Duration, workers: usize) -> PdfOcrExtractor {
        PdfOcrExtractor::with_backends(
            Arc::new(StubRasterizer { pages }),
            recognizer,
            timeout,
            workers,
        )
    }

    #[test]
    fn test_handles_pdf_extension() {
        let extractor = PdfOcrExtractor::new(&OcrConfig::default());
        assert!(extractor.can_extract(Path::new("lecture.PDF")));
        assert!(!extractor.can_extract(Path::new("lecture.txt")));
    }

    #[tokio::test]
    async fn test_pages_concatenated_in_order() {
        let recognizer = Arc::new(StubRecognizer::new(vec![
            ("page-1.png", PageBehavior::Delay(Duration::from_millis(50), "First page. ")),
            ("page-2.png", PageBehavior::Text("Second page. ")),
            ("page-3.png", PageBehavior::Text("Third page.\n")),
        ]));
        let extractor = extractor(3, recognizer, Duration::from_secs(5), 4);

        let content = extractor.extract(Path::new("notes.pdf")).await.unwrap();
        assert_eq!(content.text, "First page. Second page. Third page.");
        assert_eq!(content.page_count, Some(3));
    }

    #[tokio::test]
    async fn test_timed_out_page_leaves_marker() {
        let recognizer = Arc::new(StubRecognizer::new(vec![
            ("page-1.png", PageBehavior::Text("Intro")),
            ("page-2.png", PageBehavior::Delay(Duration::from_secs(10), "never")),
            ("page-3.png", PageBehavior::Text("Outro")),
        ]));
        let extractor = extractor(3, recognizer, Duration::from_millis(100), 4);

        let content = extractor.extract(Path::new("notes.pdf")).await.unwrap();
        assert_eq!(content.text, "Intro\n[Timeout]\nOutro");
    }

    #[tokio::test]
    async fn test_failed_page_leaves_error_marker() {
        let recognizer = Arc::new(StubRecognizer::new(vec![
            ("page-1.png", PageBehavior::Fail("bad image")),
            ("page-2.png", PageBehavior::Text("Readable")),
        ]));
        let extractor = extractor(2, recognizer, Duration::from_secs(5), 2);

        let content = extractor.extract(Path::new("notes.pdf")).await.unwrap();
        assert_eq!(content.text, "[Error: ocr failed: bad image]\nReadable");
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let pages: Vec<String> = (1..=8).map(|n| format!("page-{n}.png")).collect();
        let recognizer = Arc::new(StubRecognizer::new(
            pages
                .iter()
                .map(|name| (name.as_str(), PageBehavior::Delay(Duration::from_millis(30), "x")))
                .collect(),
        ));
        let extractor = extractor(8, recognizer.clone(), Duration::from_secs(5), 2);

        let content = extractor.extract(Path::new("notes.pdf")).await.unwrap();
        assert_eq!(content.text, "xxxxxxxx");
        assert!(recognizer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_pdf_yields_empty_text() {
        let recognizer = Arc::new(StubRecognizer::new(vec![]));
        let extractor = extractor(0, recognizer, Duration::from_secs(1), 4);

        let content = extractor.extract(Path::new("blank.pdf")).await.unwrap();
        assert!(content.text.is_empty());
        assert_eq!(content.page_count, Some(0));
    }

    #[tokio::test]
    async fn test_rasterization_failure_fails_document() {
        let extractor = PdfOcrExtractor::with_backends(
            Arc::new(FailingRasterizer),
            Arc::new(StubRecognizer::new(vec![])),
            Duration::from_secs(1),
            4,
        );

        let result = extractor.extract(Path::new("broken.pdf")).await;
        assert!(matches!(result, Err(ExtractError::Failed(_))));
    }
}
