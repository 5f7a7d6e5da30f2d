//! Image-based text extraction through the completion service.
//!
//! Used when a PDF has no usable text layer (scanned reports, thermal camera
//! exports). Each rendered page is sent with the OCR instruction and an inline
//! PNG; the transcriptions are assembled with the same page markers as the
//! text path, so downstream stages cannot tell the two apart.
//!
//! Calls run with bounded concurrency via `buffered`, which yields results in
//! submission order, so page order is preserved without sorting.

use crate::artifacts::Stage;
use crate::error::DdrError;
use crate::pipeline::extract::{assemble_pages, PageImage};
use crate::progress::ProgressCallback;
use crate::service::{CompletionRequest, CompletionService, InlineImage};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

/// Transcribe every page image and assemble the page-delimited text.
///
/// Unlike analysis, an empty transcription is accepted: a blank page has no
/// text to return. Any failed call aborts the whole document.
pub async fn transcribe_pages(
    service: &dyn CompletionService,
    images: &[PageImage],
    prompt: &str,
    concurrency: usize,
    stage: Stage,
    progress: Option<&ProgressCallback>,
) -> Result<String, DdrError> {
    let total = images.len();

    let texts: Vec<String> = stream::iter(images.iter().map(|image| async move {
        let request =
            CompletionRequest::text(prompt).with_image(InlineImage::png(image.png.clone()));

        let completion = service.complete(&request).await.map_err(|e| {
            warn!("Page {}/{}: transcription failed - {}", image.page_num, total, e);
            e
        })?;

        debug!(
            "Page {}/{}: {} characters transcribed",
            image.page_num,
            total,
            completion.text.chars().count()
        );
        if let Some(cb) = progress {
            cb.on_page_ocr(stage, image.page_num, total);
        }
        Ok::<_, DdrError>(completion.text)
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await?;

    Ok(assemble_pages(&texts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Completion;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echoes the first image byte back, slower for earlier pages.
    struct EchoFirstByte {
        seen_prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for EchoFirstByte {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
            self.seen_prompts
                .lock()
                .unwrap()
                .push(request.prompt.clone());
            let byte = request.images[0].data[0];
            tokio::time::sleep(Duration::from_millis(u64::from(10 - byte) * 5)).await;
            Ok(Completion::from_text(format!("text of page {byte}")))
        }
    }

    #[tokio::test]
    async fn transcriptions_keep_page_order_under_concurrency() {
        let service = EchoFirstByte {
            seen_prompts: Mutex::new(Vec::new()),
        };
        let images: Vec<PageImage> = (1..=4u8)
            .map(|n| PageImage {
                page_num: n as usize,
                png: vec![n],
            })
            .collect();

        let text = transcribe_pages(&service, &images, "read it", 4, Stage::ExtractThermal, None)
            .await
            .unwrap();

        let positions: Vec<usize> = (1..=4)
            .map(|n| text.find(&format!("text of page {n}")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(text.matches("========== PAGE ").count(), 4);
        assert!(service
            .seen_prompts
            .lock()
            .unwrap()
            .iter()
            .all(|p| p == "read it"));
    }

    struct FailOnPage(u8);

    #[async_trait]
    impl CompletionService for FailOnPage {
        fn name(&self) -> &str {
            "fail"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
            if request.images[0].data[0] == self.0 {
                Err(DdrError::ServiceFailed {
                    service: "fail".into(),
                    message: "quota".into(),
                })
            } else {
                Ok(Completion::from_text(""))
            }
        }
    }

    #[tokio::test]
    async fn one_failed_page_fails_the_document() {
        let images: Vec<PageImage> = (1..=3u8)
            .map(|n| PageImage {
                page_num: n as usize,
                png: vec![n],
            })
            .collect();
        let err = transcribe_pages(&FailOnPage(2), &images, "p", 1, Stage::ExtractInspection, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }
}
