//! Document extraction: PDF → page-delimited text, or PDF → page images.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not safe to drive
//! from async worker threads. Both operations bind pdfium, open the document
//! and walk its pages inside `tokio::task::spawn_blocking`.
//!
//! The [`DocumentExtractor`] trait is the seam the orchestrator depends on;
//! [`PdfiumExtractor`] is the production implementation. Page assembly
//! ([`assemble_pages`]) and image persistence ([`write_page_images`]) are
//! plain functions shared by every implementation, so the marker and file-name
//! invariants hold no matter where the pages came from.

use crate::artifacts::{ensure_output_dir, write_atomic};
use crate::config::PipelineConfig;
use crate::error::DdrError;
use crate::pipeline::{encode, input};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or directory.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page index.
    pub page_num: usize,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

/// Source of page text and page images.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// The text layer of every page, in page order.
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>, DdrError>;

    /// Every page rendered to PNG, in page order, numbered from 1.
    async fn render_pages(&self, path: &Path) -> Result<Vec<PageImage>, DdrError>;
}

/// The separator line placed before page `page_num`.
pub fn page_marker(page_num: usize) -> String {
    format!("========== PAGE {page_num} ==========")
}

/// Concatenate page texts, each beneath its [`page_marker`].
pub fn assemble_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut out = String::new();
    for (i, text) in pages.iter().enumerate() {
        out.push_str("\n\n");
        out.push_str(&page_marker(i + 1));
        out.push_str("\n\n");
        out.push_str(text.as_ref());
    }
    out
}

/// Extract the full document text with page markers.
pub async fn extract_text(
    extractor: &dyn DocumentExtractor,
    path: &Path,
) -> Result<String, DdrError> {
    let pages = extractor.page_texts(path).await?;
    let text = assemble_pages(&pages);
    info!(
        "Extracted {} pages, {} characters from {}",
        pages.len(),
        text.chars().count(),
        path.display()
    );
    Ok(text)
}

/// Whether a text layer is too thin to be worth analysing.
///
/// True when the average number of non-whitespace characters per page is
/// below `min_chars_per_page`. An empty document is never sparse: there is
/// nothing to transcribe either way.
pub fn is_sparse<S: AsRef<str>>(pages: &[S], min_chars_per_page: usize) -> bool {
    if pages.is_empty() {
        return false;
    }
    let total: usize = pages
        .iter()
        .map(|p| p.as_ref().chars().filter(|c| !c.is_whitespace()).count())
        .sum();
    total < min_chars_per_page.saturating_mul(pages.len())
}

/// File name for a rendered page.
pub fn page_image_file_name(page_num: usize) -> String {
    format!("page_{page_num}.png")
}

/// Write each image to `dir/page_<n>.png` and return the paths in page order.
pub async fn write_page_images(dir: &Path, images: &[PageImage]) -> Result<Vec<PathBuf>, DdrError> {
    ensure_output_dir(dir).await?;

    let mut paths = Vec::with_capacity(images.len());
    for image in images {
        let path = dir.join(page_image_file_name(image.page_num));
        write_atomic(&path, &image.png).await?;
        info!("Saved: {}", path.display());
        paths.push(path);
    }
    Ok(paths)
}

// ── pdfium implementation ────────────────────────────────────────────────

/// [`DocumentExtractor`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    /// Library file or directory; see [`bind_pdfium`].
    pub library: Option<PathBuf>,
    pub password: Option<String>,
    pub dpi: u32,
    pub max_rendered_pixels: u32,
}

impl PdfiumExtractor {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            library: config.pdfium_library.clone(),
            password: config.password.clone(),
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }
}

#[async_trait]
impl DocumentExtractor for PdfiumExtractor {
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>, DdrError> {
        input::validate_pdf(path)?;
        let this = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || this.page_texts_blocking(&path))
            .await
            .map_err(|e| DdrError::Internal(format!("Extraction task panicked: {}", e)))?
    }

    async fn render_pages(&self, path: &Path) -> Result<Vec<PageImage>, DdrError> {
        input::validate_pdf(path)?;
        let this = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || this.render_pages_blocking(&path))
            .await
            .map_err(|e| DdrError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumExtractor {
    fn page_texts_blocking(&self, path: &Path) -> Result<Vec<String>, DdrError> {
        let pdfium = bind_pdfium(self.library.as_deref())?;
        let document = open_document(&pdfium, path, self.password.as_deref())?;

        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| DdrError::TextExtractionFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?
                .all();
            debug!("Page {}: {} characters", idx + 1, text.chars().count());
            texts.push(text);
        }
        Ok(texts)
    }

    fn render_pages_blocking(&self, path: &Path) -> Result<Vec<PageImage>, DdrError> {
        let pdfium = bind_pdfium(self.library.as_deref())?;
        let document = open_document(&pdfium, path, self.password.as_deref())?;

        let max_px = self.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(max_px)
            .set_maximum_height(max_px);

        let pages = document.pages();
        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DdrError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let png = encode::encode_png(&bitmap.as_image()).map_err(|e| {
                DdrError::RasterisationFailed {
                    page: page_num,
                    detail: format!("PNG encoding failed: {}", e),
                }
            })?;
            debug!("Rendered page {} → {} PNG bytes", page_num, png.len());
            images.push(PageImage { page_num, png });
        }
        Ok(images)
    }
}

/// Bind to a pdfium shared library.
///
/// Resolution order: `explicit`, then [`PDFIUM_LIB_ENV`], then the working
/// directory, then the system library search path. A directory is resolved to
/// the platform library name inside it.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, DdrError> {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    let bindings = match configured {
        Some(path) => {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DdrError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, DdrError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            if password.is_some() {
                DdrError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                DdrError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        }
        other => DdrError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{:?}", other),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_places_one_marker_per_page_in_order() {
        let text = assemble_pages(&["alpha", "", "gamma"]);
        let markers: Vec<usize> = (1..=3)
            .map(|n| text.find(&page_marker(n)).expect("marker present"))
            .collect();
        assert!(markers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(text.matches("========== PAGE ").count(), 3);
        assert!(text.contains("PAGE 1 ==========\n\nalpha"));
        assert!(text.ends_with("PAGE 3 ==========\n\ngamma"));
    }

    #[test]
    fn assemble_empty_document_is_empty() {
        assert_eq!(assemble_pages::<&str>(&[]), "");
    }

    #[test]
    fn sparse_detection_uses_average_per_page() {
        assert!(is_sparse(&["  \n", "ab"], 16));
        assert!(!is_sparse(&["a".repeat(40), String::new()], 16));
        assert!(!is_sparse::<&str>(&[], 16));
    }

    #[tokio::test]
    async fn page_images_are_numbered_from_one_even_when_identical() {
        let dir = tempfile::tempdir().unwrap();
        let images: Vec<PageImage> = (1..=3)
            .map(|page_num| PageImage {
                page_num,
                png: b"same bytes".to_vec(),
            })
            .collect();

        let target = dir.path().join("thermal_pages");
        let paths = write_page_images(&target, &images).await.unwrap();

        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page_1.png", "page_2.png", "page_3.png"]);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn binding_a_missing_library_fails_cleanly() {
        let err = bind_pdfium(Some(Path::new("/no/such/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, DdrError::PdfiumBindingFailed(_)));
    }
}
