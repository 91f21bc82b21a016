use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::DynamicImage;

/// Rasterises the pages of a PDF at native scale (1 PDF point = 1 pixel).
pub trait PageRenderer: Send + Sync {
    /// Loads `document` once and hands each page to `on_page` in document
    /// order. Rendering stops at the first page that fails or as soon as
    /// `on_page` returns an error.
    fn render_pages(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(usize, DynamicImage) -> Result<()>,
    ) -> Result<()>;
}

/// Renderer used when no rasteriser is compiled in. The first page fails, so
/// the document transcoder always takes its fallback path.
pub struct UnavailableRenderer;

impl PageRenderer for UnavailableRenderer {
    fn render_pages(
        &self,
        _document: &[u8],
        _on_page: &mut dyn FnMut(usize, DynamicImage) -> Result<()>,
    ) -> Result<()> {
        Err(anyhow!(
            "No PDF page renderer available; build with the `pdfium` feature to rasterise pages"
        ))
    }
}

#[cfg(feature = "pdfium")]
pub fn default_renderer() -> Arc<dyn PageRenderer> {
    Arc::new(PdfiumRenderer)
}

#[cfg(not(feature = "pdfium"))]
pub fn default_renderer() -> Arc<dyn PageRenderer> {
    Arc::new(UnavailableRenderer)
}

// FPDF_InitLibrary/FPDF_DestroyLibrary are not reentrant. Bind once and keep
// the library alive until process exit.
#[cfg(feature = "pdfium")]
static PDFIUM: std::sync::OnceLock<Result<pdfium_render::prelude::Pdfium, String>> =
    std::sync::OnceLock::new();

#[cfg(feature = "pdfium")]
fn pdfium() -> Result<&'static pdfium_render::prelude::Pdfium> {
    use pdfium_render::prelude::*;

    PDFIUM
        .get_or_init(|| {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| e.to_string())?;
            tracing::info!("PDFium library bound");
            Ok(Pdfium::new(bindings))
        })
        .as_ref()
        .map_err(|e| anyhow!("PDFium library unavailable: {}", e))
}

/// PDFium-backed renderer. Binds the PDFium library next to the executable
/// or, failing that, the system library, once per process.
#[cfg(feature = "pdfium")]
pub struct PdfiumRenderer;

#[cfg(feature = "pdfium")]
impl PageRenderer for PdfiumRenderer {
    fn render_pages(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(usize, DynamicImage) -> Result<()>,
    ) -> Result<()> {
        use pdfium_render::prelude::*;

        let pdf = pdfium()?.load_pdf_from_byte_slice(document, None)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(1.0);
        for (page_index, page) in pdf.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config)?;
            on_page(page_index, bitmap.as_image())?;
        }
        Ok(())
    }
}
