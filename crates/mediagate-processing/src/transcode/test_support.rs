//! Synthetic PDFs and an in-memory page renderer for tests.

use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};

use super::PageRenderer;

/// A PDF with one page per `(width, height)` MediaBox.
pub fn sample_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for &(w, h) in sizes {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(w),
                Object::Integer(h),
            ],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn media_box(doc: &Document, page_index: usize) -> Result<(u32, u32)> {
    let page_id = *doc
        .get_pages()
        .values()
        .nth(page_index)
        .ok_or_else(|| anyhow!("no page {}", page_index))?;
    let media_box = doc.get_object(page_id)?.as_dict()?.get(b"MediaBox")?.as_array()?;
    Ok((media_box[2].as_i64()? as u32, media_box[3].as_i64()? as u32))
}

/// Paints a solid raster the size of each page's MediaBox.
pub struct MediaBoxRenderer;

impl MediaBoxRenderer {
    pub fn page(doc: &Document, page_index: usize) -> Result<DynamicImage> {
        let (w, h) = media_box(doc, page_index)?;
        let shade = (page_index * 60 % 256) as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            w,
            h,
            Rgb([shade, 128, 255 - shade]),
        )))
    }
}

impl PageRenderer for MediaBoxRenderer {
    fn render_pages(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(usize, DynamicImage) -> Result<()>,
    ) -> Result<()> {
        let doc = Document::load_mem(document)?;
        for page_index in 0..doc.get_pages().len() {
            on_page(page_index, Self::page(&doc, page_index)?)?;
        }
        Ok(())
    }
}

/// [`MediaBoxRenderer`] that sleeps before each page.
pub struct SlowRenderer {
    pub delay: std::time::Duration,
}

impl PageRenderer for SlowRenderer {
    fn render_pages(
        &self,
        document: &[u8],
        on_page: &mut dyn FnMut(usize, DynamicImage) -> Result<()>,
    ) -> Result<()> {
        let doc = Document::load_mem(document)?;
        for page_index in 0..doc.get_pages().len() {
            std::thread::sleep(self.delay);
            on_page(page_index, MediaBoxRenderer::page(&doc, page_index)?)?;
        }
        Ok(())
    }
}
