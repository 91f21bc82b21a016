use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use mediagate_core::{
    AcceptedMediaType, AdmissionError, DocumentOutcome, TranscodeRequest, TranscodeResult,
};
use tokio_util::sync::CancellationToken;

use super::{PageRenderer, ProgressSink};
use crate::compression::ImageCompressor;

const IMAGE_RESOURCE: &str = "Im0";

/// One rasterised page, held only until the output document is written.
struct Page {
    page_index: usize,
    raster_bytes: Vec<u8>,
    width: u32,
    height: u32,
}

enum PageFailure {
    Cancelled,
    Failed(String),
}

/// Re-rasterises every page of a PDF and reassembles them as JPEG-backed pages
/// sized to their raster dimensions.
///
/// If any page fails, the original document is re-serialised with a simplified
/// object structure instead and the result is tagged
/// [`DocumentOutcome::FallbackPreserved`].
#[derive(Clone)]
pub struct DocumentTranscoder {
    renderer: Arc<dyn PageRenderer>,
}

impl DocumentTranscoder {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }

    pub fn page_count(data: &[u8]) -> Result<usize> {
        let doc = Document::load_mem(data).context("Failed to parse PDF")?;
        Ok(doc.get_pages().len())
    }

    pub fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeResult, AdmissionError> {
        let source = &request.source_bytes;
        let page_count = Self::page_count(source)
            .map_err(|e| AdmissionError::TranscodeFailure(format!("{:#}", e)))?;
        progress.report(10, "Document loaded");

        let quality = request.quality_percent();
        let pages = match self.render_pages(source, page_count, quality, progress, cancel) {
            Ok(pages) => pages,
            Err(PageFailure::Cancelled) => return Err(AdmissionError::Cancelled),
            Err(PageFailure::Failed(reason)) => return self.preserve(source, reason, progress),
        };

        let output = match assemble(pages) {
            Ok(output) => output,
            Err(e) => return self.preserve(source, format!("{:#}", e), progress),
        };
        progress.report(100, "Document assembled");

        tracing::info!(
            page_count = page_count,
            input_size = source.len(),
            output_size = output.len(),
            quality = quality,
            "Document transcode complete"
        );

        Ok(TranscodeResult {
            output_bytes: Bytes::from(output),
            output_media_type: AcceptedMediaType::Pdf,
            dimensions: None,
            document_outcome: Some(DocumentOutcome::Optimized { page_count }),
        })
    }

    fn render_pages(
        &self,
        source: &[u8],
        page_count: usize,
        quality: u8,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<Page>, PageFailure> {
        if page_count == 0 {
            return Err(PageFailure::Failed("Document has no pages".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(PageFailure::Cancelled);
        }

        let mut pages = Vec::with_capacity(page_count);
        let mut stopped = None;
        let mut on_page = |page_index: usize, image: DynamicImage| -> Result<()> {
            let (width, height) = image.dimensions();
            let raster_bytes = match ImageCompressor::compress_jpeg(&image, quality) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let reason = format!("Page {}: {:#}", page_index + 1, e);
                    stopped = Some(PageFailure::Failed(reason));
                    return Err(anyhow!("page encoding failed"));
                }
            };

            pages.push(Page {
                page_index,
                raster_bytes: raster_bytes.to_vec(),
                width,
                height,
            });

            let done = pages.len().min(page_count);
            let percent = 20 + done * 70 / page_count;
            progress.report(percent as u8, &format!("Page {} of {}", done, page_count));

            if cancel.is_cancelled() {
                stopped = Some(PageFailure::Cancelled);
                return Err(anyhow!("cancelled"));
            }
            Ok(())
        };
        let rendered = self.renderer.render_pages(source, &mut on_page);

        if let Some(failure) = stopped {
            return Err(failure);
        }
        if let Err(e) = rendered {
            return Err(PageFailure::Failed(format!("Page {}: {:#}", pages.len() + 1, e)));
        }
        if pages.len() != page_count {
            return Err(PageFailure::Failed(format!(
                "Rendered {} of {} pages",
                pages.len(),
                page_count
            )));
        }

        Ok(pages)
    }

    /// Re-serialise the original with unused objects pruned and streams
    /// deflated. Never returns something larger than the input.
    fn preserve(
        &self,
        source: &Bytes,
        reason: String,
        progress: &dyn ProgressSink,
    ) -> Result<TranscodeResult, AdmissionError> {
        tracing::warn!(reason = %reason, "Page processing failed, preserving original document");

        let mut doc = Document::load_mem(source)
            .map_err(|e| AdmissionError::TranscodeFailure(format!("Failed to reload PDF: {}", e)))?;
        doc.prune_objects();
        doc.delete_zero_length_streams();
        doc.compress();

        let mut out = Vec::with_capacity(source.len());
        doc.save_to(&mut out)
            .map_err(|e| AdmissionError::TranscodeFailure(format!("Failed to save PDF: {}", e)))?;

        let output_bytes = if !out.is_empty() && out.len() < source.len() {
            Bytes::from(out)
        } else {
            source.clone()
        };
        progress.report(100, "Original document preserved");

        Ok(TranscodeResult {
            output_bytes,
            output_media_type: AcceptedMediaType::Pdf,
            dimensions: None,
            document_outcome: Some(DocumentOutcome::FallbackPreserved { reason }),
        })
    }
}

fn assemble(pages: Vec<Page>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let count = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(count);

    for page in pages {
        let width = i64::from(page.width);
        let height = i64::from(page.height);

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
                "Filter" => "DCTDecode",
            },
            page.raster_bytes,
        )
        .with_compression(false);
        let image_id = doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_RESOURCE => image_id,
                },
            },
        });
        tracing::debug!(
            page = page.page_index + 1,
            width = page.width,
            height = page.height,
            "Page embedded"
        );
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).context("Failed to write PDF")?;
    if out.is_empty() {
        return Err(anyhow!("PDF writer returned no data"));
    }
    Ok(out)
}
