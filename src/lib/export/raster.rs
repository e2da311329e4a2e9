//! Rasterize-and-assemble export.
//!
//! Each rendered page is captured as a bitmap at twice its CSS size (clip scale and device
//! scale factor combined), decoded, and placed on its own PDF page: scaled uniformly by
//! `min(page_w / bitmap_w, page_h / bitmap_h)` and centered. A page that cannot be captured (missing element, zero-size bitmap, undecodable
//! data, or no browser at all) becomes a placeholder page. This strategy never fails because
//! of capture problems; only PDF assembly errors propagate.

use super::headless::BrowserSession;
use super::{BrowserSettings, ExportArtifact, ExportCapability, ExportRequest, ExportStrategy};
use crate::html::PAGE_SELECTOR;
use crate::page_size::dimensions;
use crate::report::ReportData;
use crate::ReportError;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Text of the page substituted for a page that could not be captured.
pub const PLACEHOLDER_PAGE_TEXT: &str = "Chart not available for export";

/// Output pixels per CSS pixel for every captured page.
pub const CAPTURE_SCALE: f64 = 2.0;

/// Clip scale that yields [`CAPTURE_SCALE`] once the browser's device scale factor applies.
pub fn clip_scale(device_scale_factor: f64) -> f64 {
    if device_scale_factor.is_finite() && device_scale_factor > 0.0 {
        CAPTURE_SCALE / device_scale_factor
    } else {
        CAPTURE_SCALE
    }
}

const STRATEGY: &str = "rasterize";
const PLACEHOLDER_FONT_SIZE: f32 = 18.0;

/// Produces one encoded bitmap per rendered page.
///
/// Entries are `None` for pages that could not be captured. An `Err` means nothing could be
/// captured at all; callers treat it like a vector of `None`.
pub trait PageCapture {
    fn capture_pages(
        &self,
        html: &str,
        expected_pages: usize,
    ) -> Result<Vec<Option<Vec<u8>>>, ReportError>;
}

/// Captures `.pdf-page` elements with a headless browser.
pub struct ChromeCapture {
    settings: BrowserSettings,
}

impl ChromeCapture {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl PageCapture for ChromeCapture {
    fn capture_pages(
        &self,
        html: &str,
        expected_pages: usize,
    ) -> Result<Vec<Option<Vec<u8>>>, ReportError> {
        let mut session = BrowserSession::launch(&self.settings)?;
        session.load_html(html)?;
        let tab = session.tab();
        let scale = clip_scale(self.settings.device_scale_factor);

        let elements = match tab.find_elements(PAGE_SELECTOR) {
            Ok(elements) => elements,
            Err(e) => {
                warn!("No {} element to capture: {}", PAGE_SELECTOR, e);
                return Ok(vec![None; expected_pages]);
            }
        };
        if elements.len() != expected_pages {
            warn!(
                "Expected {} page elements, found {}",
                expected_pages,
                elements.len()
            );
        }

        let captures = elements
            .iter()
            .enumerate()
            .map(|(idx, element)| {
                let mut clip = match element.get_box_model() {
                    Ok(model) => model.margin_viewport(),
                    Err(e) => {
                        warn!("Page {} has no box model: {}", idx + 1, e);
                        return None;
                    }
                };
                clip.scale = scale;
                match tab.capture_screenshot(
                    CaptureScreenshotFormatOption::Png,
                    None,
                    Some(clip),
                    true,
                ) {
                    Ok(png) => Some(png),
                    Err(e) => {
                        warn!("Capturing page {} failed: {}", idx + 1, e);
                        None
                    }
                }
            })
            .collect();
        Ok(captures)
    }
}

/// Where a bitmap lands on a PDF page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

/// Uniform fit of a `bitmap_w` x `bitmap_h` pixel image, centered on the page.
pub fn fit_image(page_w: f32, page_h: f32, bitmap_w: u32, bitmap_h: u32) -> Placement {
    let scale = (page_w / bitmap_w as f32).min(page_h / bitmap_h as f32);
    let width = bitmap_w as f32 * scale;
    let height = bitmap_h as f32 * scale;
    Placement {
        x: (page_w - width) / 2.0,
        y: (page_h - height) / 2.0,
        width,
        height,
        scale,
    }
}

/// Builds an image-only PDF page by page.
pub struct PdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
    page_w: f32,
    page_h: f32,
}

impl PdfAssembler {
    pub fn new(page_w: f32, page_h: f32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
            page_w,
            page_h,
        }
    }

    /// Decodes `encoded` and adds it as a page. Returns `false` (and adds nothing) when the
    /// bitmap is empty or cannot be decoded.
    pub fn add_bitmap_page(&mut self, encoded: &[u8]) -> Result<bool, ReportError> {
        let decoded = match image::load_from_memory(encoded) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("Undecodable page capture: {}", e);
                return Ok(false);
            }
        };
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            warn!("Zero-size page capture");
            return Ok(false);
        }

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            decoded.into_raw(),
        );
        let image_id = self.doc.add_object(image_stream);

        let placement = fit_image(self.page_w, self.page_h, width, height);
        debug!(
            "Placing {}x{} bitmap at scale {:.4}",
            width, height, placement.scale
        );
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        placement.width.into(),
                        0.into(),
                        0.into(),
                        placement.height.into(),
                        placement.x.into(),
                        placement.y.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        self.push_page(content, resources)?;
        Ok(true)
    }

    /// Adds a page carrying only [`PLACEHOLDER_PAGE_TEXT`], centered.
    pub fn add_placeholder_page(&mut self) -> Result<(), ReportError> {
        // Helvetica averages roughly half an em per character.
        let text_w = PLACEHOLDER_PAGE_TEXT.len() as f32 * PLACEHOLDER_FONT_SIZE * 0.5;
        let x = ((self.page_w - text_w) / 2.0).max(0.0);
        let y = self.page_h / 2.0;
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), PLACEHOLDER_FONT_SIZE.into()]),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(PLACEHOLDER_PAGE_TEXT)]),
                Operation::new("ET", vec![]),
            ],
        };
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        };
        self.push_page(content, resources)
    }

    fn push_page(
        &mut self,
        content: Content,
        resources: lopdf::Dictionary,
    ) -> Result<(), ReportError> {
        let encoded = content
            .encode()
            .map_err(|e| ReportError::export_error(STRATEGY, format!("Content encoding failed: {}", e)))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), self.page_w.into(), self.page_h.into()],
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Finishes the page tree and serializes the document.
    pub fn finish(mut self, title: &str) -> Result<Vec<u8>, ReportError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal(concat!("reportpdf ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| ReportError::export_error(STRATEGY, format!("PDF serialization failed: {}", e)))?;
        Ok(buffer)
    }
}

/// Screenshots every page and assembles the bitmaps into a PDF.
pub struct RasterizeStrategy {
    capture: Option<Box<dyn PageCapture>>,
}

impl RasterizeStrategy {
    /// Uses [`ChromeCapture`] configured from each request's browser settings.
    pub fn new() -> Self {
        Self { capture: None }
    }

    pub fn with_capture(capture: Box<dyn PageCapture>) -> Self {
        Self {
            capture: Some(capture),
        }
    }
}

impl Default for RasterizeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportStrategy for RasterizeStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn capability(&self) -> ExportCapability {
        ExportCapability::Rasterize
    }

    fn export(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError> {
        let pages = request.layouts(report);
        let html = request.html_document(report, &pages);

        let result = match &self.capture {
            Some(capture) => capture.capture_pages(&html, pages.len()),
            None => ChromeCapture::new(request.browser.clone()).capture_pages(&html, pages.len()),
        };
        let mut captures = result.unwrap_or_else(|e| {
            warn!("Page capture unavailable, exporting placeholders: {}", e);
            Vec::new()
        });
        captures.resize(pages.len(), None);

        let (page_w, page_h) = dimensions(request.format).to_points();
        let mut assembler = PdfAssembler::new(page_w, page_h);
        let mut placeholders = 0;
        for (idx, capture) in captures.iter().enumerate() {
            let placed = match capture {
                Some(bytes) => assembler.add_bitmap_page(bytes)?,
                None => false,
            };
            if !placed {
                debug!("Page {} falls back to a placeholder", idx + 1);
                assembler.add_placeholder_page()?;
                placeholders += 1;
            }
        }

        let page_count = assembler.page_count();
        let title = format!("{} {}", report.display_name(), request.kind.label());
        Ok(ExportArtifact {
            filename: request.filename(report, "pdf"),
            mime_type: "application/pdf",
            bytes: assembler.finish(&title)?,
            page_count,
            placeholder_pages: placeholders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_size::PageFormat;
    use image::{ImageBuffer, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    struct FixedCapture(Vec<Option<Vec<u8>>>);

    impl PageCapture for FixedCapture {
        fn capture_pages(&self, _html: &str, _expected: usize) -> Result<Vec<Option<Vec<u8>>>, ReportError> {
            Ok(self.0.clone())
        }
    }

    struct NoBrowser;

    impl PageCapture for NoBrowser {
        fn capture_pages(&self, _html: &str, _expected: usize) -> Result<Vec<Option<Vec<u8>>>, ReportError> {
            Err(ReportError::export_error("rasterize", "no browser"))
        }
    }

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let content = doc.get_page_content(*id).unwrap();
                String::from_utf8_lossy(&content).into_owned()
            })
            .collect()
    }

    #[test]
    fn test_fit_image_uses_min_scale_and_centers() {
        // 2x capture of a Letter page at 96 dpi
        let placement = fit_image(612.0, 792.0, 1632, 2112);
        assert!((placement.scale - 612.0 / 1632.0).abs() < 1e-6);
        assert!((placement.width - 612.0).abs() < 1e-3);
        assert!((placement.height - 792.0).abs() < 1e-3);

        let wide = fit_image(612.0, 792.0, 2000, 1000);
        assert!((wide.scale - 612.0 / 2000.0).abs() < 1e-6);
        assert!(wide.x.abs() < 1e-3);
        assert!((wide.y - (792.0 - wide.height) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_clip_scale_keeps_captures_at_twice_css_size() {
        assert_eq!(clip_scale(2.0), 1.0);
        assert_eq!(clip_scale(1.0), 2.0);
        assert_eq!(clip_scale(0.0), CAPTURE_SCALE);
        assert_eq!(clip_scale(f64::NAN), CAPTURE_SCALE);
    }

    #[test]
    fn test_missing_capture_target_falls_back_to_placeholder() {
        let strategy = RasterizeStrategy::with_capture(Box::new(FixedCapture(vec![])));
        let mut report = ReportData::default();
        report.metadata.company_name = "Tailspin".to_string();

        let artifact = strategy.export(&report, &ExportRequest::default()).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF-"));
        assert_eq!(artifact.page_count, 2);
        assert_eq!(artifact.placeholder_pages, 2);
        for text in page_texts(&artifact.bytes) {
            assert!(text.contains(PLACEHOLDER_PAGE_TEXT));
        }
    }

    #[test]
    fn test_browser_failure_degrades_to_placeholders() {
        let strategy = RasterizeStrategy::with_capture(Box::new(NoBrowser));
        let artifact = strategy
            .export(&ReportData::default(), &ExportRequest::default())
            .unwrap();
        assert_eq!(artifact.placeholder_pages, artifact.page_count);
    }

    #[test]
    fn test_mixed_captures() {
        let strategy = RasterizeStrategy::with_capture(Box::new(FixedCapture(vec![
            Some(png(40, 52)),
            Some(b"not an image".to_vec()),
        ])));
        let request = ExportRequest {
            format: PageFormat::A4,
            ..ExportRequest::default()
        };
        let artifact = strategy.export(&ReportData::default(), &request).unwrap();
        assert_eq!(artifact.page_count, 2);
        assert_eq!(artifact.placeholder_pages, 1);

        let texts = page_texts(&artifact.bytes);
        assert!(texts[0].contains("/Im0 Do"));
        assert!(texts[1].contains(PLACEHOLDER_PAGE_TEXT));

        let doc = Document::load_mem(&artifact.bytes).unwrap();
        let first = *doc.get_pages().values().next().unwrap();
        let media_box = doc
            .get_dictionary(first)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        let width = media_box[2].as_float().unwrap();
        assert!((width - 210.0 / 25.4 * 72.0).abs() < 0.01);

        let image = doc
            .objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .find(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|v| v.as_name())
                    .map_or(false, |name| name == b"Image")
            })
            .unwrap();
        assert!(image.is_compressed());
        assert_eq!(image.get_plain_content().unwrap().len(), 40 * 52 * 3);
    }
}
