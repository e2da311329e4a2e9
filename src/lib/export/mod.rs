//! Export pipeline: one [`ExportStrategy`] trait, four interchangeable backends.
//!
//! Every strategy consumes the same [`PageLayout`] values produced by
//! [`crate::layout::render_document`]; none of them re-derives pagination. A strategy is
//! selected by [`ExportCapability`]:
//!
//! | capability  | output | needs a browser |
//! |-------------|--------|-----------------|
//! | `Rasterize` | PDF of page screenshots, placeholder pages on capture failure | yes (degrades) |
//! | `Print`     | print-ready HTML with `@page` rules | no |
//! | `Headless`  | PDF from the browser's print engine | yes |
//! | `Typeset`   | vector PDF built with genpdfi_extended | no |
//!
//! ```rust
//! use chrono::NaiveDate;
//! use reportpdf::export::{export_filename, ReportKind};
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! assert_eq!(
//!     export_filename("Société Générale", ReportKind::Report, date),
//!     "Soci_t__G_n_rale_Report_2024-03-01.pdf"
//! );
//! ```

pub mod headless;
pub mod print;
pub mod raster;
pub mod typeset;

use crate::fonts::BuiltinFamily;
use crate::html::{render_html, HtmlOptions};
use crate::images::ImageLoader;
use crate::layout::{render_document, PageLayout, RenderOptions};
use crate::page_size::PageFormat;
use crate::report::ReportData;
use crate::ReportError;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use headless::{BrowserSession, HeadlessStrategy};
pub use print::PrintStrategy;
pub use raster::{ChromeCapture, PageCapture, RasterizeStrategy, PLACEHOLDER_PAGE_TEXT};
pub use typeset::TypesetStrategy;

/// Selects an export backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCapability {
    Rasterize,
    Print,
    Headless,
    Typeset,
}

impl ExportCapability {
    pub const ALL: [ExportCapability; 4] = [
        ExportCapability::Rasterize,
        ExportCapability::Print,
        ExportCapability::Headless,
        ExportCapability::Typeset,
    ];

    /// Parses a capability name case-insensitively.
    pub fn parse(name: &str) -> Option<ExportCapability> {
        match name.trim().to_lowercase().as_str() {
            "rasterize" | "raster" | "image" => Some(ExportCapability::Rasterize),
            "print" | "html" => Some(ExportCapability::Print),
            "headless" | "server" => Some(ExportCapability::Headless),
            "typeset" | "native" => Some(ExportCapability::Typeset),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportCapability::Rasterize => "rasterize",
            ExportCapability::Print => "print",
            ExportCapability::Headless => "headless",
            ExportCapability::Typeset => "typeset",
        }
    }

    pub fn requires_browser(&self) -> bool {
        matches!(self, ExportCapability::Rasterize | ExportCapability::Headless)
    }
}

impl fmt::Display for ExportCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Word used in the output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportKind {
    #[default]
    Report,
    Investment,
}

impl ReportKind {
    /// Unknown names fall back to `Report`.
    pub fn parse(name: &str) -> ReportKind {
        match name.trim().to_lowercase().as_str() {
            "investment" => ReportKind::Investment,
            _ => ReportKind::Report,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Report => "report",
            ReportKind::Investment => "investment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Report => "Report",
            ReportKind::Investment => "Investment",
        }
    }
}

/// Browser settings shared by the rasterize and headless strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    /// Upper bound on the wait for the document readiness marker.
    pub ready_timeout: Duration,
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            viewport_width: 1200,
            viewport_height: 1600,
            device_scale_factor: 2.0,
            ready_timeout: Duration::from_secs(20),
            chrome_path: None,
        }
    }
}

/// Scale every exported artifact is rendered at. Zoom only affects on-screen previews.
pub const EXPORT_ZOOM: f32 = 100.0;

/// Everything a strategy needs besides the report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub format: PageFormat,
    /// Preview zoom, display-only.
    pub zoom: f32,
    pub kind: ReportKind,
    pub render: RenderOptions,
    /// Logo path or URL, embedded as a data URI.
    pub logo: Option<String>,
    pub allow_remote_logo: bool,
    /// Base directory for a relative logo path.
    pub asset_dir: Option<PathBuf>,
    pub font_family: BuiltinFamily,
    pub browser: BrowserSettings,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: PageFormat::Letter,
            zoom: 100.0,
            kind: ReportKind::Report,
            render: RenderOptions::default(),
            logo: None,
            allow_remote_logo: true,
            asset_dir: None,
            font_family: BuiltinFamily::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ExportRequest {
    /// Renders every page of the report at export scale.
    pub fn layouts(&self, report: &ReportData) -> Vec<PageLayout> {
        render_document(report, self.format, EXPORT_ZOOM, &self.render)
    }

    /// Renders every page at the preview zoom.
    pub fn preview_layouts(&self, report: &ReportData) -> Vec<PageLayout> {
        render_document(report, self.format, self.zoom, &self.render)
    }

    /// Builds the self-contained HTML document for `pages`, embedding the logo when it loads.
    pub fn html_document(&self, report: &ReportData, pages: &[PageLayout]) -> String {
        let mut loader = ImageLoader::new(self.asset_dir.as_deref());
        loader.set_allow_remote(self.allow_remote_logo);
        let logo_data_uri = self
            .logo
            .as_deref()
            .and_then(|logo| loader.load_data_uri(logo));
        let options = HtmlOptions {
            title: format!("{} {}", report.display_name(), self.kind.label()),
            logo_data_uri,
            font_family: self.font_family,
        };
        render_html(pages, self.format, &options)
    }

    /// File name for the artifact with the given extension.
    pub fn filename(&self, report: &ReportData, extension: &str) -> String {
        let stem = file_stem(report.display_name(), self.kind, report.metadata.date);
        format!("{}.{}", stem, extension)
    }
}

/// Output of one export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Pages replaced by a placeholder because they could not be captured.
    pub placeholder_pages: usize,
}

/// A backend turning rendered pages into an artifact.
pub trait ExportStrategy {
    fn name(&self) -> &'static str;

    fn capability(&self) -> ExportCapability;

    fn export(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError>;
}

/// Default implementation for a capability.
pub fn strategy_for(capability: ExportCapability) -> Box<dyn ExportStrategy> {
    match capability {
        ExportCapability::Rasterize => Box::new(RasterizeStrategy::new()),
        ExportCapability::Print => Box::new(PrintStrategy),
        ExportCapability::Headless => Box::new(HeadlessStrategy),
        ExportCapability::Typeset => Box::new(TypesetStrategy),
    }
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn file_stem(name: &str, kind: ReportKind, date: NaiveDate) -> String {
    let name = name.trim();
    let name = if name.is_empty() { "Report" } else { name };
    format!(
        "{}_{}_{}",
        sanitize_file_stem(name),
        kind.label(),
        date.format("%Y-%m-%d")
    )
}

/// `{name}_{Report|Investment}_{YYYY-MM-DD}.pdf` with the name sanitized.
pub fn export_filename(name: &str, kind: ReportKind, date: NaiveDate) -> String {
    format!("{}.pdf", file_stem(name, kind, date))
}

/// Runs one strategy against private copies of the report.
pub struct ExportPipeline {
    strategy: Box<dyn ExportStrategy>,
}

impl ExportPipeline {
    pub fn new(capability: ExportCapability) -> Self {
        Self::with_strategy(strategy_for(capability))
    }

    pub fn with_strategy(strategy: Box<dyn ExportStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn run(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError> {
        let snapshot = report.clone();
        for warning in snapshot.validate() {
            warn!("{}", warning);
        }

        info!(
            "Exporting '{}' with the {} strategy ({})",
            snapshot.display_name(),
            self.strategy.name(),
            request.format
        );
        match self.strategy.export(&snapshot, request) {
            Ok(artifact) => {
                info!(
                    "Exported {} ({} pages, {} bytes)",
                    artifact.filename,
                    artifact.page_count,
                    artifact.bytes.len()
                );
                if artifact.placeholder_pages > 0 {
                    warn!(
                        "{} page(s) replaced by a placeholder",
                        artifact.placeholder_pages
                    );
                }
                Ok(artifact)
            }
            Err(e) => {
                error!("{} export failed: {}", self.strategy.name(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingStrategy {
        calls: Cell<usize>,
    }

    impl ExportStrategy for CountingStrategy {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn capability(&self) -> ExportCapability {
            ExportCapability::Print
        }

        fn export(
            &self,
            report: &ReportData,
            request: &ExportRequest,
        ) -> Result<ExportArtifact, ReportError> {
            self.calls.set(self.calls.get() + 1);
            Ok(ExportArtifact {
                filename: request.filename(report, "txt"),
                mime_type: "text/plain",
                bytes: report.display_name().as_bytes().to_vec(),
                page_count: request.layouts(report).len(),
                placeholder_pages: 0,
            })
        }
    }

    fn dated_report(name: &str) -> ReportData {
        let mut report = ReportData::default();
        report.metadata.company_name = name.to_string();
        report.metadata.date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        report
    }

    #[test]
    fn test_capability_parse_and_selection() {
        for capability in ExportCapability::ALL {
            assert_eq!(ExportCapability::parse(capability.name()), Some(capability));
            assert_eq!(strategy_for(capability).capability(), capability);
        }
        assert_eq!(ExportCapability::parse("PRINT"), Some(ExportCapability::Print));
        assert_eq!(ExportCapability::parse("fax"), None);
        assert!(ExportCapability::Headless.requires_browser());
        assert!(!ExportCapability::Typeset.requires_browser());
    }

    #[test]
    fn test_filename_sanitization() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(
            export_filename("Acme & Sons, Inc.", ReportKind::Report, date),
            "Acme___Sons__Inc__Report_2024-01-09.pdf"
        );
        assert_eq!(
            export_filename("Acme", ReportKind::Investment, date),
            "Acme_Investment_2024-01-09.pdf"
        );
        assert_eq!(
            export_filename("   ", ReportKind::Report, date),
            "Report_Report_2024-01-09.pdf"
        );
    }

    #[test]
    fn test_request_filename_uses_ticker_fallback() {
        let mut report = dated_report("");
        report.metadata.tickers = vec![crate::report::Ticker {
            symbol: "BRK.B".to_string(),
            exchange: "NYSE".to_string(),
        }];
        let request = ExportRequest::default();
        assert_eq!(
            request.filename(&report, "pdf"),
            "BRK_B_Report_2024-05-17.pdf"
        );
    }

    #[test]
    fn test_pipeline_runs_strategy_on_a_copy() {
        let report = dated_report("Northwind");
        let strategy = CountingStrategy {
            calls: Cell::new(0),
        };
        let pipeline = ExportPipeline::with_strategy(Box::new(strategy));
        assert_eq!(pipeline.strategy_name(), "counting");

        let artifact = pipeline.run(&report, &ExportRequest::default()).unwrap();
        assert_eq!(artifact.filename, "Northwind_Report_2024-05-17.txt");
        assert_eq!(artifact.bytes, b"Northwind");
        assert_eq!(artifact.page_count, 2);
        assert_eq!(report.metadata.company_name, "Northwind");
    }

    #[test]
    fn test_zoom_only_changes_previews() {
        let report = dated_report("Northwind");
        let request = ExportRequest {
            zoom: 50.0,
            ..ExportRequest::default()
        };
        let exported = request.layouts(&report);
        let preview = request.preview_layouts(&report);
        assert_eq!(exported[0].zoom, EXPORT_ZOOM);
        assert_eq!(exported[0].pixel_width, 816.0);
        assert_eq!(preview[0].zoom, 50.0);
        assert_eq!(preview[0].pixel_width, 408.0);
        assert_eq!(exported, ExportRequest::default().layouts(&report));
    }

    #[test]
    fn test_html_document_skips_missing_logo() {
        let report = dated_report("Northwind");
        let request = ExportRequest {
            logo: Some("/nonexistent/logo.png".to_string()),
            ..ExportRequest::default()
        };
        let pages = request.layouts(&report);
        let html = request.html_document(&report, &pages);
        assert!(html.contains("<title>Northwind Report</title>"));
        assert!(!html.contains("<img class=\"logo\""));
    }

    #[test]
    fn test_html_document_uses_configured_assets_and_font() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"\x89PNG\r\n\x1a\n").unwrap();
        let report = dated_report("Northwind");
        let request = ExportRequest {
            logo: Some("logo.png".to_string()),
            asset_dir: Some(dir.path().to_path_buf()),
            font_family: BuiltinFamily::Courier,
            ..ExportRequest::default()
        };
        let pages = request.layouts(&report);
        let html = request.html_document(&report, &pages);
        assert!(html.contains("src=\"data:image/png;base64,"));
        assert!(html.contains("font-family: \"Courier New\", Courier, monospace;"));

        let offline = ExportRequest {
            logo: Some("https://example.com/logo.png".to_string()),
            allow_remote_logo: false,
            ..ExportRequest::default()
        };
        let html = offline.html_document(&report, &pages);
        assert!(!html.contains("<img class=\"logo\""));
    }
}
