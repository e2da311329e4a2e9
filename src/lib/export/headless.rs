//! Server-side rendering through a headless Chrome/Chromium process.
//!
//! The browser is owned by a [`BrowserSession`] guard: it is launched for one export and torn
//! down when the guard drops, on success and on every error path. Launch, navigation and
//! print failures surface as one [`ReportError::ExportError`].

use super::{BrowserSettings, ExportArtifact, ExportCapability, ExportRequest, ExportStrategy};
use crate::html::READY_SELECTOR;
use crate::page_size::{dimensions, PageFormat, MARGIN_HORIZONTAL_IN, MARGIN_VERTICAL_IN};
use crate::report::ReportData;
use crate::ReportError;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const STRATEGY: &str = "headless";

/// An exclusive headless browser with one tab, released on drop.
pub struct BrowserSession {
    tab: Arc<Tab>,
    // Dropped after `tab`; dropping the Browser terminates the child process.
    _browser: Browser,
    page_file: Option<NamedTempFile>,
}

impl BrowserSession {
    /// Launches a browser with the configured viewport and device scale factor.
    pub fn launch(settings: &BrowserSettings) -> Result<Self, ReportError> {
        let scale_arg = format!("--force-device-scale-factor={}", settings.device_scale_factor);
        let args: Vec<&OsStr> = vec![OsStr::new(&scale_arg), OsStr::new("--hide-scrollbars")];

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((settings.viewport_width, settings.viewport_height)))
            .path(settings.chrome_path.clone())
            .idle_browser_timeout(settings.ready_timeout * 3)
            .args(args)
            .build()
            .map_err(|e| launch_error(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| launch_error(e.to_string()))?;
        let tab = browser.new_tab().map_err(|e| launch_error(e.to_string()))?;
        tab.set_default_timeout(settings.ready_timeout);
        info!(
            "Browser started ({}x{} @{}x)",
            settings.viewport_width, settings.viewport_height, settings.device_scale_factor
        );

        Ok(Self {
            tab,
            _browser: browser,
            page_file: None,
        })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Loads an HTML document and waits until it reports itself ready.
    ///
    /// The document is written to a temporary file so that large pages and data URIs do not
    /// have to fit in a navigation URL.
    pub fn load_html(&mut self, html: &str) -> Result<(), ReportError> {
        let mut file = tempfile::Builder::new()
            .prefix("reportpdf-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| session_error(format!("Could not create temporary page: {}", e)))?;
        file.write_all(html.as_bytes())
            .map_err(|e| session_error(format!("Could not write temporary page: {}", e)))?;

        let url = format!("file://{}", file.path().display());
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(&url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| session_error(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_for_element(READY_SELECTOR)
            .map_err(|e| session_error(format!("Document never became ready: {}", e)))?;

        self.page_file = Some(file);
        Ok(())
    }

    /// Prints the loaded document to PDF.
    pub fn print_to_pdf(&self, options: PrintToPdfOptions) -> Result<Vec<u8>, ReportError> {
        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| session_error(format!("printToPDF failed: {}", e)))
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            warn!("Closing browser tab failed: {}", e);
        }
        debug!("Browser session closed");
    }
}

fn launch_error(message: String) -> ReportError {
    ReportError::export_error(STRATEGY, format!("Could not launch browser: {}", message))
        .with_suggestion(
            "Install Chrome or Chromium, or set chrome_path in the [export] configuration section",
        )
}

fn session_error(message: String) -> ReportError {
    ReportError::export_error(STRATEGY, message)
}

/// Print options: registry paper size, fixed margins, backgrounds on, scale locked to 1.0.
pub fn print_options(format: PageFormat) -> PrintToPdfOptions {
    let (width_in, height_in) = dimensions(format).to_inches();
    PrintToPdfOptions {
        print_background: Some(true),
        scale: Some(1.0),
        paper_width: Some(width_in as f64),
        paper_height: Some(height_in as f64),
        margin_top: Some(MARGIN_VERTICAL_IN as f64),
        margin_bottom: Some(MARGIN_VERTICAL_IN as f64),
        margin_left: Some(MARGIN_HORIZONTAL_IN as f64),
        margin_right: Some(MARGIN_HORIZONTAL_IN as f64),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

/// Renders the report HTML in a headless browser and prints it to PDF.
pub struct HeadlessStrategy;

impl ExportStrategy for HeadlessStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn capability(&self) -> ExportCapability {
        ExportCapability::Headless
    }

    fn export(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError> {
        let pages = request.layouts(report);
        let html = request.html_document(report, &pages);

        let bytes = {
            let mut session = BrowserSession::launch(&request.browser)?;
            session.load_html(&html)?;
            session.print_to_pdf(print_options(request.format))?
        };

        Ok(ExportArtifact {
            filename: request.filename(report, "pdf"),
            mime_type: "application/pdf",
            bytes,
            page_count: pages.len(),
            placeholder_pages: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_options_follow_registry() {
        let letter = print_options(PageFormat::Letter);
        assert_eq!(letter.paper_width, Some(8.5));
        assert_eq!(letter.paper_height, Some(11.0));
        assert_eq!(letter.margin_top, Some(0.75));
        assert_eq!(letter.margin_bottom, Some(0.75));
        assert_eq!(letter.margin_left, Some(0.5));
        assert_eq!(letter.margin_right, Some(0.5));
        assert_eq!(letter.print_background, Some(true));
        assert_eq!(letter.scale, Some(1.0));

        let a4 = print_options(PageFormat::A4);
        let width = a4.paper_width.unwrap();
        assert!((width - 210.0 / 25.4).abs() < 1e-4);
    }

    #[test]
    fn test_launch_error_carries_suggestion() {
        let err = launch_error("no binary".to_string());
        match err {
            ReportError::ExportError {
                strategy,
                suggestion,
                ..
            } => {
                assert_eq!(strategy, "headless");
                assert!(suggestion.unwrap().contains("chrome_path"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
