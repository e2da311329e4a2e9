//! Print-ready HTML export.
//!
//! The document carries `@page` rules for the selected format and page-break rules between
//! pages, so the browser's own "Save as PDF" reproduces the pagination without a server.

use super::{ExportArtifact, ExportCapability, ExportRequest, ExportStrategy};
use crate::report::ReportData;
use crate::ReportError;

/// Emits the rendered pages as one self-contained HTML document.
pub struct PrintStrategy;

impl ExportStrategy for PrintStrategy {
    fn name(&self) -> &'static str {
        "print"
    }

    fn capability(&self) -> ExportCapability {
        ExportCapability::Print
    }

    fn export(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError> {
        let pages = request.layouts(report);
        let html = request.html_document(report, &pages);
        Ok(ExportArtifact {
            filename: request.filename(report, "html"),
            mime_type: "text/html",
            bytes: html.into_bytes(),
            page_count: pages.len(),
            placeholder_pages: 0,
        })
    }
}
