//! The reportpdf library lays out structured investment-research reports into fixed-size pages
//! and exports them as PDF documents.
//!
//! A report is a JSON snapshot (company metadata, highlights, a financial table, performance and
//! company-data blocks, analysis sections, analyst details and a disclaimer). The library decides
//! deterministically how many pages the report needs and what goes on each page, renders every
//! page into a zoom-aware layout, and hands those layouts to one of several export strategies.
//!
//! Basic usage reads a report and writes a PDF next to it:
//! ```rust,no_run
//! use reportpdf;
//! use reportpdf::config::ConfigSource;
//! use reportpdf::export::ExportCapability;
//! use reportpdf::report::ReportData;
//! use std::error::Error;
//!
//! fn example() -> Result<(), Box<dyn Error>> {
//!     let report = ReportData::from_path(std::path::Path::new("report.json"))?;
//!     reportpdf::export_into_file(
//!         &report,
//!         "Acme_Report_2024-03-01.pdf",
//!         ConfigSource::Default,
//!         Some(ExportCapability::Typeset),
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! Page size, zoom, density limits and export settings come from a TOML file
//! (reportpdfrc.toml):
//! ```toml
//! [page]
//! format = "a4"
//! zoom = 100
//!
//! [limits]
//! cover_highlights = 6
//! section_chars = 800
//!
//! [export]
//! strategy = "headless"
//! logo = "https://example.com/logo.png"
//! ```
//!
//! ## Pipeline
//! ```text
//! +-------------+     +----------------+     +----------------+
//! |  Report     |     |  Page plan     |     |  Page layouts  |
//! |  JSON       | --> |  cover         | --> |  header        |
//! |             |     |  sections x2   |     |  blocks        |
//! |             |     |  overflow      |     |  footer        |
//! +-------------+     +----------------+     +----------------+
//!                                                    |
//!         +------------+-------------+---------------+-----------+
//!         |            |             |                           |
//!    rasterize       print        headless                   typeset
//!   (screenshots) (HTML + @page) (printToPDF)            (vector PDF)
//! ```

pub mod config;
pub mod export;
pub mod fonts;
pub mod html;
pub mod images;
pub mod layout;
pub mod page_size;
pub mod pagination;
pub mod readership;
pub mod report;
pub mod text;
pub mod vocabulary;

use export::{ExportArtifact, ExportCapability, ExportPipeline};
use log::info;
use report::ReportData;
use std::error::Error;
use std::fmt;

/// Errors raised while loading report data, configuring or exporting a report.
#[derive(Debug)]
pub enum ReportError {
    /// Report or readership data could not be parsed
    DataError {
        message: String,
        suggestion: Option<String>,
    },
    /// An export strategy failed as a whole
    ExportError {
        strategy: String,
        message: String,
        suggestion: Option<String>,
    },
    /// Indicates an invalid configuration
    ConfigError { message: String, suggestion: String },
    /// Indicates an I/O error
    IoError {
        message: String,
        path: String,
        suggestion: String,
    },
}

impl Error for ReportError {}
impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReportError::DataError {
                message,
                suggestion,
            } => {
                write!(f, "\u{274C} Report Data Error: {}", message)?;
                if let Some(hint) = suggestion {
                    write!(f, "\n\u{1F4A1} Suggestion: {}", hint)?;
                }
                Ok(())
            }
            ReportError::ExportError {
                strategy,
                message,
                suggestion,
            } => {
                write!(f, "\u{274C} Export Error ({}): {}", strategy, message)?;
                if let Some(hint) = suggestion {
                    write!(f, "\n\u{1F4A1} Suggestion: {}", hint)?;
                }
                Ok(())
            }
            ReportError::ConfigError {
                message,
                suggestion,
            } => {
                write!(f, "\u{274C} Configuration Error: {}", message)?;
                write!(f, "\n\u{1F4A1} Suggestion: {}", suggestion)?;
                Ok(())
            }
            ReportError::IoError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "\u{274C} File Error: {}", message)?;
                write!(f, "\n\u{1F4C1} Path: {}", path)?;
                write!(f, "\n\u{1F4A1} Suggestion: {}", suggestion)?;
                Ok(())
            }
        }
    }
}

impl ReportError {
    /// Creates an export error for the named strategy
    pub fn export_error(strategy: &str, message: impl Into<String>) -> Self {
        ReportError::ExportError {
            strategy: strategy.to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Attaches a suggestion to an export error; other variants are returned unchanged.
    pub fn with_suggestion(self, hint: impl Into<String>) -> Self {
        match self {
            ReportError::ExportError {
                strategy, message, ..
            } => ReportError::ExportError {
                strategy,
                message,
                suggestion: Some(hint.into()),
            },
            other => other,
        }
    }
}

/// Exports a report and writes the artifact to `path`.
///
/// When `capability` is `None` the strategy named in the `[export]` configuration section is used.
///
/// # Returns
/// * `Ok(ExportArtifact)` describing what was written
/// * `Err(ReportError)` if the output directory is missing, the strategy fails or the file
///   cannot be written
pub fn export_into_file(
    report: &ReportData,
    path: &str,
    config: config::ConfigSource,
    capability: Option<ExportCapability>,
) -> Result<ExportArtifact, ReportError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ReportError::IoError {
                message: "Output directory does not exist".to_string(),
                path: parent.display().to_string(),
                suggestion: format!("Create the directory first: mkdir -p {}", parent.display()),
            });
        }
    }

    let artifact = export_artifact(report, config, capability)?;
    std::fs::write(path, &artifact.bytes).map_err(|e| ReportError::IoError {
        message: format!("Failed to write export: {}", e),
        path: path.to_string(),
        suggestion: "Check that you have write permissions for the output location".to_string(),
    })?;
    info!("Wrote {} ({} bytes)", path, artifact.bytes.len());
    Ok(artifact)
}

/// Exports a report and returns the artifact bytes without touching the filesystem.
pub fn export_into_bytes(
    report: &ReportData,
    config: config::ConfigSource,
    capability: Option<ExportCapability>,
) -> Result<Vec<u8>, ReportError> {
    export_artifact(report, config, capability).map(|artifact| artifact.bytes)
}

fn export_artifact(
    report: &ReportData,
    config: config::ConfigSource,
    capability: Option<ExportCapability>,
) -> Result<ExportArtifact, ReportError> {
    let settings = config::load_config_from_source(config);
    let capability = capability.unwrap_or(settings.export.strategy);
    let request = settings.export_request();
    ExportPipeline::new(capability).run(report, &request)
}
