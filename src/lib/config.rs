//! Configuration module for page, density, style and export settings.
//!
//! This module handles loading and parsing of report configuration from TOML files.
//! Every section is optional; missing keys keep their default value and an unreadable
//! or invalid file falls back to the full default configuration.
//!
//! # Configuration Structure
//!
//! - `[page]` selects the page format, the zoom level and the screen DPI
//! - `[limits]` tunes how much content each page carries
//! - `[style]` overrides base sizes in points (scaled by zoom at render time)
//! - `[export]` picks the strategy and controls the browser-backed backends
//!
//! # Configuration Example
//!
//! ```toml
//! [page]
//! format = "letter"
//! zoom = 100
//! dpi = 96
//!
//! [limits]
//! cover_highlights = 6
//! cover_table_rows = 4
//! cover_table_columns = 8
//! sections_per_page = 2
//! cover_section_chars = 500
//! section_chars = 800
//!
//! [style]
//! font_family = "helvetica"
//! body_size = 9.5
//! title_size = 20
//!
//! [export]
//! strategy = "rasterize"
//! kind = "report"
//! site_url = "www.example-research.com"
//! copyright = "Example Research"
//! logo = "https://example.com/logo.png"
//! allow_remote_logo = true
//! viewport = { width = 1200, height = 1600 }
//! device_scale_factor = 2.0
//! ready_timeout_secs = 20
//! ```
//!
//! `reportpdf --print-config` writes the complete default file produced by
//! [`default_config_toml`].

use crate::export::{BrowserSettings, ExportCapability, ExportRequest, ReportKind};
use crate::fonts::BuiltinFamily;
use crate::layout::{BaseMetrics, RenderOptions};
use crate::page_size::{PageFormat, DEFAULT_DPI};
use crate::pagination::PaginationLimits;
use crate::ReportError;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::Value;

/// File name looked up in the working directory when no configuration is given.
pub const DEFAULT_CONFIG_FILE: &str = "reportpdfrc.toml";

/// Configuration source for report settings.
/// Determines where the TOML configuration should be loaded from.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Use default built-in settings
    Default,
    /// Load configuration from a file path
    File(&'a str),
    /// Use embedded TOML configuration string
    Embedded(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    pub format: PageFormat,
    pub zoom: f32,
    pub dpi: f32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            format: PageFormat::Letter,
            zoom: 100.0,
            dpi: DEFAULT_DPI,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub strategy: ExportCapability,
    pub kind: ReportKind,
    pub site_url: String,
    pub copyright_holder: String,
    /// Logo path or URL embedded in the page header as a data URI.
    pub logo: Option<String>,
    pub allow_remote_logo: bool,
    /// Directory relative logo paths resolve against: the configuration file's directory.
    pub asset_dir: Option<PathBuf>,
    pub browser: BrowserSettings,
}

impl Default for ExportSettings {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            strategy: ExportCapability::Rasterize,
            kind: ReportKind::Report,
            site_url: render.site_url,
            copyright_holder: render.copyright_holder,
            logo: None,
            allow_remote_logo: true,
            asset_dir: None,
            browser: BrowserSettings::default(),
        }
    }
}

/// The complete configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportConfig {
    pub page: PageSettings,
    pub limits: PaginationLimits,
    pub style: BaseMetrics,
    /// Typeface for the HTML and typeset exports, from `[style] font_family`.
    pub font_family: BuiltinFamily,
    pub export: ExportSettings,
}

impl ReportConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            limits: self.limits,
            metrics: self.style,
            dpi: self.page.dpi,
            site_url: self.export.site_url.clone(),
            copyright_holder: self.export.copyright_holder.clone(),
        }
    }

    /// Builds the request handed to an export strategy.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            format: self.page.format,
            zoom: self.page.zoom,
            kind: self.export.kind,
            render: self.render_options(),
            logo: self.export.logo.clone(),
            allow_remote_logo: self.export.allow_remote_logo,
            asset_dir: self.export.asset_dir.clone(),
            font_family: self.font_family,
            browser: self.export.browser.clone(),
        }
    }
}

/// Reads a number that may be written as an integer or a float.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn parse_count(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(|v| v.as_integer())
        .filter(|i| *i >= 0)
        .map(|i| i as usize)
}

fn parse_page(value: Option<&Value>, default: PageSettings) -> PageSettings {
    let mut page = default;
    if let Some(section) = value {
        if let Some(format) = section.get("format").and_then(|v| v.as_str()) {
            page.format = PageFormat::parse(format);
        }
        if let Some(zoom) = parse_number(section.get("zoom")) {
            if zoom.is_finite() && zoom > 0.0 {
                page.zoom = zoom as f32;
            } else {
                warn!("Ignoring non-positive zoom {} in [page]", zoom);
            }
        }
        if let Some(dpi) = parse_number(section.get("dpi")) {
            if dpi.is_finite() && dpi > 0.0 {
                page.dpi = dpi as f32;
            }
        }
    }
    page
}

fn parse_limits(value: Option<&Value>, default: PaginationLimits) -> PaginationLimits {
    let mut limits = default;
    if let Some(section) = value {
        let fields: [(&str, &mut usize); 9] = [
            ("cover_highlights", &mut limits.cover_highlights),
            ("cover_performance_rows", &mut limits.cover_performance_rows),
            ("cover_table_rows", &mut limits.cover_table_rows),
            ("cover_table_columns", &mut limits.cover_table_columns),
            ("extended_table_rows", &mut limits.extended_table_rows),
            ("overflow_row_threshold", &mut limits.overflow_row_threshold),
            ("sections_per_page", &mut limits.sections_per_page),
            ("cover_section_chars", &mut limits.cover_section_chars),
            ("section_chars", &mut limits.section_chars),
        ];
        for (key, slot) in fields {
            if let Some(v) = parse_count(section.get(key)) {
                *slot = v;
            }
        }
        if limits.sections_per_page == 0 {
            warn!("sections_per_page must be at least 1, using 1");
            limits.sections_per_page = 1;
        }
    }
    limits
}

fn parse_style(value: Option<&Value>, default: BaseMetrics) -> BaseMetrics {
    let mut style = default;
    if let Some(section) = value {
        let fields: [(&str, &mut f32); 11] = [
            ("title_size", &mut style.title_size),
            ("heading_size", &mut style.heading_size),
            ("body_size", &mut style.body_size),
            ("small_size", &mut style.small_size),
            ("table_size", &mut style.table_size),
            ("footer_size", &mut style.footer_size),
            ("badge_size", &mut style.badge_size),
            ("page_padding", &mut style.page_padding),
            ("block_spacing", &mut style.block_spacing),
            ("sidebar_width", &mut style.sidebar_width),
            ("rule_width", &mut style.rule_width),
        ];
        for (key, slot) in fields {
            if let Some(v) = parse_number(section.get(key)) {
                *slot = v as f32;
            }
        }
    }
    style
}

fn parse_font_family(style: Option<&Value>, default: BuiltinFamily) -> BuiltinFamily {
    style
        .and_then(|section| section.get("font_family"))
        .and_then(|v| v.as_str())
        .map(BuiltinFamily::from_name)
        .unwrap_or(default)
}

fn parse_export(value: Option<&Value>, default: ExportSettings) -> ExportSettings {
    let mut export = default;
    let Some(section) = value else {
        return export;
    };

    if let Some(name) = section.get("strategy").and_then(|v| v.as_str()) {
        match ExportCapability::parse(name) {
            Some(capability) => export.strategy = capability,
            None => warn!("Unknown export strategy '{}', keeping {}", name, export.strategy),
        }
    }
    if let Some(kind) = section.get("kind").and_then(|v| v.as_str()) {
        export.kind = ReportKind::parse(kind);
    }
    if let Some(url) = section.get("site_url").and_then(|v| v.as_str()) {
        export.site_url = url.to_string();
    }
    if let Some(holder) = section.get("copyright").and_then(|v| v.as_str()) {
        export.copyright_holder = holder.to_string();
    }
    if let Some(logo) = section.get("logo").and_then(|v| v.as_str()) {
        export.logo = (!logo.trim().is_empty()).then(|| logo.to_string());
    }
    if let Some(allow) = section.get("allow_remote_logo").and_then(|v| v.as_bool()) {
        export.allow_remote_logo = allow;
    }

    let browser = &mut export.browser;
    if let Some(viewport) = section.get("viewport") {
        if let Some(w) = viewport.get("width").and_then(|v| v.as_integer()) {
            browser.viewport_width = w.max(1) as u32;
        }
        if let Some(h) = viewport.get("height").and_then(|v| v.as_integer()) {
            browser.viewport_height = h.max(1) as u32;
        }
    }
    if let Some(factor) = parse_number(section.get("device_scale_factor")) {
        browser.device_scale_factor = factor;
    }
    if let Some(secs) = section.get("ready_timeout_secs").and_then(|v| v.as_integer()) {
        browser.ready_timeout = Duration::from_secs(secs.max(1) as u64);
    }
    if let Some(path) = section.get("chrome_path").and_then(|v| v.as_str()) {
        browser.chrome_path = Some(path.into());
    }
    export
}

/// Parses a TOML configuration string and returns a complete [`ReportConfig`].
///
/// # Returns
/// A complete configuration, or default values if parsing fails
///
/// # Example
/// ```rust
/// use reportpdf::config::parse_config_string;
/// use reportpdf::page_size::PageFormat;
///
/// let config = parse_config_string(r#"
/// [page]
/// format = "a4"
/// zoom = 75
///
/// [limits]
/// section_chars = 1200
/// "#);
/// assert_eq!(config.page.format, PageFormat::A4);
/// assert_eq!(config.page.zoom, 75.0);
/// assert_eq!(config.limits.section_chars, 1200);
/// assert_eq!(config.limits.cover_section_chars, 500);
/// ```
pub fn parse_config_string(config_str: &str) -> ReportConfig {
    try_parse_config_string(config_str).unwrap_or_else(|e| {
        warn!("Invalid configuration, using defaults: {}", e);
        ReportConfig::default()
    })
}

/// Like [`parse_config_string`], but invalid TOML is an error instead of the defaults.
pub fn try_parse_config_string(config_str: &str) -> Result<ReportConfig, ReportError> {
    let config: Value = toml::from_str(config_str).map_err(|e| ReportError::ConfigError {
        message: format!("Invalid TOML: {}", e),
        suggestion: "Run `reportpdf --print-config` for a valid starting point".to_string(),
    })?;

    let defaults = ReportConfig::default();
    Ok(ReportConfig {
        page: parse_page(config.get("page"), defaults.page),
        limits: parse_limits(config.get("limits"), defaults.limits),
        style: parse_style(config.get("style"), defaults.style),
        font_family: parse_font_family(config.get("style"), defaults.font_family),
        export: parse_export(config.get("export"), defaults.export),
    })
}

/// Reads a configuration file the user named explicitly. Unlike
/// [`load_config_from_source`], a missing or invalid file is an error.
///
/// Relative logo paths in the file resolve against the file's directory.
pub fn load_config_file(path: &str) -> Result<ReportConfig, ReportError> {
    let config_path = Path::new(path);
    let config_str = fs::read_to_string(config_path).map_err(|e| ReportError::ConfigError {
        message: format!("Could not read config {}: {}", config_path.display(), e),
        suggestion: format!(
            "Create it with `reportpdf --print-config > {}`",
            config_path.display()
        ),
    })?;
    let mut config = try_parse_config_string(&config_str)?;
    config.export.asset_dir = config_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf);
    Ok(config)
}

/// Loads the configuration from the provided source.
///
/// # Examples
/// ```rust
/// use reportpdf::config::{ConfigSource, load_config_from_source};
///
/// let config = load_config_from_source(ConfigSource::Default);
/// assert_eq!(config.page.zoom, 100.0);
///
/// // A missing file falls back to defaults
/// let config = load_config_from_source(ConfigSource::File("missing.toml"));
/// assert_eq!(config.limits.sections_per_page, 2);
/// ```
pub fn load_config_from_source(source: ConfigSource) -> ReportConfig {
    match source {
        ConfigSource::Default => ReportConfig::default(),
        ConfigSource::File(path) => load_config_file(path).unwrap_or_else(|e| {
            warn!("{}, using defaults", e);
            ReportConfig::default()
        }),
        ConfigSource::Embedded(content) => parse_config_string(content),
    }
}

/// Renders the default configuration as a commented TOML document.
pub fn default_config_toml() -> String {
    let c = ReportConfig::default();
    let l = &c.limits;
    let s = &c.style;
    let b = &c.export.browser;
    format!(
        r##"# reportpdf configuration

[page]
# letter, a4 or legal
format = "{format}"
zoom = {zoom}
dpi = {dpi}

[limits]
cover_highlights = {ch}
cover_performance_rows = {cp}
cover_table_rows = {ctr}
cover_table_columns = {ctc}
extended_table_rows = {etr}
overflow_row_threshold = {ort}
sections_per_page = {spp}
cover_section_chars = {csc}
section_chars = {sc}

[style]
# helvetica, times or courier
font_family = "{family}"
# sizes in points at 100% zoom
title_size = {title:?}
heading_size = {heading:?}
body_size = {body:?}
small_size = {small:?}
table_size = {table:?}
footer_size = {footer:?}
badge_size = {badge:?}
page_padding = {padding:?}
block_spacing = {spacing:?}
sidebar_width = {sidebar:?}
rule_width = {rule:?}

[export]
# rasterize, print, headless or typeset
strategy = "{strategy}"
# report or investment
kind = "{kind}"
site_url = "{site}"
copyright = "{copyright}"
# logo = "https://example.com/logo.png"
allow_remote_logo = {remote}
viewport = {{ width = {vw}, height = {vh} }}
device_scale_factor = {dsf:?}
ready_timeout_secs = {timeout}
"##,
        format = c.page.format.name(),
        zoom = c.page.zoom,
        dpi = c.page.dpi,
        ch = l.cover_highlights,
        cp = l.cover_performance_rows,
        ctr = l.cover_table_rows,
        ctc = l.cover_table_columns,
        etr = l.extended_table_rows,
        ort = l.overflow_row_threshold,
        spp = l.sections_per_page,
        csc = l.cover_section_chars,
        sc = l.section_chars,
        title = s.title_size,
        heading = s.heading_size,
        body = s.body_size,
        small = s.small_size,
        table = s.table_size,
        footer = s.footer_size,
        badge = s.badge_size,
        padding = s.page_padding,
        spacing = s.block_spacing,
        sidebar = s.sidebar_width,
        rule = s.rule_width,
        family = c.font_family.name(),
        remote = c.export.allow_remote_logo,
        strategy = c.export.strategy.name(),
        kind = c.export.kind.name(),
        site = c.export.site_url,
        copyright = c.export.copyright_holder,
        vw = b.viewport_width,
        vh = b.viewport_height,
        dsf = b.device_scale_factor,
        timeout = b.ready_timeout.as_secs(),
    )
}
