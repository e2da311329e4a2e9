//! Page rendering: turns one page's content slice into a zoom-aware layout.
//!
//! The renderer is a pure function of the page index, the report, the pixel
//! dimensions of the page and the zoom level. Every size in the produced layout is
//! derived from a base value in points multiplied by `zoom / 100`, so zooming only
//! changes the absolute scale of a page and never its relative layout.
//!
//! All export strategies consume the [`PageLayout`] values produced here; none of
//! them re-derives pagination on its own.

use crate::page_size::{dimensions, to_pixels, PageFormat, PixelDimensions, DEFAULT_DPI};
use crate::pagination::{
    compute_total_pages_with, detail_highlights_with, slice_for_page_with, ContentSlice, CoverSlice, PaginationLimits,
    SectionExcerpt, TableSlice,
};
use crate::report::{format_tickers, AnalystInfo, PerformanceRow, Rating, ReportData};
use crate::vocabulary::{rating_color, Rgb};
use chrono::Datelike;

/// Base sizes, in points, at 100% zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseMetrics {
    pub title_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    pub small_size: f32,
    pub table_size: f32,
    pub footer_size: f32,
    pub badge_size: f32,
    pub page_padding: f32,
    pub block_spacing: f32,
    pub sidebar_width: f32,
    pub rule_width: f32,
}

impl Default for BaseMetrics {
    fn default() -> Self {
        Self {
            title_size: 20.0,
            heading_size: 12.0,
            body_size: 9.5,
            small_size: 8.0,
            table_size: 8.0,
            footer_size: 7.0,
            badge_size: 10.0,
            page_padding: 36.0,
            block_spacing: 12.0,
            sidebar_width: 170.0,
            rule_width: 1.0,
        }
    }
}

/// Scales a base size in points by `zoom_percent / 100`.
pub fn scale_pt(base: f32, zoom_percent: f32) -> f32 {
    base * zoom_percent / 100.0
}

impl BaseMetrics {
    pub fn scaled(&self, zoom_percent: f32) -> ScaledMetrics {
        let s = |v: f32| scale_pt(v, zoom_percent);
        ScaledMetrics {
            title_size: s(self.title_size),
            heading_size: s(self.heading_size),
            body_size: s(self.body_size),
            small_size: s(self.small_size),
            table_size: s(self.table_size),
            footer_size: s(self.footer_size),
            badge_size: s(self.badge_size),
            page_padding: s(self.page_padding),
            block_spacing: s(self.block_spacing),
            sidebar_width: s(self.sidebar_width),
            rule_width: s(self.rule_width),
        }
    }
}

/// [`BaseMetrics`] after zoom has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMetrics {
    pub title_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    pub small_size: f32,
    pub table_size: f32,
    pub footer_size: f32,
    pub badge_size: f32,
    pub page_padding: f32,
    pub block_spacing: f32,
    pub sidebar_width: f32,
    pub rule_width: f32,
}

/// Everything the renderer needs beyond the report itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub limits: PaginationLimits,
    pub metrics: BaseMetrics,
    pub dpi: f32,
    pub site_url: String,
    pub copyright_holder: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            limits: PaginationLimits::default(),
            metrics: BaseMetrics::default(),
            dpi: DEFAULT_DPI,
            site_url: "www.example-research.com".to_string(),
            copyright_holder: "Equity Research".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverHeader {
    pub title: String,
    pub company: String,
    pub tickers: String,
    pub date: String,
    pub sector: String,
    pub rating: Rating,
    pub rating_label: &'static str,
    pub rating_color: Rgb,
    pub current_price: String,
    pub fair_value: String,
    pub risk_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationHeader {
    pub company: String,
    pub tickers: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageHeader {
    Cover(CoverHeader),
    Continuation(ContinuationHeader),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Summary {
        text: String,
    },
    Highlights {
        items: Vec<String>,
        more: usize,
    },
    Sidebar {
        performance: Vec<PerformanceRow>,
        company_data: Vec<(String, String)>,
        analyst: AnalystInfo,
    },
    FinancialTable {
        caption: String,
        table: TableSlice,
    },
    Section {
        title: String,
        text: String,
        truncated: bool,
    },
    Placeholder {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageFooter {
    pub copyright: String,
    pub page_label: String,
    pub site_url: String,
    /// Legal disclaimer, present on the first page only.
    pub disclaimer: Option<String>,
}

/// A fully laid-out page, ready for any export strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 1-based page number.
    pub page_index: usize,
    pub total_pages: usize,
    pub pixel_width: f32,
    pub pixel_height: f32,
    pub zoom: f32,
    pub metrics: ScaledMetrics,
    pub header: PageHeader,
    pub blocks: Vec<Block>,
    pub footer: PageFooter,
}

/// Renders one page with default options.
pub fn render(
    page_index: usize,
    report: &ReportData,
    pixels: PixelDimensions,
    zoom_percent: f32,
) -> PageLayout {
    render_with(
        page_index,
        report,
        pixels,
        zoom_percent,
        &RenderOptions::default(),
    )
}

pub fn render_with(
    page_index: usize,
    report: &ReportData,
    pixels: PixelDimensions,
    zoom_percent: f32,
    options: &RenderOptions,
) -> PageLayout {
    let total_pages = compute_total_pages_with(report, &options.limits);
    let slice = slice_for_page_with(page_index, report, &options.limits);

    let header = if page_index == 1 {
        PageHeader::Cover(cover_header(report))
    } else {
        PageHeader::Continuation(ContinuationHeader {
            company: report.display_name().to_string(),
            tickers: format_tickers(&report.metadata.tickers),
            date: report.metadata.date.format("%B %-d, %Y").to_string(),
        })
    };

    let mut blocks = match slice {
        ContentSlice::Cover(cover) => cover_blocks(*cover, report),
        ContentSlice::ExtendedFinancials(table) => {
            let caption = if table.first_row > options.limits.cover_table_rows {
                "Extended Financial Data (continued)"
            } else {
                "Extended Financial Data"
            };
            vec![Block::FinancialTable {
                caption: caption.to_string(),
                table,
            }]
        }
        ContentSlice::Sections(sections) => sections.into_iter().map(section_block).collect(),
        ContentSlice::Placeholder(text) => vec![Block::Placeholder { text }],
    };

    let highlights = detail_highlights_with(page_index, report, &options.limits);
    if !highlights.is_empty() {
        blocks.retain(|b| !matches!(b, Block::Placeholder { .. }));
        blocks.insert(
            0,
            Block::Highlights {
                items: highlights,
                more: 0,
            },
        );
    }

    let footer = PageFooter {
        copyright: format!(
            "Copyright {} {}. All rights reserved.",
            report.metadata.date.year(),
            options.copyright_holder
        ),
        page_label: format!("Page {} of {}", page_index, total_pages),
        site_url: options.site_url.clone(),
        disclaimer: (page_index == 1).then(|| report.disclaimer.clone()),
    };

    PageLayout {
        page_index,
        total_pages,
        pixel_width: pixels.width,
        pixel_height: pixels.height,
        zoom: zoom_percent,
        metrics: options.metrics.scaled(zoom_percent),
        header,
        blocks,
        footer,
    }
}

/// Renders every page of the report for the given page format and zoom.
pub fn render_document(
    report: &ReportData,
    format: PageFormat,
    zoom_percent: f32,
    options: &RenderOptions,
) -> Vec<PageLayout> {
    let pixels = to_pixels(dimensions(format), options.dpi, zoom_percent);
    let total = compute_total_pages_with(report, &options.limits);
    (1..=total)
        .map(|page| render_with(page, report, pixels, zoom_percent, options))
        .collect()
}

fn cover_header(report: &ReportData) -> CoverHeader {
    let meta = &report.metadata;
    let title = if report.title.trim().is_empty() {
        format!("{} Research Report", report.display_name())
    } else {
        report.title.clone()
    };
    CoverHeader {
        title,
        company: report.display_name().to_string(),
        tickers: format_tickers(&meta.tickers),
        date: meta.date.format("%B %-d, %Y").to_string(),
        sector: meta.sector.clone(),
        rating: meta.rating,
        rating_label: meta.rating.label(),
        rating_color: rating_color(meta.rating),
        current_price: meta.current_price.clone(),
        fair_value: meta.fair_value.clone(),
        risk_score: meta.risk_score,
    }
}

fn cover_blocks(cover: CoverSlice, report: &ReportData) -> Vec<Block> {
    let mut blocks = Vec::new();

    if !cover.executive_summary.is_empty() {
        blocks.push(Block::Summary {
            text: cover.executive_summary,
        });
    }
    if !cover.highlights.is_empty() {
        blocks.push(Block::Highlights {
            items: cover.highlights,
            more: cover.hidden_highlights,
        });
    }

    blocks.push(Block::Sidebar {
        performance: cover.performance,
        company_data: cover
            .company_data
            .into_iter()
            .map(|(metric, value)| (metric.label().to_string(), value))
            .collect(),
        analyst: report.analyst_info.clone(),
    });

    if !cover.table.is_empty() {
        blocks.push(Block::FinancialTable {
            caption: "Financial Summary".to_string(),
            table: cover.table,
        });
    }
    if let Some(lead) = cover.lead_section {
        blocks.push(section_block(lead));
    }
    blocks
}

fn section_block(excerpt: SectionExcerpt) -> Block {
    Block::Section {
        title: excerpt.title,
        text: excerpt.text,
        truncated: excerpt.truncated,
    }
}
