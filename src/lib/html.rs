//! Self-contained HTML rendering of page layouts.
//!
//! The document produced here is shared by the browser-backed exports and by the print
//! export. It inlines every style, embeds the logo as a data URI when one is available,
//! carries `@page` rules matching the selected page format, and marks `<body>` with
//! [`READY_ATTRIBUTE`] once the window has finished loading so capture code can wait for
//! an explicit signal instead of sleeping.

use crate::fonts::BuiltinFamily;
use crate::layout::{
    Block, ContinuationHeader, CoverHeader, PageFooter, PageHeader, PageLayout, ScaledMetrics,
};
use crate::page_size::{dimensions, PageFormat, MARGIN_HORIZONTAL_IN, MARGIN_VERTICAL_IN};
use crate::pagination::TableSlice;
use crate::report::{AnalystInfo, PerformanceRow};
use crate::text::escape_html;
use crate::vocabulary::BRAND;
use std::fmt::Write;

/// CSS selector matching one rendered page.
pub const PAGE_SELECTOR: &str = ".pdf-page";
/// Attribute set on `<body>` after the window `load` event.
pub const READY_ATTRIBUTE: &str = "data-report-ready";
/// Selector that matches once the document is ready for capture.
pub const READY_SELECTOR: &str = "body[data-report-ready]";

#[derive(Debug, Clone, Default)]
pub struct HtmlOptions {
    /// Document `<title>`.
    pub title: String,
    /// Logo already encoded as a `data:` URI.
    pub logo_data_uri: Option<String>,
    pub font_family: BuiltinFamily,
}

/// Renders all pages into one HTML document.
pub fn render_html(pages: &[PageLayout], format: PageFormat, options: &HtmlOptions) -> String {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape_html(&options.title));
    out.push_str("<style>\n");
    out.push_str(&stylesheet(
        format,
        pages.first().map(|p| &p.metrics),
        options.font_family,
    ));
    out.push_str("</style>\n</head>\n<body>\n");

    for page in pages {
        render_page(&mut out, page, options);
    }

    let _ = writeln!(
        out,
        "<script>window.addEventListener('load', function () {{ document.body.setAttribute('{}', 'true'); }});</script>",
        READY_ATTRIBUTE
    );
    out.push_str("</body>\n</html>\n");
    out
}

/// The stylesheet: `@page` size and margins, page breaks and zoom-scaled type sizes.
pub fn stylesheet(
    format: PageFormat,
    metrics: Option<&ScaledMetrics>,
    family: BuiltinFamily,
) -> String {
    let default_metrics = crate::layout::BaseMetrics::default().scaled(100.0);
    let m = metrics.unwrap_or(&default_metrics);
    let brand = BRAND.hex();
    format!(
        r#"@page {{ size: {size}; margin: {mv}in {mh}in; }}
* {{ box-sizing: border-box; }}
body {{ margin: 0; background: #e5e7eb; color: #111827; font-family: {family}; font-size: {body}pt; -webkit-print-color-adjust: exact; print-color-adjust: exact; }}
.pdf-page {{ position: relative; margin: 0 auto 16px; padding: {pad}pt; background: #ffffff; overflow: hidden; display: flex; flex-direction: column; page-break-after: always; break-after: page; }}
.pdf-page:last-child {{ page-break-after: auto; break-after: auto; margin-bottom: 0; }}
.page-header {{ border-bottom: {rule}pt solid {brand}; padding-bottom: {gap}pt; margin-bottom: {gap}pt; }}
.page-header h1 {{ margin: 0; font-size: {title}pt; color: {brand}; }}
.page-header .company {{ font-size: {heading}pt; font-weight: bold; }}
.page-header .meta {{ font-size: {small}pt; color: #4b5563; }}
.page-header img.logo {{ float: right; max-height: {title}pt; }}
.badge {{ display: inline-block; padding: 2pt 6pt; border-radius: 3pt; font-size: {badge}pt; font-weight: bold; }}
.badge.sector {{ background: #eef2ff; color: {brand}; }}
.badge.rating {{ color: #ffffff; }}
.price-box {{ font-size: {small}pt; margin-top: 4pt; }}
.page-body {{ flex: 1; display: flex; gap: {gap}pt; }}
.page-body .main {{ flex: 1; min-width: 0; }}
.sidebar {{ width: {sidebar}pt; flex: none; font-size: {small}pt; border-left: {rule}pt solid #d1d5db; padding-left: {gap}pt; }}
h2 {{ font-size: {heading}pt; color: {brand}; margin: 0 0 4pt 0; }}
h3 {{ font-size: {small}pt; text-transform: uppercase; margin: {gap}pt 0 4pt 0; }}
.block {{ margin-bottom: {gap}pt; }}
p {{ margin: 0 0 4pt 0; line-height: 1.35; }}
ul {{ margin: 0; padding-left: 14pt; }}
li.more {{ list-style: none; color: #6b7280; font-style: italic; }}
table {{ width: 100%; border-collapse: collapse; font-size: {table}pt; }}
th {{ background: {brand}; color: #ffffff; text-align: left; padding: 2pt 4pt; }}
td {{ border-bottom: 0.5pt solid #e5e7eb; padding: 2pt 4pt; }}
dl {{ margin: 0; display: grid; grid-template-columns: auto auto; gap: 2pt 6pt; }}
dt {{ color: #6b7280; }}
dd {{ margin: 0; text-align: right; }}
.placeholder {{ flex: 1; display: flex; align-items: center; justify-content: center; color: #9ca3af; font-style: italic; }}
.page-footer {{ margin-top: auto; border-top: {rule}pt solid #d1d5db; padding-top: 4pt; font-size: {footer}pt; color: #6b7280; }}
.page-footer .row {{ display: flex; justify-content: space-between; }}
.disclaimer {{ margin-bottom: 4pt; }}
table, tr, .block, .sidebar, .page-header, .page-footer {{ page-break-inside: avoid; break-inside: avoid; }}
@media print {{
  body {{ background: #ffffff; }}
  .pdf-page {{ width: auto !important; height: auto !important; min-height: 100vh; margin: 0; padding: 0; overflow: visible; }}
}}
"#,
        size = dimensions(format).css_size(),
        mv = MARGIN_VERTICAL_IN,
        mh = MARGIN_HORIZONTAL_IN,
        body = m.body_size,
        pad = m.page_padding,
        rule = m.rule_width,
        gap = m.block_spacing,
        title = m.title_size,
        heading = m.heading_size,
        small = m.small_size,
        badge = m.badge_size,
        sidebar = m.sidebar_width,
        table = m.table_size,
        footer = m.footer_size,
        brand = brand,
        family = family.css_stack(),
    )
}

fn render_page(out: &mut String, page: &PageLayout, options: &HtmlOptions) {
    let _ = writeln!(
        out,
        "<div class=\"pdf-page\" data-page=\"{}\" style=\"width: {:.2}px; height: {:.2}px;\">",
        page.page_index, page.pixel_width, page.pixel_height
    );

    match &page.header {
        PageHeader::Cover(header) => render_cover_header(out, header, options),
        PageHeader::Continuation(header) => render_continuation_header(out, header, page),
    }

    out.push_str("<div class=\"page-body\">\n<div class=\"main\">\n");
    let mut sidebar = None;
    for block in &page.blocks {
        match block {
            Block::Sidebar {
                performance,
                company_data,
                analyst,
            } => sidebar = Some((performance, company_data, analyst)),
            other => render_block(out, other),
        }
    }
    out.push_str("</div>\n");
    if let Some((performance, company_data, analyst)) = sidebar {
        render_sidebar(out, performance, company_data, analyst);
    }
    out.push_str("</div>\n");

    render_footer(out, &page.footer);
    out.push_str("</div>\n");
}

fn render_cover_header(out: &mut String, header: &CoverHeader, options: &HtmlOptions) {
    out.push_str("<header class=\"page-header cover\">\n");
    if let Some(logo) = &options.logo_data_uri {
        let _ = writeln!(out, "<img class=\"logo\" src=\"{}\" alt=\"\">", escape_html(logo));
    }
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&header.title));
    let _ = writeln!(
        out,
        "<div class=\"company\">{} <span class=\"meta\">{}</span></div>",
        escape_html(&header.company),
        escape_html(&header.tickers)
    );
    let _ = write!(out, "<div class=\"meta\">{}", escape_html(&header.date));
    if !header.sector.trim().is_empty() {
        let _ = write!(
            out,
            " <span class=\"badge sector\">{}</span>",
            escape_html(&header.sector)
        );
    }
    let _ = writeln!(
        out,
        " <span class=\"badge rating\" style=\"background: {};\">{}</span></div>",
        header.rating_color.hex(),
        header.rating_label
    );

    let mut facts = Vec::new();
    if !header.current_price.is_empty() {
        facts.push(format!("Price: {}", escape_html(&header.current_price)));
    }
    if !header.fair_value.is_empty() {
        facts.push(format!("Fair Value: {}", escape_html(&header.fair_value)));
    }
    if let Some(risk) = header.risk_score {
        facts.push(format!("Risk Score: {}", risk));
    }
    if !facts.is_empty() {
        let _ = writeln!(out, "<div class=\"price-box\">{}</div>", facts.join(" | "));
    }
    out.push_str("</header>\n");
}

fn render_continuation_header(out: &mut String, header: &ContinuationHeader, page: &PageLayout) {
    let _ = writeln!(
        out,
        "<header class=\"page-header continuation\"><div class=\"company\">{} <span class=\"meta\">{}</span></div><div class=\"meta\">{} | Page {}</div></header>",
        escape_html(&header.company),
        escape_html(&header.tickers),
        escape_html(&header.date),
        page.page_index
    );
}

fn render_block(out: &mut String, block: &Block) {
    match block {
        Block::Summary { text } => {
            out.push_str("<section class=\"block summary\">\n<h2>Executive Summary</h2>\n");
            push_paragraphs(out, text);
            out.push_str("</section>\n");
        }
        Block::Highlights { items, more } => {
            out.push_str("<section class=\"block highlights\">\n<h2>Key Highlights</h2>\n<ul>\n");
            for item in items {
                let _ = writeln!(out, "<li>{}</li>", escape_html(item));
            }
            if *more > 0 {
                let _ = writeln!(out, "<li class=\"more\">+{} more on page 2</li>", more);
            }
            out.push_str("</ul>\n</section>\n");
        }
        Block::FinancialTable { caption, table } => {
            out.push_str("<section class=\"block financials\">\n");
            let _ = writeln!(out, "<h2>{}</h2>", escape_html(caption));
            render_table(out, table);
            out.push_str("</section>\n");
        }
        Block::Section {
            title,
            text,
            truncated,
        } => {
            let class = if *truncated {
                "block analysis truncated"
            } else {
                "block analysis"
            };
            let _ = writeln!(out, "<section class=\"{}\">", class);
            let _ = writeln!(out, "<h2>{}</h2>", escape_html(title));
            push_paragraphs(out, text);
            out.push_str("</section>\n");
        }
        Block::Placeholder { text } => {
            let _ = writeln!(out, "<div class=\"placeholder\">{}</div>", escape_html(text));
        }
        Block::Sidebar { .. } => {}
    }
}

fn render_table(out: &mut String, table: &TableSlice) {
    out.push_str("<table>\n<thead><tr>");
    for column in &table.header {
        let _ = write!(out, "<th>{}</th>", escape_html(column));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");
}

fn render_sidebar(
    out: &mut String,
    performance: &[PerformanceRow],
    company_data: &[(String, String)],
    analyst: &AnalystInfo,
) {
    out.push_str("<aside class=\"sidebar\">\n");
    if !performance.is_empty() {
        out.push_str("<h3>Performance</h3>\n<table>\n<thead><tr><th>Security</th><th>YTD</th><th>1M</th></tr></thead>\n<tbody>\n");
        for row in performance {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&row.security),
                escape_html(&row.ytd_return),
                escape_html(&row.one_month_return)
            );
        }
        out.push_str("</tbody>\n</table>\n");
    }

    out.push_str("<h3>Company Data</h3>\n<dl>\n");
    for (label, value) in company_data {
        let _ = writeln!(
            out,
            "<dt>{}</dt><dd>{}</dd>",
            escape_html(label),
            escape_html(value)
        );
    }
    out.push_str("</dl>\n");

    if !analyst.name.trim().is_empty() {
        out.push_str("<h3>Analyst</h3>\n");
        let _ = writeln!(out, "<p><strong>{}</strong>", escape_html(&analyst.name));
        if !analyst.title.is_empty() {
            let _ = write!(out, "<br>{}", escape_html(&analyst.title));
        }
        if !analyst.credentials.is_empty() {
            let _ = write!(out, "<br>{}", escape_html(&analyst.credentials));
        }
        out.push_str("</p>\n");
    }
    out.push_str("</aside>\n");
}

fn render_footer(out: &mut String, footer: &PageFooter) {
    out.push_str("<footer class=\"page-footer\">\n");
    if let Some(disclaimer) = &footer.disclaimer {
        if !disclaimer.trim().is_empty() {
            let _ = writeln!(
                out,
                "<div class=\"disclaimer\">{}</div>",
                escape_html(disclaimer)
            );
        }
    }
    let _ = writeln!(
        out,
        "<div class=\"row\"><span>{}</span><span class=\"page-number\">{}</span><span>{}</span></div>",
        escape_html(&footer.copyright),
        escape_html(&footer.page_label),
        escape_html(&footer.site_url)
    );
    out.push_str("</footer>\n");
}

fn push_paragraphs(out: &mut String, text: &str) {
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "<p>{}</p>", escape_html(line));
    }
}
