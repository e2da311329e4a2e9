//! Vector PDF export built directly with genpdfi_extended.
//!
//! No browser is involved. Each [`PageLayout`] becomes a run of genpdfi_extended elements
//! followed by a forced page break, so logical pages never share a physical page. A logical
//! page whose content does not fit flows onto extra physical pages; the artifact reports the
//! physical page count.

use std::io::Cursor;

use genpdfi_extended::elements::{
    Break, FrameCellDecorator, PageBreak, Paragraph, TableLayout,
};
use genpdfi_extended::style::{Color, Style};
use genpdfi_extended::{Alignment, Document, Margins, SimplePageDecorator, Size};
use log::{debug, warn};

use super::{ExportArtifact, ExportCapability, ExportRequest, ExportStrategy};
use crate::fonts::load_report_fonts;
use crate::layout::{Block, CoverHeader, PageFooter, PageHeader, PageLayout, ScaledMetrics};
use crate::page_size::{dimensions, MARGIN_HORIZONTAL_IN, MARGIN_VERTICAL_IN};
use crate::pagination::TableSlice;
use crate::report::ReportData;
use crate::vocabulary::{Rgb, BRAND, GRAY};
use crate::ReportError;

const STRATEGY: &str = "typeset";
const MM_PER_INCH: f32 = 25.4;
/// Nominal line height used to turn point spacing into break lines.
const LINE_HEIGHT_PT: f32 = 12.0;

/// Renders pages as native PDF text and tables.
pub struct TypesetStrategy;

impl ExportStrategy for TypesetStrategy {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn capability(&self) -> ExportCapability {
        ExportCapability::Typeset
    }

    fn export(
        &self,
        report: &ReportData,
        request: &ExportRequest,
    ) -> Result<ExportArtifact, ReportError> {
        let pages = request.layouts(report);
        let title = format!("{} {}", report.display_name(), request.kind.label());
        let document = build_document(&pages, request, &title)?;

        let mut buffer = Cursor::new(Vec::new());
        document
            .render(&mut buffer)
            .map_err(|e| ReportError::export_error(STRATEGY, format!("Rendering failed: {}", e)))?;
        let bytes = buffer.into_inner();

        let page_count = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc.get_pages().len(),
            Err(e) => {
                warn!("Could not count typeset pages: {}", e);
                pages.len()
            }
        };
        if page_count > pages.len() {
            debug!(
                "{} logical pages flowed onto {} physical pages",
                pages.len(),
                page_count
            );
        }

        Ok(ExportArtifact {
            filename: request.filename(report, "pdf"),
            mime_type: "application/pdf",
            bytes,
            page_count,
            placeholder_pages: 0,
        })
    }
}

/// Lays out every page into one genpdfi_extended document.
pub fn build_document(
    pages: &[PageLayout],
    request: &ExportRequest,
    title: &str,
) -> Result<Document, ReportError> {
    let fonts = load_report_fonts(request.font_family)?;
    let mut doc = Document::new(fonts);
    doc.set_title(title);

    let (width_mm, height_mm) = dimensions(request.format).to_millimeters();
    doc.set_paper_size(Size::new(width_mm, height_mm));

    let mut decorator = SimplePageDecorator::new();
    let vertical = MARGIN_VERTICAL_IN * MM_PER_INCH;
    let horizontal = MARGIN_HORIZONTAL_IN * MM_PER_INCH;
    decorator.set_margins(Margins::trbl(vertical, horizontal, vertical, horizontal));
    doc.set_page_decorator(decorator);

    let body = pages
        .first()
        .map(|p| p.metrics.body_size)
        .unwrap_or(9.5);
    doc.set_font_size(font_size(body));

    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            doc.push(PageBreak::new());
        }
        push_page(&mut doc, page);
    }
    Ok(doc)
}

/// genpdfi_extended sizes fonts in whole points.
fn font_size(points: f32) -> u8 {
    points.round().clamp(1.0, 255.0) as u8
}

/// Breaks are measured in lines, not points.
fn gap(points: f32) -> f32 {
    points / LINE_HEIGHT_PT
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn push_page(doc: &mut Document, page: &PageLayout) {
    let m = &page.metrics;
    match &page.header {
        PageHeader::Cover(header) => push_cover_header(doc, header, m),
        PageHeader::Continuation(header) => {
            let mut para = Paragraph::default();
            para.push_styled(
                header.company.clone(),
                Style::new().with_font_size(font_size(m.heading_size)).bold(),
            );
            if !header.tickers.is_empty() {
                para.push_styled(
                    format!("  {}", header.tickers),
                    Style::new().with_font_size(font_size(m.small_size)),
                );
            }
            doc.push(para);
            doc.push(small_line(
                &format!("{}  |  Page {}", header.date, page.page_index),
                m,
            ));
        }
    }
    doc.push(Break::new(gap(m.block_spacing)));

    for block in &page.blocks {
        push_block(doc, block, m);
        doc.push(Break::new(gap(m.block_spacing)));
    }

    push_footer(doc, &page.footer, m);
}

fn push_cover_header(doc: &mut Document, header: &CoverHeader, m: &ScaledMetrics) {
    let mut title = Paragraph::default();
    title.push_styled(
        header.title.clone(),
        Style::new()
            .with_font_size(font_size(m.title_size))
            .bold()
            .with_color(color(BRAND)),
    );
    doc.push(title);

    let mut company = Paragraph::default();
    company.push_styled(
        header.company.clone(),
        Style::new().with_font_size(font_size(m.heading_size)).bold(),
    );
    if !header.tickers.is_empty() {
        company.push_styled(
            format!("  {}", header.tickers),
            Style::new().with_font_size(font_size(m.small_size)),
        );
    }
    doc.push(company);

    let mut badges = Paragraph::default();
    let badge = Style::new().with_font_size(font_size(m.badge_size)).bold();
    if !header.sector.is_empty() {
        badges.push_styled(format!("{}   ", header.sector), badge.with_color(color(BRAND)));
    }
    badges.push_styled(
        header.rating_label.to_string(),
        badge.with_color(color(header.rating_color)),
    );
    doc.push(badges);

    let mut prices = vec![header.date.clone()];
    if !header.current_price.is_empty() {
        prices.push(format!("Price: {}", header.current_price));
    }
    if !header.fair_value.is_empty() {
        prices.push(format!("Fair value: {}", header.fair_value));
    }
    if let Some(risk) = header.risk_score {
        prices.push(format!("Risk: {}/10", risk));
    }
    doc.push(small_line(&prices.join("  |  "), m));
}

fn push_block(doc: &mut Document, block: &Block, m: &ScaledMetrics) {
    match block {
        Block::Summary { text } => {
            doc.push(heading("Executive Summary", m));
            push_text(doc, text, m);
        }
        Block::Highlights { items, more } => {
            doc.push(heading("Key Highlights", m));
            for item in items {
                let mut para = Paragraph::default();
                para.push_styled(
                    format!("- {}", item),
                    Style::new().with_font_size(font_size(m.body_size)),
                );
                doc.push(para);
            }
            if *more > 0 {
                let mut para = Paragraph::default();
                para.push_styled(
                    format!("+ {} more on page 2", more),
                    Style::new()
                        .with_font_size(font_size(m.small_size))
                        .italic()
                        .with_color(color(GRAY)),
                );
                doc.push(para);
            }
        }
        Block::Sidebar {
            performance,
            company_data,
            analyst,
        } => {
            if !performance.is_empty() {
                doc.push(heading("Performance", m));
                let rows: Vec<Vec<String>> = performance
                    .iter()
                    .map(|row| {
                        vec![
                            row.security.clone(),
                            row.ytd_return.clone(),
                            row.one_month_return.clone(),
                        ]
                    })
                    .collect();
                push_table(doc, &["Security", "YTD", "1M"], &rows, m);
            }
            if !company_data.is_empty() {
                doc.push(heading("Company Data", m));
                let rows: Vec<Vec<String>> = company_data
                    .iter()
                    .map(|(label, value)| vec![label.clone(), value.clone()])
                    .collect();
                push_table(doc, &["Metric", "Value"], &rows, m);
            }
            if !analyst.name.is_empty() {
                doc.push(heading("Analyst", m));
                let mut para = Paragraph::default();
                para.push_styled(
                    analyst.name.clone(),
                    Style::new().with_font_size(font_size(m.small_size)).bold(),
                );
                doc.push(para);
                let details: Vec<&str> = [analyst.title.as_str(), analyst.credentials.as_str()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect();
                if !details.is_empty() {
                    doc.push(small_line(&details.join(", "), m));
                }
            }
        }
        Block::FinancialTable { caption, table } => {
            doc.push(heading(caption, m));
            push_table_slice(doc, table, m);
        }
        Block::Section {
            title,
            text,
            truncated,
        } => {
            doc.push(heading(title, m));
            push_text(doc, text, m);
            if *truncated {
                debug!("Section '{}' truncated for layout", title);
            }
        }
        Block::Placeholder { text } => {
            doc.push(Break::new(gap(m.block_spacing) * 4.0));
            let mut para = Paragraph::default();
            para.set_alignment(Alignment::Center);
            para.push_styled(
                text.clone(),
                Style::new()
                    .with_font_size(font_size(m.heading_size))
                    .italic()
                    .with_color(color(GRAY)),
            );
            doc.push(para);
        }
    }
}

fn heading(text: &str, m: &ScaledMetrics) -> Paragraph {
    let mut para = Paragraph::default();
    para.push_styled(
        text.to_string(),
        Style::new()
            .with_font_size(font_size(m.heading_size))
            .bold()
            .with_color(color(BRAND)),
    );
    para
}

fn small_line(text: &str, m: &ScaledMetrics) -> Paragraph {
    let mut para = Paragraph::default();
    para.push_styled(
        text.to_string(),
        Style::new()
            .with_font_size(font_size(m.small_size))
            .with_color(color(GRAY)),
    );
    para
}

fn push_text(doc: &mut Document, text: &str, m: &ScaledMetrics) {
    let style = Style::new().with_font_size(font_size(m.body_size));
    for chunk in text.split("\n\n").map(str::trim).filter(|c| !c.is_empty()) {
        let mut para = Paragraph::default();
        para.push_styled(chunk.to_string(), style);
        doc.push(para);
    }
}

fn push_table_slice(doc: &mut Document, table: &TableSlice, m: &ScaledMetrics) {
    let header: Vec<&str> = table.header.iter().map(String::as_str).collect();
    push_table(doc, &header, &table.rows, m);
}

fn push_table(doc: &mut Document, header: &[&str], rows: &[Vec<String>], m: &ScaledMetrics) {
    if header.is_empty() {
        return;
    }
    let mut table = TableLayout::new(vec![1; header.len()]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header_style = Style::new().with_font_size(font_size(m.table_size)).bold();
    let mut header_row = table.row();
    for cell in header {
        let mut para = Paragraph::default();
        para.push_styled(cell.to_string(), header_style);
        header_row.push_element(para);
    }
    if header_row.push().is_err() {
        warn!("Failed rendering a table header");
        return;
    }

    let cell_style = Style::new().with_font_size(font_size(m.table_size));
    for (row_idx, row) in rows.iter().enumerate() {
        let mut table_row = table.row();
        for col in 0..header.len() {
            let mut para = Paragraph::default();
            let value = row.get(col).map(String::as_str).unwrap_or("");
            para.push_styled(value.to_string(), cell_style);
            table_row.push_element(para);
        }
        if table_row.push().is_err() {
            warn!("Failed to push row {} in a table", row_idx);
        }
    }
    doc.push(table);
}

fn push_footer(doc: &mut Document, footer: &PageFooter, m: &ScaledMetrics) {
    let style = Style::new()
        .with_font_size(font_size(m.footer_size))
        .with_color(color(GRAY));
    doc.push(Break::new(gap(m.block_spacing)));
    if let Some(disclaimer) = &footer.disclaimer {
        let mut para = Paragraph::default();
        para.push_styled(disclaimer.clone(), style.italic());
        doc.push(para);
    }
    let mut para = Paragraph::default();
    para.push_styled(
        format!(
            "{}  |  {}  |  {}",
            footer.copyright, footer.site_url, footer.page_label
        ),
        style,
    );
    doc.push(para);
}
