//! Page planning for research reports.
//!
//! The number of pages is a pure function of two collection lengths: the analysis
//! sections and the financial-table rows. Page 1 is always the cover/summary page;
//! continuation pages carry two analysis sections each, and a long financial table
//! earns one extra overflow page. A report never has fewer than two pages, the second
//! one being reserved for disclosures and continuation material.
//!
//! ```rust
//! use reportpdf::pagination::compute_total_pages;
//! use reportpdf::report::{AnalysisSection, ReportData};
//!
//! let mut report = ReportData::default();
//! assert_eq!(compute_total_pages(&report), 2);
//!
//! report.additional_sections = vec![AnalysisSection::default(); 5];
//! assert_eq!(compute_total_pages(&report), 4);
//! ```

use crate::report::{CompanyMetric, PerformanceRow, ReportData, NOT_AVAILABLE};
use crate::text::{html_to_text, truncate_chars};

/// Text shown on continuation pages that have nothing left to display.
pub const PLACEHOLDER_TEXT: &str = "Additional content would appear here";

/// Capacity and truncation constants used when slicing a report into pages.
///
/// These values control visual density only; they can be tuned through the
/// `[limits]` configuration section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaginationLimits {
    pub cover_highlights: usize,
    pub cover_performance_rows: usize,
    pub cover_table_rows: usize,
    pub cover_table_columns: usize,
    pub extended_table_rows: usize,
    pub overflow_row_threshold: usize,
    pub sections_per_page: usize,
    pub cover_section_chars: usize,
    pub section_chars: usize,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            cover_highlights: 6,
            cover_performance_rows: 3,
            cover_table_rows: 4,
            cover_table_columns: 8,
            extended_table_rows: 4,
            overflow_row_threshold: 10,
            sections_per_page: 2,
            cover_section_chars: 500,
            section_chars: 800,
        }
    }
}

/// A rectangular excerpt of the financial table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSlice {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Zero-based index of the first row within the full table.
    pub first_row: usize,
}

impl TableSlice {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An analysis section reduced to plain text and truncated for its page.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionExcerpt {
    pub index: usize,
    pub title: String,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverSlice {
    pub executive_summary: String,
    pub highlights: Vec<String>,
    /// Highlights that did not fit on the cover page.
    pub hidden_highlights: usize,
    pub performance: Vec<PerformanceRow>,
    pub company_data: Vec<(CompanyMetric, String)>,
    pub table: TableSlice,
    pub lead_section: Option<SectionExcerpt>,
}

/// The content assigned to a single page.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSlice {
    Cover(Box<CoverSlice>),
    ExtendedFinancials(TableSlice),
    Sections(Vec<SectionExcerpt>),
    Placeholder(String),
}

/// Total number of pages for `report` using the default limits.
pub fn compute_total_pages(report: &ReportData) -> usize {
    compute_total_pages_with(report, &PaginationLimits::default())
}

pub fn compute_total_pages_with(report: &ReportData, limits: &PaginationLimits) -> usize {
    let sections = report.additional_sections.len();
    let per_page = limits.sections_per_page.max(1);

    let mut pages = 1;
    if sections > 0 {
        pages += sections.div_ceil(per_page);
    }
    if report.financial_table.len() > limits.overflow_row_threshold {
        pages += 1;
    }
    pages.max(2)
}

/// Content for the 1-based `page_index` using the default limits.
pub fn slice_for_page(page_index: usize, report: &ReportData) -> ContentSlice {
    slice_for_page_with(page_index, report, &PaginationLimits::default())
}

pub fn slice_for_page_with(
    page_index: usize,
    report: &ReportData,
    limits: &PaginationLimits,
) -> ContentSlice {
    let total = compute_total_pages_with(report, limits);
    if page_index == 0 || page_index > total {
        return ContentSlice::Placeholder(PLACEHOLDER_TEXT.to_string());
    }
    if page_index == 1 {
        return ContentSlice::Cover(Box::new(cover_slice(report, limits)));
    }

    let rows = report.financial_table.len();
    let overflow = rows > limits.overflow_row_threshold;
    let extended_start = limits.cover_table_rows;
    let extended_end = extended_start + limits.extended_table_rows;

    if page_index == 2 && rows > extended_start {
        // When page 2 is also the last page, the overflow rows have nowhere else to go.
        let end = if overflow && total == 2 {
            rows
        } else {
            extended_end.min(rows)
        };
        return ContentSlice::ExtendedFinancials(table_slice(
            report,
            extended_start,
            end,
            limits.cover_table_columns,
        ));
    }

    let per_page = limits.sections_per_page.max(1);
    let start = (page_index - 2) * per_page;
    let end = (start + per_page).min(report.additional_sections.len());

    if start >= end {
        if overflow && page_index == total && extended_end < rows {
            return ContentSlice::ExtendedFinancials(table_slice(
                report,
                extended_end,
                rows,
                limits.cover_table_columns,
            ));
        }
        return ContentSlice::Placeholder(PLACEHOLDER_TEXT.to_string());
    }

    ContentSlice::Sections(
        (start..end)
            .map(|idx| section_excerpt(report, idx, limits.section_chars))
            .collect(),
    )
}

/// Full highlight list for the first detail page, using the default limits.
pub fn detail_highlights(page_index: usize, report: &ReportData) -> Vec<String> {
    detail_highlights_with(page_index, report, &PaginationLimits::default())
}

/// Page 2 repeats the whole highlight list when the cover had to hide some of them.
pub fn detail_highlights_with(
    page_index: usize,
    report: &ReportData,
    limits: &PaginationLimits,
) -> Vec<String> {
    if page_index != 2 || report.highlights.len() <= limits.cover_highlights {
        return Vec::new();
    }
    report.highlights.iter().map(|h| html_to_text(h)).collect()
}

/// Slices every page of the report, in order.
pub fn plan(report: &ReportData, limits: &PaginationLimits) -> Vec<ContentSlice> {
    (1..=compute_total_pages_with(report, limits))
        .map(|page| slice_for_page_with(page, report, limits))
        .collect()
}

fn cover_slice(report: &ReportData, limits: &PaginationLimits) -> CoverSlice {
    let highlights: Vec<String> = report
        .highlights
        .iter()
        .take(limits.cover_highlights)
        .map(|h| html_to_text(h))
        .collect();

    CoverSlice {
        executive_summary: html_to_text(&report.executive_summary),
        hidden_highlights: report.highlights.len().saturating_sub(highlights.len()),
        highlights,
        performance: report
            .performance_data
            .iter()
            .take(limits.cover_performance_rows)
            .cloned()
            .collect(),
        company_data: report.company_data.entries(),
        table: table_slice(
            report,
            0,
            limits.cover_table_rows.min(report.financial_table.len()),
            limits.cover_table_columns,
        ),
        lead_section: (!report.additional_sections.is_empty())
            .then(|| section_excerpt(report, 0, limits.cover_section_chars)),
    }
}

fn table_slice(report: &ReportData, start: usize, end: usize, max_columns: usize) -> TableSlice {
    let header: Vec<String> = report
        .table_header()
        .into_iter()
        .take(max_columns)
        .collect();
    let end = end.min(report.financial_table.len());
    let start = start.min(end);

    let rows = report.financial_table[start..end]
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|column| row.get(column).unwrap_or(NOT_AVAILABLE).to_string())
                .collect()
        })
        .collect();

    TableSlice {
        header,
        rows,
        first_row: start,
    }
}

fn section_excerpt(report: &ReportData, index: usize, max_chars: usize) -> SectionExcerpt {
    let section = &report.additional_sections[index];
    let (text, truncated) = truncate_chars(&html_to_text(&section.html_content), max_chars);
    SectionExcerpt {
        index,
        title: section.title.clone(),
        text,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{AnalysisSection, FinancialRow};

    fn report_with(sections: usize, rows: usize) -> ReportData {
        let mut report = ReportData::default();
        report.additional_sections = (0..sections)
            .map(|i| AnalysisSection {
                title: format!("Section {}", i + 1),
                html_content: format!("<p>Body of section {}</p>", i + 1),
            })
            .collect();
        report.financial_table = (0..rows)
            .map(|i| {
                FinancialRow::new(
                    (0..10).map(|c| (format!("Col{}", c), format!("r{}c{}", i, c))),
                )
            })
            .collect();
        report
    }

    #[test]
    fn test_total_pages_examples() {
        assert_eq!(compute_total_pages(&report_with(0, 5)), 2);
        assert_eq!(compute_total_pages(&report_with(5, 5)), 4);
        assert_eq!(compute_total_pages(&report_with(0, 12)), 2);
        assert_eq!(compute_total_pages(&report_with(3, 4)), 3);
        assert_eq!(compute_total_pages(&report_with(4, 11)), 4);
        assert_eq!(compute_total_pages(&report_with(0, 0)), 2);
    }

    #[test]
    fn test_cover_truncation_limits() {
        let mut report = report_with(1, 6);
        report.highlights = (0..9).map(|i| format!("<li>Point {}</li>", i)).collect();
        report.performance_data = (0..5)
            .map(|i| PerformanceRow {
                security: format!("S{}", i),
                ..Default::default()
            })
            .collect();
        report.additional_sections[0].html_content = "x".repeat(900);

        let ContentSlice::Cover(cover) = slice_for_page(1, &report) else {
            panic!("page 1 must be the cover");
        };
        assert_eq!(cover.highlights.len(), 6);
        assert_eq!(cover.hidden_highlights, 3);
        assert_eq!(cover.performance.len(), 3);
        assert_eq!(cover.table.rows.len(), 4);
        assert_eq!(cover.table.header.len(), 8);
        assert!(cover.table.rows.iter().all(|r| r.len() == 8));

        let lead = cover.lead_section.expect("lead section");
        assert!(lead.truncated);
        assert_eq!(lead.text.chars().count(), 500 + crate::text::ELLIPSIS.len());
    }

    #[test]
    fn test_detail_page_lists_every_highlight() {
        let mut report = report_with(1, 0);
        report.highlights = (1..=9).map(|i| format!("<li>Point {}</li>", i)).collect();

        let full = detail_highlights(2, &report);
        assert_eq!(full.len(), 9);
        assert_eq!(full[8], "Point 9");
        assert!(detail_highlights(1, &report).is_empty());
        assert!(detail_highlights(3, &report).is_empty());
        assert_eq!(compute_total_pages(&report), 2);

        report.highlights.truncate(6);
        assert!(detail_highlights(2, &report).is_empty());
    }

    #[test]
    fn test_page_two_shows_extended_financials() {
        let report = report_with(3, 9);
        let ContentSlice::ExtendedFinancials(table) = slice_for_page(2, &report) else {
            panic!("expected extended financial data");
        };
        assert_eq!(table.first_row, 4);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0][0], "r4c0");
    }

    #[test]
    fn test_sections_are_sliced_two_per_page() {
        let report = report_with(5, 2);
        let ContentSlice::Sections(page2) = slice_for_page(2, &report) else {
            panic!("expected sections on page 2");
        };
        assert_eq!(
            page2.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1]
        );

        let ContentSlice::Sections(page4) = slice_for_page(4, &report) else {
            panic!("expected sections on page 4");
        };
        assert_eq!(page4.len(), 1);
        assert_eq!(page4[0].title, "Section 5");
        assert_eq!(page4[0].text, "Body of section 5");
    }

    #[test]
    fn test_sections_truncate_at_800_chars() {
        let mut report = report_with(1, 0);
        report.additional_sections[0].html_content = format!("<p>{}</p>", "y".repeat(1200));
        let ContentSlice::Sections(sections) = slice_for_page(2, &report) else {
            panic!("expected sections");
        };
        assert!(sections[0].truncated);
        assert!(sections[0].text.ends_with(crate::text::ELLIPSIS));
        assert_eq!(sections[0].text.chars().count(), 803);
    }

    #[test]
    fn test_empty_report_gets_placeholder() {
        let report = ReportData::default();
        assert_eq!(
            slice_for_page(2, &report),
            ContentSlice::Placeholder(PLACEHOLDER_TEXT.to_string())
        );
        assert_eq!(
            slice_for_page(0, &report),
            ContentSlice::Placeholder(PLACEHOLDER_TEXT.to_string())
        );
        assert_eq!(
            slice_for_page(99, &report),
            ContentSlice::Placeholder(PLACEHOLDER_TEXT.to_string())
        );
    }

    #[test]
    fn test_overflow_page_carries_remaining_rows() {
        let report = report_with(2, 14);
        assert_eq!(compute_total_pages(&report), 3);
        let slices = plan(&report, &PaginationLimits::default());
        assert_eq!(slices.len(), 3);

        let ContentSlice::ExtendedFinancials(last) = &slices[2] else {
            panic!("expected overflow rows on the last page");
        };
        assert_eq!(last.first_row, 8);
        assert_eq!(last.rows.len(), 6);
    }

    #[test]
    fn test_two_page_overflow_keeps_all_rows_on_page_two() {
        let report = report_with(0, 12);
        let ContentSlice::ExtendedFinancials(table) = slice_for_page(2, &report) else {
            panic!("expected extended financial data");
        };
        assert_eq!(table.first_row, 4);
        assert_eq!(table.rows.len(), 8);
    }

    #[test]
    fn test_custom_limits() {
        let limits = PaginationLimits {
            sections_per_page: 3,
            ..Default::default()
        };
        let report = report_with(7, 0);
        assert_eq!(compute_total_pages_with(&report, &limits), 4);
    }
}
