//! In-memory representation of one research report.
//!
//! A [`ReportData`] is deserialized from the JSON records served by the content API
//! (camelCase keys) and is treated as an immutable snapshot by every later stage:
//! pagination, layout and the export strategies all borrow it, and the export
//! pipeline hands each strategy its own clone.
//!
//! ```rust
//! use reportpdf::report::ReportData;
//!
//! let json = r#"{
//!     "metadata": { "date": "2024-03-01", "companyName": "Acme Corp",
//!                   "tickers": [{ "symbol": "ACME", "exchange": "NYSE" }],
//!                   "rating": "BUY" },
//!     "financialTable": [{ "Year": "2023", "Revenue": "1.2B" }]
//! }"#;
//! let report = ReportData::from_json(json).unwrap();
//! assert_eq!(report.metadata.company_name, "Acme Corp");
//! assert_eq!(report.financial_table[0].columns(), vec!["Year", "Revenue"]);
//! ```

use crate::ReportError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Placeholder shown for any missing metric or table cell.
pub const NOT_AVAILABLE: &str = "N/A";

/// Analyst recommendation attached to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    #[default]
    #[serde(other)]
    Unrated,
}

impl Rating {
    /// Label printed inside the rating badge.
    pub fn label(&self) -> &'static str {
        match self {
            Rating::StrongBuy => "STRONG BUY",
            Rating::Buy => "BUY",
            Rating::Hold => "HOLD",
            Rating::Sell => "SELL",
            Rating::StrongSell => "STRONG SELL",
            Rating::Unrated => "NOT RATED",
        }
    }
}

/// A listed symbol together with the exchange it trades on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    #[serde(default)]
    pub exchange: String,
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exchange.is_empty() {
            write!(f, "{}", self.symbol)
        } else {
            write!(f, "{} ({})", self.symbol, self.exchange)
        }
    }
}

/// Formats a ticker list as `"SYM (EXCH), SYM2 (EXCH2)"`.
pub fn format_tickers(tickers: &[Ticker]) -> String {
    tickers
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Text shown for a JSON scalar. Numbers keep their JSON spelling.
fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(Value::deserialize(deserializer)?))
}

/// Accepts `3`, `3.5` or `"3.5"`; anything else reads as no score.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub tickers: Vec<Ticker>,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default, deserialize_with = "lenient_text")]
    pub current_price: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fair_value: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub risk_score: Option<f32>,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            date: today(),
            company_name: String::new(),
            tickers: Vec::new(),
            sector: String::new(),
            rating: Rating::default(),
            current_price: String::new(),
            fair_value: String::new(),
            risk_score: None,
        }
    }
}

/// One row of the financial table.
///
/// Cells keep the column order of the source JSON object; the table header is
/// always derived from the first row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FinancialRow {
    cells: Vec<(String, String)>,
}

impl FinancialRow {
    pub fn new<K: Into<String>, V: Into<String>>(cells: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            cells: cells
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.cells.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Map<String, Value>> for FinancialRow {
    fn from(map: Map<String, Value>) -> Self {
        let cells = map
            .into_iter()
            .map(|(k, v)| (k, value_text(v).unwrap_or_else(|| NOT_AVAILABLE.to_string())))
            .collect();
        Self { cells }
    }
}

impl From<FinancialRow> for Map<String, Value> {
    fn from(row: FinancialRow) -> Self {
        row.cells
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRow {
    pub security: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ytd_return: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub one_month_return: String,
}

/// Fixed set of company metrics shown in the company-data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyMetric {
    FiftyTwoWeekRange,
    SharesOutstanding,
    MarketCap,
    DividendYield,
    PeRatio,
    PbRatio,
    EvEbitda,
    Beta,
    AverageVolume,
    FloatShares,
}

impl CompanyMetric {
    pub const ALL: [CompanyMetric; 10] = [
        CompanyMetric::FiftyTwoWeekRange,
        CompanyMetric::SharesOutstanding,
        CompanyMetric::MarketCap,
        CompanyMetric::DividendYield,
        CompanyMetric::PeRatio,
        CompanyMetric::PbRatio,
        CompanyMetric::EvEbitda,
        CompanyMetric::Beta,
        CompanyMetric::AverageVolume,
        CompanyMetric::FloatShares,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CompanyMetric::FiftyTwoWeekRange => "52-Week Range",
            CompanyMetric::SharesOutstanding => "Shares Outstanding",
            CompanyMetric::MarketCap => "Market Cap",
            CompanyMetric::DividendYield => "Dividend Yield",
            CompanyMetric::PeRatio => "P/E Ratio",
            CompanyMetric::PbRatio => "P/B Ratio",
            CompanyMetric::EvEbitda => "EV/EBITDA",
            CompanyMetric::Beta => "Beta",
            CompanyMetric::AverageVolume => "Avg. Volume",
            CompanyMetric::FloatShares => "Float",
        }
    }
}

/// Company metrics keyed by the closed [`CompanyMetric`] set. Missing values read as "N/A".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyData {
    #[serde(alias = "52WeekRange", deserialize_with = "lenient_optional_text")]
    pub fifty_two_week_range: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub shares_outstanding: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub market_cap: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub dividend_yield: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub pe_ratio: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub pb_ratio: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub ev_ebitda: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub beta: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub average_volume: Option<String>,
    #[serde(deserialize_with = "lenient_optional_text")]
    pub float_shares: Option<String>,
}

impl CompanyData {
    pub fn get(&self, metric: CompanyMetric) -> &str {
        let value = match metric {
            CompanyMetric::FiftyTwoWeekRange => &self.fifty_two_week_range,
            CompanyMetric::SharesOutstanding => &self.shares_outstanding,
            CompanyMetric::MarketCap => &self.market_cap,
            CompanyMetric::DividendYield => &self.dividend_yield,
            CompanyMetric::PeRatio => &self.pe_ratio,
            CompanyMetric::PbRatio => &self.pb_ratio,
            CompanyMetric::EvEbitda => &self.ev_ebitda,
            CompanyMetric::Beta => &self.beta,
            CompanyMetric::AverageVolume => &self.average_volume,
            CompanyMetric::FloatShares => &self.float_shares,
        };
        match value.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => NOT_AVAILABLE,
        }
    }

    /// All metrics in display order, with defaults applied.
    pub fn entries(&self) -> Vec<(CompanyMetric, String)> {
        CompanyMetric::ALL
            .iter()
            .map(|m| (*m, self.get(*m).to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalystInfo {
    pub name: String,
    pub title: String,
    pub credentials: String,
}

/// One institution that accessed a published report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionalRecord {
    pub institution_name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub firm_number: String,
    #[serde(default)]
    pub report_title: String,
    pub access_date: DateTime<Utc>,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_embargoed: bool,
    #[serde(default)]
    pub embargo_lift_date: Option<DateTime<Utc>>,
}

/// The complete, normalized report snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportData {
    pub metadata: ReportMetadata,
    pub title: String,
    pub executive_summary: String,
    pub highlights: Vec<String>,
    pub financial_table: Vec<FinancialRow>,
    pub performance_data: Vec<PerformanceRow>,
    pub company_data: CompanyData,
    pub additional_sections: Vec<AnalysisSection>,
    pub analyst_info: AnalystInfo,
    pub disclaimer: String,
    pub institutional_records: Vec<InstitutionalRecord>,
}

impl ReportData {
    /// Parses a report from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        serde_json::from_str(json).map_err(|e| ReportError::DataError {
            message: format!("Invalid report JSON: {}", e),
            suggestion: Some(format!(
                "Check the report payload near line {}, column {}",
                e.line(),
                e.column()
            )),
        })
    }

    /// Reads and parses a report JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::IoError {
            message: format!("Could not read report: {}", e),
            path: path.display().to_string(),
            suggestion: "Make sure the report file exists and is readable".to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Column names of the financial table, taken from the first row.
    pub fn table_header(&self) -> Vec<String> {
        self.financial_table
            .first()
            .map(|row| row.columns().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Display name used for headers and file names: the company name, else the first ticker.
    pub fn display_name(&self) -> &str {
        let name = self.metadata.company_name.trim();
        if !name.is_empty() {
            return name;
        }
        self.metadata
            .tickers
            .first()
            .map(|t| t.symbol.as_str())
            .unwrap_or("")
    }

    /// Pre-flight checks. Problems are reported as warnings; none of them prevents rendering.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.display_name().is_empty() {
            warnings.push("Report has neither a company name nor a ticker".to_string());
        }

        let header = self.table_header();
        for (idx, row) in self.financial_table.iter().enumerate().skip(1) {
            let columns = row.columns();
            if columns.len() != header.len() || columns.iter().zip(&header).any(|(a, b)| a != b) {
                warnings.push(format!(
                    "Financial table row {} does not match the header columns ({})",
                    idx + 1,
                    header.join(", ")
                ));
            }
        }

        if self.disclaimer.trim().is_empty() {
            warnings.push("Report has no disclaimer text for the first page footer".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "metadata": {
            "date": "2024-05-17",
            "companyName": "Northwind Traders",
            "tickers": [
                { "symbol": "NWT", "exchange": "NASDAQ" },
                { "symbol": "NWT.L", "exchange": "LSE" }
            ],
            "sector": "Consumer Staples",
            "rating": "STRONG_BUY",
            "currentPrice": "$42.10",
            "fairValue": "$55.00",
            "riskScore": 3
        },
        "title": "Initiating coverage",
        "highlights": ["<p>Margin expansion</p>"],
        "financialTable": [
            { "Year": "2022", "Revenue": "1.0B", "EPS": 1.25 },
            { "Year": "2023", "Revenue": "1.2B", "EPS": null }
        ],
        "companyData": { "marketCap": "4.2B", "beta": "" },
        "disclaimer": "For professional investors only."
    }"#;

    #[test]
    fn test_parse_sample_report() {
        let report = ReportData::from_json(SAMPLE).unwrap();
        assert_eq!(report.metadata.rating, Rating::StrongBuy);
        assert_eq!(report.metadata.risk_score, Some(3.0));
        assert_eq!(
            report.metadata.date,
            NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
        );
        assert_eq!(report.table_header(), vec!["Year", "Revenue", "EPS"]);
        assert_eq!(report.financial_table[0].get("EPS"), Some("1.25"));
        assert_eq!(report.financial_table[1].get("EPS"), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_numeric_api_values_are_accepted() {
        let report = ReportData::from_json(
            r#"{
                "metadata": { "currentPrice": 123.45, "fairValue": null, "riskScore": 3.5 },
                "performanceData": [{ "security": "NWT", "ytdReturn": -4.2, "oneMonthReturn": "1.1%" }],
                "companyData": { "beta": 1.2, "marketCap": 4200000000, "peRatio": null }
            }"#,
        )
        .unwrap();
        assert_eq!(report.metadata.current_price, "123.45");
        assert_eq!(report.metadata.fair_value, "");
        assert_eq!(report.metadata.risk_score, Some(3.5));
        assert_eq!(report.performance_data[0].ytd_return, "-4.2");
        assert_eq!(report.performance_data[0].one_month_return, "1.1%");
        assert_eq!(report.company_data.get(CompanyMetric::Beta), "1.2");
        assert_eq!(report.company_data.get(CompanyMetric::MarketCap), "4200000000");
        assert_eq!(report.company_data.get(CompanyMetric::PeRatio), NOT_AVAILABLE);

        let report =
            ReportData::from_json(r#"{ "metadata": { "riskScore": "7" } }"#).unwrap();
        assert_eq!(report.metadata.risk_score, Some(7.0));
    }

    #[test]
    fn test_unknown_rating_is_unrated() {
        let report =
            ReportData::from_json(r#"{ "metadata": { "rating": "ACCUMULATE" } }"#).unwrap();
        assert_eq!(report.metadata.rating, Rating::Unrated);
        assert_eq!(report.metadata.rating.label(), "NOT RATED");
    }

    #[test]
    fn test_company_data_defaults_to_not_available() {
        let report = ReportData::from_json(SAMPLE).unwrap();
        assert_eq!(report.company_data.get(CompanyMetric::MarketCap), "4.2B");
        assert_eq!(report.company_data.get(CompanyMetric::Beta), NOT_AVAILABLE);
        assert_eq!(report.company_data.get(CompanyMetric::PeRatio), NOT_AVAILABLE);
        assert_eq!(report.company_data.entries().len(), CompanyMetric::ALL.len());
    }

    #[test]
    fn test_ticker_formatting() {
        let report = ReportData::from_json(SAMPLE).unwrap();
        assert_eq!(
            format_tickers(&report.metadata.tickers),
            "NWT (NASDAQ), NWT.L (LSE)"
        );
        assert_eq!(format_tickers(&[]), "");
    }

    #[test]
    fn test_display_name_falls_back_to_ticker() {
        let mut report = ReportData::from_json(SAMPLE).unwrap();
        report.metadata.company_name = "  ".to_string();
        assert_eq!(report.display_name(), "NWT");
        report.metadata.tickers.clear();
        assert_eq!(report.display_name(), "");
    }

    #[test]
    fn test_validate_reports_inconsistent_rows() {
        let mut report = ReportData::from_json(SAMPLE).unwrap();
        assert!(report.validate().is_empty());

        report
            .financial_table
            .push(FinancialRow::new([("Year", "2024"), ("Sales", "1.4B")]));
        let warnings = report.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("row 3"));
    }

    #[test]
    fn test_invalid_json_is_data_error() {
        let err = ReportData::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ReportError::DataError { .. }));
    }

    #[test]
    fn test_empty_object_parses_with_defaults() {
        let report = ReportData::from_json("{}").unwrap();
        assert!(report.financial_table.is_empty());
        assert!(report.additional_sections.is_empty());
        assert_eq!(report.metadata.rating, Rating::Unrated);
    }
}
