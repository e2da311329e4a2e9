//! Institutional readership table.
//!
//! A client-side paginated view over the institutions that accessed a report. Records are
//! fetched once through a [`RecordSource`], sorted with embargoed institutions last and the
//! most recent access first, then filtered and paged locally.
//!
//! A source that reports [`SourceError::NotFound`] means the entity has no readership data:
//! the table goes to [`TableState::Empty`] and shows no error banner. Any other failure puts
//! the table in a retryable [`TableState::Error`].
//!
//! ```rust
//! use reportpdf::readership::{ReadershipTable, RecordSource, SourceError, TableState};
//! use reportpdf::report::InstitutionalRecord;
//!
//! struct Unavailable;
//!
//! impl RecordSource for Unavailable {
//!     fn name(&self) -> String {
//!         "unavailable".to_string()
//!     }
//!     fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
//!         Err(SourceError::NotFound(entity.to_string()))
//!     }
//! }
//!
//! let mut table = ReadershipTable::new();
//! table.load(&Unavailable, "ACME");
//! assert_eq!(table.state(), &TableState::Empty);
//! assert!(table.banner().is_none());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
#[cfg(feature = "fetch")]
use std::time::Duration;

use log::{debug, info, warn};

use crate::report::InstitutionalRecord;
use crate::vocabulary::country_flag;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[cfg(feature = "fetch")]
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Why a source could not provide records.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The entity has no readership data.
    NotFound(String),
    Network(String),
    Parse(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound(what) => write!(f, "No readership data for {}", what),
            SourceError::Network(msg) => write!(f, "Network error: {}", msg),
            SourceError::Parse(msg) => write!(f, "Invalid readership data: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Anything that can list the institutional readers of an entity (company or ticker).
pub trait RecordSource: Sync {
    fn name(&self) -> String;

    fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError>;
}

/// Parses a JSON array of records, or an object with a `records` array.
pub fn parse_records(json: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| SourceError::Parse(e.to_string()))?;
    let records = match value {
        serde_json::Value::Object(mut map) => map
            .remove("records")
            .ok_or_else(|| SourceError::Parse("missing 'records' array".to_string()))?,
        other => other,
    };
    serde_json::from_value(records).map_err(|e| SourceError::Parse(e.to_string()))
}

/// Reads records from a JSON file. `{entity}` in the path is replaced by the requested entity.
pub struct JsonFileSource {
    path: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn path_for(&self, entity: &str) -> PathBuf {
        PathBuf::from(self.path.replace("{entity}", entity))
    }
}

impl RecordSource for JsonFileSource {
    fn name(&self) -> String {
        self.path.clone()
    }

    fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
        let path = self.path_for(entity);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(path.display().to_string()))
            }
            Err(e) => {
                return Err(SourceError::Network(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        parse_records(&content)
    }
}

/// Records shipped inside the report payload (`institutionalRecords`).
pub struct EmbeddedRecords<'a> {
    records: &'a [InstitutionalRecord],
}

impl<'a> EmbeddedRecords<'a> {
    pub fn new(records: &'a [InstitutionalRecord]) -> Self {
        Self { records }
    }
}

impl RecordSource for EmbeddedRecords<'_> {
    fn name(&self) -> String {
        "embedded records".to_string()
    }

    fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
        if self.records.is_empty() {
            return Err(SourceError::NotFound(entity.to_string()));
        }
        Ok(self.records.to_vec())
    }
}

/// Fetches records with `GET {base_url}/{entity}`.
pub struct HttpSource {
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn url_for(&self, entity: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), entity)
    }
}

impl RecordSource for HttpSource {
    fn name(&self) -> String {
        self.base_url.clone()
    }

    #[cfg(feature = "fetch")]
    fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
        let url = self.url_for(entity);
        debug!("GET {}", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to build client: {}", e)))?;
        let response = client
            .get(&url)
            .send()
            .map_err(|e| SourceError::Network(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(entity.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Network(format!("{} returned HTTP {}", url, status)));
        }
        let body = response
            .text()
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;
        parse_records(&body)
    }

    #[cfg(not(feature = "fetch"))]
    fn fetch(&self, _entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
        Err(SourceError::Network(
            "HTTP sources require the 'fetch' feature".to_string(),
        ))
    }
}

/// Queries several sources in parallel. A failing source yields `None` without affecting
/// the others; results keep the order of `sources`.
pub fn fetch_all(
    sources: &[&dyn RecordSource],
    entity: &str,
) -> Vec<Option<Vec<InstitutionalRecord>>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| scope.spawn(move || source.fetch(entity)))
            .collect();

        handles
            .into_iter()
            .zip(sources)
            .map(|(handle, source)| match handle.join() {
                Ok(Ok(records)) => Some(records),
                Ok(Err(e)) => {
                    warn!("{} failed: {}", source.name(), e);
                    None
                }
                Err(_) => {
                    warn!("{} panicked while fetching", source.name());
                    None
                }
            })
            .collect()
    })
}

/// Embargoed records last, then most recent access first. Stable.
pub fn sort_records(records: &mut [InstitutionalRecord]) {
    records.sort_by(|a, b| {
        a.is_embargoed
            .cmp(&b.is_embargoed)
            .then_with(|| b.access_date.cmp(&a.access_date))
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableState {
    Idle,
    Loading,
    Success(Vec<InstitutionalRecord>),
    /// No data for this entity; not an error.
    Empty,
    Error { message: String, retryable: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    /// Embargo-aware default ordering.
    Default,
    Institution,
    Country,
    ReportTitle,
    AccessDate,
}

impl SortColumn {
    pub fn parse(name: &str) -> Option<SortColumn> {
        match name.trim().to_lowercase().as_str() {
            "default" | "" => Some(SortColumn::Default),
            "institution" | "name" => Some(SortColumn::Institution),
            "country" => Some(SortColumn::Country),
            "report" | "title" => Some(SortColumn::ReportTitle),
            "date" | "access" | "accessdate" => Some(SortColumn::AccessDate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One table row ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadershipRow {
    pub flag: &'static str,
    pub institution: String,
    pub location: String,
    pub report_title: String,
    pub access_date: String,
}

pub fn display_row(record: &InstitutionalRecord) -> ReadershipRow {
    let institution = if record.is_embargoed {
        match record.embargo_lift_date {
            Some(date) => format!("Embargoed until {}", date.format("%Y-%m-%d")),
            None => "Embargoed".to_string(),
        }
    } else {
        record.institution_name.clone()
    };
    let location = [record.city.as_str(), record.country.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    ReadershipRow {
        flag: country_flag(&record.country),
        institution,
        location,
        report_title: record.report_title.clone(),
        access_date: record.access_date.format("%Y-%m-%d %H:%M").to_string(),
    }
}

/// Readership table with load state, filter, sort and client-side pagination.
#[derive(Debug, Clone)]
pub struct ReadershipTable {
    state: TableState,
    entity: Option<String>,
    page: usize,
    page_size: usize,
    filter: String,
    sort: (SortColumn, SortDirection),
}

impl Default for ReadershipTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadershipTable {
    pub fn new() -> Self {
        Self {
            state: TableState::Idle,
            entity: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter: String::new(),
            sort: (SortColumn::Default, SortDirection::Ascending),
        }
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// Error message to show above the table, if any. `Empty` never shows one.
    pub fn banner(&self) -> Option<&str> {
        match &self.state {
            TableState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches every record for `entity` and replaces the table contents.
    pub fn load(&mut self, source: &dyn RecordSource, entity: &str) -> &TableState {
        self.entity = Some(entity.to_string());
        self.state = TableState::Loading;
        self.page = 1;
        debug!("Loading readership for {} from {}", entity, source.name());

        self.state = match source.fetch(entity) {
            Ok(records) if records.is_empty() => TableState::Empty,
            Ok(mut records) => {
                apply_sort(&mut records, self.sort.0, self.sort.1);
                info!("Loaded {} readership records for {}", records.len(), entity);
                TableState::Success(records)
            }
            Err(SourceError::NotFound(what)) => {
                debug!("No readership data: {}", what);
                TableState::Empty
            }
            Err(e) => {
                warn!("Readership load failed: {}", e);
                TableState::Error {
                    message: e.to_string(),
                    retryable: true,
                }
            }
        };
        &self.state
    }

    /// Re-runs the last load. Does nothing before the first load.
    pub fn retry(&mut self, source: &dyn RecordSource) -> &TableState {
        if let Some(entity) = self.entity.clone() {
            self.load(source, &entity);
        }
        &self.state
    }

    fn all_records(&self) -> &[InstitutionalRecord] {
        match &self.state {
            TableState::Success(records) => records,
            _ => &[],
        }
    }

    /// Records passing the current filter, in table order.
    pub fn visible_records(&self) -> Vec<&InstitutionalRecord> {
        let query = self.filter.to_lowercase();
        self.all_records()
            .iter()
            .filter(|record| query.is_empty() || matches_query(record, &query))
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.visible_records().len().div_ceil(self.page_size).max(1)
    }

    /// Records on the current page.
    pub fn page_slice(&self) -> Vec<&InstitutionalRecord> {
        let visible = self.visible_records();
        let start = ((self.page - 1) * self.page_size).min(visible.len());
        let end = (self.page * self.page_size).min(visible.len());
        visible[start..end].to_vec()
    }

    pub fn page_rows(&self) -> Vec<ReadershipRow> {
        self.page_slice().into_iter().map(display_row).collect()
    }

    /// Moves to `page`, clamped to `1..=page_count`.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    /// Changes the page size and returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Case-insensitive filter on institution, country, city and report title. Resets the page.
    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.trim().to_string();
        self.page = 1;
    }

    pub fn set_sort(&mut self, column: SortColumn, direction: SortDirection) {
        self.sort = (column, direction);
        if let TableState::Success(records) = &mut self.state {
            apply_sort(records, column, direction);
        }
    }
}

fn apply_sort(records: &mut [InstitutionalRecord], column: SortColumn, direction: SortDirection) {
    if column == SortColumn::Default {
        sort_records(records);
        return;
    }
    records.sort_by(|a, b| {
        let ord = compare_by(column, a, b);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

fn compare_by(column: SortColumn, a: &InstitutionalRecord, b: &InstitutionalRecord) -> Ordering {
    match column {
        SortColumn::Default => Ordering::Equal,
        SortColumn::Institution => a
            .institution_name
            .to_lowercase()
            .cmp(&b.institution_name.to_lowercase()),
        SortColumn::Country => a.country.to_lowercase().cmp(&b.country.to_lowercase()),
        SortColumn::ReportTitle => a.report_title.to_lowercase().cmp(&b.report_title.to_lowercase()),
        SortColumn::AccessDate => a.access_date.cmp(&b.access_date),
    }
}

// Embargoed identities are withheld, so their names are not searchable.
fn matches_query(record: &InstitutionalRecord, query: &str) -> bool {
    let name_match = !record.is_embargoed && record.institution_name.to_lowercase().contains(query);
    name_match
        || record.country.to_lowercase().contains(query)
        || record.city.to_lowercase().contains(query)
        || record.report_title.to_lowercase().contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, day: u32, embargoed: bool) -> InstitutionalRecord {
        InstitutionalRecord {
            institution_name: name.to_string(),
            country: "Germany".to_string(),
            city: "Frankfurt".to_string(),
            firm_number: String::new(),
            report_title: "Q3 Review".to_string(),
            access_date: Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap(),
            published_date: None,
            is_embargoed: embargoed,
            embargo_lift_date: embargoed
                .then(|| Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        }
    }

    struct Fixed(Result<Vec<InstitutionalRecord>, SourceError>);

    impl RecordSource for Fixed {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn fetch(&self, _entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_embedded_records_source() {
        let records = vec![record("Fund A", 2, false), record("Fund B", 5, false)];
        let mut table = ReadershipTable::new();
        table.load(&EmbeddedRecords::new(&records), "ACME");
        assert_eq!(table.visible_records()[0].institution_name, "Fund B");

        table.load(&EmbeddedRecords::new(&[]), "ACME");
        assert_eq!(table.state(), &TableState::Empty);
    }

    fn loaded(count: u32) -> ReadershipTable {
        let records = (1..=count).map(|d| record(&format!("Fund {}", d), d, false)).collect();
        let mut table = ReadershipTable::new();
        table.load(&Fixed(Ok(records)), "ACME");
        table
    }

    #[test]
    fn test_sort_puts_embargoed_last_newest_first() {
        let mut records = vec![
            record("A", 3, true),
            record("B", 1, false),
            record("C", 9, true),
            record("D", 5, false),
        ];
        sort_records(&mut records);
        let names: Vec<_> = records.iter().map(|r| r.institution_name.as_str()).collect();
        assert_eq!(names, vec!["D", "B", "C", "A"]);
    }

    #[test]
    fn test_not_found_is_empty_without_banner() {
        let mut table = ReadershipTable::new();
        table.load(&Fixed(Err(SourceError::NotFound("ACME".to_string()))), "ACME");
        assert_eq!(table.state(), &TableState::Empty);
        assert!(table.banner().is_none());
    }

    #[test]
    fn test_other_errors_are_retryable() {
        let mut table = ReadershipTable::new();
        table.load(&Fixed(Err(SourceError::Network("timeout".to_string()))), "ACME");
        assert!(matches!(
            table.state(),
            TableState::Error { retryable: true, .. }
        ));
        assert!(table.banner().unwrap().contains("timeout"));

        table.retry(&Fixed(Ok(vec![record("Fund", 2, false)])));
        assert!(matches!(table.state(), TableState::Success(r) if r.len() == 1));
        assert!(table.banner().is_none());
    }

    #[test]
    fn test_retry_before_load_is_noop() {
        let mut table = ReadershipTable::new();
        table.retry(&Fixed(Ok(vec![record("Fund", 2, false)])));
        assert_eq!(table.state(), &TableState::Idle);
    }

    #[test]
    fn test_pagination() {
        let mut table = loaded(23);
        assert_eq!(table.page_count(), 3);
        assert_eq!(table.page_slice().len(), 10);

        table.set_page(3);
        assert_eq!(table.page_slice().len(), 3);
        table.set_page(99);
        assert_eq!(table.page(), 3);
        table.set_page(0);
        assert_eq!(table.page(), 1);

        table.set_page(2);
        table.set_page_size(5);
        assert_eq!(table.page(), 1);
        assert_eq!(table.page_count(), 5);
    }

    #[test]
    fn test_filter_resets_page_and_hides_embargoed_names() {
        let mut table = ReadershipTable::new();
        let mut records: Vec<_> = (1..=15).map(|d| record(&format!("Fund {}", d), d, false)).collect();
        records.push(record("Secret Capital", 20, true));
        table.load(&Fixed(Ok(records)), "ACME");
        table.set_page(2);

        table.set_filter("FUND 1");
        assert_eq!(table.page(), 1);
        // Fund 1 and Fund 10..=15
        assert_eq!(table.visible_records().len(), 7);

        table.set_filter("secret");
        assert!(table.visible_records().is_empty());
        assert_eq!(table.page_count(), 1);
    }

    #[test]
    fn test_user_sort() {
        let mut table = loaded(3);
        table.set_sort(SortColumn::AccessDate, SortDirection::Ascending);
        let first = table.page_slice()[0].institution_name.clone();
        assert_eq!(first, "Fund 1");
        table.set_sort(SortColumn::Default, SortDirection::Ascending);
        assert_eq!(table.page_slice()[0].institution_name, "Fund 3");
    }

    #[test]
    fn test_display_row() {
        let row = display_row(&record("Hidden", 4, true));
        assert_eq!(row.institution, "Embargoed until 2024-06-01");
        assert_eq!(row.flag, "\u{1F1E9}\u{1F1EA}");
        assert_eq!(row.location, "Frankfurt, Germany");

        let open = display_row(&record("Open Fund", 4, false));
        assert_eq!(open.institution, "Open Fund");
        assert_eq!(open.access_date, "2024-03-04 09:30");
    }

    #[test]
    fn test_fetch_all_isolates_failures() {
        let ok = Fixed(Ok(vec![record("Fund", 1, false)]));
        let failing = Fixed(Err(SourceError::Network("down".to_string())));
        let results = fetch_all(&[&ok, &failing, &ok], "ACME");
        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_records_shapes() {
        let json = r#"[{"institutionName":"Fund","accessDate":"2024-03-01T10:00:00Z"}]"#;
        assert_eq!(parse_records(json).unwrap().len(), 1);
        let wrapped = format!(r#"{{"records":{}}}"#, json);
        assert_eq!(parse_records(&wrapped).unwrap().len(), 1);
        assert!(matches!(parse_records("{}"), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_file_source_missing_is_not_found() {
        let source = JsonFileSource::new("/nonexistent/{entity}.json");
        assert!(matches!(source.fetch("ACME"), Err(SourceError::NotFound(_))));
        assert_eq!(HttpSource::new("http://host/api/").url_for("ACME"), "http://host/api/ACME");
    }
}
