use reportpdf::readership::{
    fetch_all, sort_records, JsonFileSource, ReadershipTable, RecordSource, SourceError,
    TableState,
};
use reportpdf::report::InstitutionalRecord;

const READERSHIP: &str = "tests/fixtures/readership.json";

struct NotFound;

impl RecordSource for NotFound {
    fn name(&self) -> String {
        "not-found".to_string()
    }

    fn fetch(&self, entity: &str) -> Result<Vec<InstitutionalRecord>, SourceError> {
        Err(SourceError::NotFound(entity.to_string()))
    }
}

#[test]
fn sorted_records_put_revealed_first_newest_first() {
    let mut records = JsonFileSource::new(READERSHIP).fetch("NWT").unwrap();
    records.reverse();
    sort_records(&mut records);

    let first_embargoed = records.iter().position(|r| r.is_embargoed).unwrap();
    assert!(records[first_embargoed..].iter().all(|r| r.is_embargoed));
    for partition in [&records[..first_embargoed], &records[first_embargoed..]] {
        assert!(partition
            .windows(2)
            .all(|w| w[0].access_date >= w[1].access_date));
    }
}

#[test]
fn not_found_source_leaves_an_empty_table() {
    let mut table = ReadershipTable::new();
    table.load(&NotFound, "NWT");
    assert_eq!(table.state(), &TableState::Empty);
    assert!(table.banner().is_none());
    assert!(table.page_slice().is_empty());
    assert_eq!(table.page_count(), 1);
}

#[test]
fn filter_and_page_size_reset_to_first_page() {
    let mut table = ReadershipTable::new();
    table.load(&JsonFileSource::new(READERSHIP), "NWT");
    table.set_page_size(2);
    table.set_page(3);
    assert_eq!(table.page(), 3);

    table.set_filter("initiating");
    assert_eq!(table.page(), 1);
    assert_eq!(table.visible_records().len(), 3);

    table.set_page(2);
    table.set_page_size(10);
    assert_eq!(table.page(), 1);
}

#[test]
fn fan_out_isolates_failing_sources() {
    let file = JsonFileSource::new(READERSHIP);
    let results = fetch_all(&[&NotFound, &file], "NWT");
    assert!(results[0].is_none());
    assert_eq!(results[1].as_ref().map(Vec::len), Some(5));
}
