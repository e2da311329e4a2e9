use clap::{Arg, ArgAction, Command};
use log::{debug, error, info, warn};
use reportpdf::config::{self, ConfigSource, ReportConfig, DEFAULT_CONFIG_FILE};
use reportpdf::export::{ExportCapability, ExportPipeline};
use reportpdf::page_size::PageFormat;
use reportpdf::pagination::{plan, ContentSlice};
use reportpdf::readership::{
    EmbeddedRecords, JsonFileSource, ReadershipTable, RecordSource, TableState,
};
use reportpdf::report::{InstitutionalRecord, ReportData};
use reportpdf::ReportError;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug)]
enum AppError {
    Report(ReportError),
    UsageError(String),
    PathError(String),
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        AppError::Report(e)
    }
}

/// Verbosity level for output
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

fn verbosity(matches: &clap::ArgMatches) -> Verbosity {
    if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Configuration source: `--config` first, then `reportpdfrc.toml` in the current directory,
/// then the built-in defaults.
fn get_config_source(matches: &clap::ArgMatches) -> ConfigSource<'_> {
    if let Some(config_file) = matches.get_one::<String>("config") {
        return ConfigSource::File(config_file.as_str());
    }
    if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
        return ConfigSource::File(DEFAULT_CONFIG_FILE);
    }
    ConfigSource::Default
}

/// Loads the configuration and applies command-line overrides. A file named with
/// `--config` must exist and parse; the auto-detected one falls back to defaults.
fn get_settings(matches: &clap::ArgMatches) -> Result<ReportConfig, AppError> {
    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config_from_source(get_config_source(matches)),
    };
    if let Some(format) = matches.get_one::<String>("format") {
        settings.page.format = PageFormat::parse(format);
    }
    if let Some(zoom) = matches.get_one::<f32>("zoom") {
        if !zoom.is_finite() || *zoom <= 0.0 {
            return Err(AppError::UsageError(format!(
                "Zoom must be a positive number, got {}",
                zoom
            )));
        }
        settings.page.zoom = *zoom;
    }
    if let Some(strategy) = matches.get_one::<String>("strategy") {
        settings.export.strategy = ExportCapability::parse(strategy).ok_or_else(|| {
            AppError::UsageError(format!(
                "Unknown strategy '{}' (expected rasterize, print, headless or typeset)",
                strategy
            ))
        })?;
    }
    Ok(settings)
}

/// `-o` if given, otherwise the artifact's own file name in the current directory.
fn get_output_path(matches: &clap::ArgMatches, filename: &str) -> Result<PathBuf, AppError> {
    let current_dir = std::env::current_dir().map_err(|e| AppError::PathError(e.to_string()))?;
    Ok(matches
        .get_one::<String>("output")
        .map(|p| current_dir.join(p))
        .unwrap_or_else(|| current_dir.join(filename)))
}

fn describe_slice(slice: &ContentSlice) -> String {
    match slice {
        ContentSlice::Cover(cover) => format!(
            "cover: {} highlight(s), {} table row(s){}",
            cover.highlights.len(),
            cover.table.rows.len(),
            cover
                .lead_section
                .as_ref()
                .map(|s| format!(", lead section '{}'", s.title))
                .unwrap_or_default()
        ),
        ContentSlice::ExtendedFinancials(table) => format!(
            "financial rows {}..{}",
            table.first_row + 1,
            table.first_row + table.rows.len()
        ),
        ContentSlice::Sections(sections) => format!(
            "sections: {}",
            sections
                .iter()
                .map(|s| if s.truncated {
                    format!("'{}' (truncated)", s.title)
                } else {
                    format!("'{}'", s.title)
                })
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ContentSlice::Placeholder(text) => format!("placeholder: {}", text),
    }
}

/// Lists readership from the `--readership` file, or from the records embedded in the
/// report when the flag has no value.
fn print_readership(
    matches: &clap::ArgMatches,
    entity: &str,
    embedded: Option<&[InstitutionalRecord]>,
) -> Result<(), AppError> {
    let file_source;
    let embedded_source;
    let source: &dyn RecordSource = match (matches.get_one::<String>("readership"), embedded) {
        (Some(path), _) => {
            file_source = JsonFileSource::new(path.as_str());
            &file_source
        }
        (None, Some(records)) => {
            embedded_source = EmbeddedRecords::new(records);
            &embedded_source
        }
        (None, None) => {
            return Err(AppError::UsageError(
                "--readership without a file needs a report given with -i".to_string(),
            ))
        }
    };
    let mut table = ReadershipTable::new();
    table.load(source, entity);

    if let Some(size) = matches.get_one::<usize>("page-size") {
        table.set_page_size(*size);
    }
    if let Some(query) = matches.get_one::<String>("filter") {
        table.set_filter(query);
    }
    if let Some(page) = matches.get_one::<usize>("page") {
        table.set_page(*page);
    }

    match table.state() {
        TableState::Empty => println!("No institutional readership data for {}", entity),
        TableState::Error { message, .. } => {
            return Err(AppError::UsageError(format!("Readership unavailable: {}", message)))
        }
        _ => {
            println!(
                "Institutional readership, page {} of {} ({} record(s))",
                table.page(),
                table.page_count(),
                table.visible_records().len()
            );
            for row in table.page_rows() {
                println!(
                    "{} {:<32} {:<24} {:<24} {}",
                    row.flag, row.institution, row.location, row.report_title, row.access_date
                );
            }
        }
    }
    Ok(())
}

fn run(matches: clap::ArgMatches) -> Result<(), AppError> {
    let verbosity = verbosity(&matches);

    let Some(input) = matches.get_one::<String>("input") else {
        return print_readership(&matches, "report", None);
    };
    let report = ReportData::from_path(std::path::Path::new(input))?;
    let settings = get_settings(&matches)?;
    debug!("Effective configuration: {:?}", settings);

    let warnings = report.validate();
    if verbosity != Verbosity::Quiet {
        for warning in &warnings {
            warn!("{}", warning);
        }
    }

    if matches.get_flag("plan") {
        for (idx, slice) in plan(&report, &settings.limits).iter().enumerate() {
            println!("Page {}: {}", idx + 1, describe_slice(slice));
        }
    }

    if matches.contains_id("readership") {
        print_readership(
            &matches,
            report.display_name(),
            Some(&report.institutional_records),
        )?;
    }

    let request = settings.export_request();
    if matches.get_flag("dry-run") {
        if verbosity != Verbosity::Quiet {
            let preview = request.preview_layouts(&report);
            let (width, height) = preview
                .first()
                .map(|p| (p.pixel_width, p.pixel_height))
                .unwrap_or_default();
            println!(
                "\u{2713} Dry run: {} page(s) in {} ({:.0}x{:.0} px preview at {}% zoom), {} strategy. Nothing written.",
                preview.len(),
                request.format,
                width,
                height,
                request.zoom,
                settings.export.strategy
            );
            if !warnings.is_empty() {
                println!("\u{26A0}\u{FE0F}  {} warning(s) found.", warnings.len());
            }
        }
        return Ok(());
    }
    if matches.get_flag("plan") {
        return Ok(());
    }

    if verbosity == Verbosity::Verbose {
        info!("\u{1F4C4} Exporting with the {} strategy...", settings.export.strategy);
    }
    let artifact = ExportPipeline::new(settings.export.strategy).run(&report, &request)?;
    let output_path = get_output_path(&matches, &artifact.filename)?;
    if let Some(parent) = output_path.parent() {
        if !parent.exists() {
            return Err(AppError::PathError(format!(
                "Output directory {} does not exist",
                parent.display()
            )));
        }
    }
    fs::write(&output_path, &artifact.bytes).map_err(|e| {
        AppError::PathError(format!("Failed to write {}: {}", output_path.display(), e))
    })?;

    if verbosity != Verbosity::Quiet {
        println!(
            "\u{2705} Saved {} ({} page(s)) to {}",
            artifact.mime_type,
            artifact.page_count,
            output_path.display()
        );
        if artifact.placeholder_pages > 0 {
            println!(
                "\u{26A0}\u{FE0F}  {} page(s) could not be captured and show a placeholder",
                artifact.placeholder_pages
            );
        }
        if verbosity == Verbosity::Verbose {
            let size_kb = artifact.bytes.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.2} MB", size_kb / 1024.0);
            }
        }
    }
    Ok(())
}

fn build_command() -> Command {
    Command::new("reportpdf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Paginate research reports and export them to PDF")
        .after_help(
            "EXAMPLES:\n  \
            reportpdf -i report.json\n  \
            reportpdf -i report.json --format a4 --strategy typeset -o report.pdf\n  \
            reportpdf -i report.json --plan --dry-run\n  \
            reportpdf --readership readers.json --page 2 --page-size 20 --filter germany\n  \
            reportpdf -i report.json --readership --plan\n",
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("REPORT_JSON")
                .help("Path to the report JSON file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_PATH")
                .help("Output file (defaults to {Name}_{Report|Investment}_{date}.pdf)"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Page format: letter, a4 or legal"),
        )
        .arg(
            Arg::new("zoom")
                .short('z')
                .long("zoom")
                .value_name("PERCENT")
                .value_parser(clap::value_parser!(f32))
                .help("Zoom percentage applied to the rendered pages"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .value_name("STRATEGY")
                .help("Export strategy: rasterize, print, headless or typeset"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG_FILE")
                .help("Path to configuration file (TOML format). Auto-detects reportpdfrc.toml if not specified"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show detailed output")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Validate and paginate without writing a file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("plan")
                .long("plan")
                .help("Print the content assigned to each page")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print a default reportpdfrc.toml to stdout and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("readership")
                .long("readership")
                .value_name("RECORDS_JSON")
                .num_args(0..=1)
                .help("Institutional readership records to list; without a file, the report's own records"),
        )
        .arg(
            Arg::new("page")
                .long("page")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .requires("readership")
                .help("Readership page to show"),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .requires("readership")
                .help("Readership rows per page"),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .value_name("QUERY")
                .requires("readership")
                .help("Only list institutions matching the query"),
        )
}

fn main() {
    let mut cmd = build_command();
    let matches = cmd.clone().get_matches();

    let level = match verbosity(&matches) {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    if matches.get_flag("print-config") {
        println!("{}", config::default_config_toml());
        process::exit(0);
    }

    if !matches.contains_id("input") && !matches.contains_id("readership") {
        let _ = cmd.print_help();
        println!();
        process::exit(1);
    }

    if let Err(e) = run(matches) {
        match e {
            AppError::Report(e) => error!("{}", e),
            AppError::UsageError(e) => error!("[X] {}", e),
            AppError::PathError(e) => error!("[X] Path error: {}", e),
        }
        process::exit(1);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_get_output_path_default_and_custom() {
        let cmd = build_command();
        let matches = cmd.clone().get_matches_from(vec!["reportpdf"]);
        let default_path = get_output_path(&matches, "Acme_Report_2024-01-01.pdf").unwrap();
        assert!(default_path.ends_with("Acme_Report_2024-01-01.pdf"));

        let matches = cmd.get_matches_from(vec!["reportpdf", "-o", "my.pdf"]);
        let custom_path = get_output_path(&matches, "ignored.pdf").unwrap();
        assert!(custom_path.ends_with("my.pdf"));
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        fs::write(&config_path, "[page]\nformat = \"a4\"\nzoom = 90\n").unwrap();
        let matches = build_command().get_matches_from(vec![
            "reportpdf",
            "--config",
            config_path.to_str().unwrap(),
            "--format",
            "legal",
            "--zoom",
            "75",
            "--strategy",
            "typeset",
        ]);
        let settings = get_settings(&matches).unwrap();
        assert_eq!(settings.page.format, PageFormat::Legal);
        assert_eq!(settings.page.zoom, 75.0);
        assert_eq!(settings.export.strategy, ExportCapability::Typeset);
    }

    #[test]
    fn test_explicit_config_must_load() {
        let matches = build_command().get_matches_from(vec![
            "reportpdf",
            "--config",
            "/nonexistent/reportpdfrc.toml",
        ]);
        assert!(matches!(
            get_settings(&matches),
            Err(AppError::Report(ReportError::ConfigError { .. }))
        ));
    }

    #[test]
    fn test_non_finite_zoom_is_rejected() {
        for zoom in ["NaN", "inf", "0"] {
            let matches = build_command().get_matches_from(vec!["reportpdf", "--zoom", zoom]);
            assert!(matches!(get_settings(&matches), Err(AppError::UsageError(_))));
        }
    }

    #[test]
    fn test_readership_without_file_needs_a_report() {
        let matches = build_command().get_matches_from(vec!["reportpdf", "--readership"]);
        assert!(matches.contains_id("readership"));
        assert!(matches!(
            print_readership(&matches, "report", None),
            Err(AppError::UsageError(_))
        ));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let matches =
            build_command().get_matches_from(vec!["reportpdf", "--strategy", "carrier-pigeon"]);
        assert!(matches!(get_settings(&matches), Err(AppError::UsageError(_))));
    }

    #[test]
    fn test_page_flags_require_readership() {
        let result = build_command().try_get_matches_from(vec!["reportpdf", "--page", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_config_source_explicit_config() {
        let matches = build_command().get_matches_from(vec!["reportpdf", "--config", "custom.toml"]);
        match get_config_source(&matches) {
            ConfigSource::File(path) => assert_eq!(path, "custom.toml"),
            _ => panic!("Expected File config source"),
        }
    }

    #[test]
    fn test_default_config_round_trips() {
        let parsed = config::parse_config_string(&config::default_config_toml());
        assert_eq!(parsed, ReportConfig::default());
    }

    #[test]
    fn test_describe_slices() {
        let mut report = ReportData::default();
        report.metadata.company_name = "Acme".to_string();
        let settings = ReportConfig::default();
        let slices = plan(&report, &settings.limits);
        assert!(describe_slice(&slices[0]).starts_with("cover:"));
        assert!(describe_slice(&slices[1]).starts_with("placeholder:"));
    }
}
