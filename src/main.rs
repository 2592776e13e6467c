// Entry point and interactive console flow.
//
// - Option [1] reads and normalizes the CSV export, printing diagnostics.
// - Option [2] writes the report files and prints Markdown previews.
// - Option [3] lists the threshold alerts.
// - Option [4] changes a benchmark or threshold value for this session.
// After generating reports, the user can go back to the menu or exit.
mod loader;
mod output;

use chrono::Local;
use clap::Parser;
use communes_report::filters::{
    available_communes, available_groups, available_years, DatasetFilter,
};
use communes_report::normalize::normalize_with_report;
use communes_report::reports;
use communes_report::types::{KpiSummary, RecordExportRow};
use communes_report::util::{format_compact, format_int};
use communes_report::{
    analyze_trends, compare_to_benchmarks, scan_alerts, AnalysisConfig, BudgetRecord,
    ComparisonReport, Result, YearlyIndicatorSet,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Communal budget indicator reports.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// `;`-separated budget export.
    #[arg(long, default_value = "ofgl-base-communes.csv")]
    input: PathBuf,
    /// Department code rows must carry to be kept.
    #[arg(long, default_value = "974")]
    jurisdiction: String,
    /// TOML file with `[benchmarks]`, `[thresholds]` and `[[zones]]`.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Restrict reports to one financial year.
    #[arg(long)]
    year: Option<i32>,
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

// Loaded records and the session configuration, so the CSV is read once
// but reports can be regenerated after changing a value.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    data: Option<Vec<BudgetRecord>>,
    config: AnalysisConfig,
}

#[derive(Serialize)]
struct Summary<'a> {
    generated_on: String,
    year: Option<i32>,
    kpi: &'a KpiSummary,
    comparison: &'a ComparisonReport,
    trends: &'a [YearlyIndicatorSet],
    alert_count: usize,
}

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Returns `true` if the user chose `Y`, `false` on `N` or end of input.
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(resp) = prompt("Back to Report Selection (Y/N): ") else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn lock_state() -> std::sync::MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handle_load(args: &Args) -> Result<()> {
    let (rows, load_report) = loader::load_rows(&args.input)?;
    let (data, norm) = normalize_with_report(&rows, &args.jurisdiction)?;
    println!(
        "Processing dataset... ({} rows read, {} kept for department {})",
        format_int(load_report.total_rows),
        format_int(norm.kept_rows),
        args.jurisdiction
    );
    println!(
        "Note: {} unreadable line(s), {} incomplete row(s), {} row(s) outside the department.",
        format_int(load_report.parse_errors),
        format_int(norm.incomplete_rows),
        format_int(norm.out_of_jurisdiction)
    );
    if load_report.legacy_encoding {
        println!("Info: file decoded as Windows-1252.");
    }
    let years: Vec<String> = available_years(&data).iter().map(ToString::to_string).collect();
    println!(
        "Years: {} | Groups: {} | Communes: {}",
        years.join(", "),
        available_groups(&data).len(),
        available_communes(&data).len()
    );
    println!();
    lock_state().data = Some(data);
    Ok(())
}

fn loaded_snapshot() -> Option<(Vec<BudgetRecord>, AnalysisConfig)> {
    let state = lock_state();
    let data = state.data.clone()?;
    Some((data, state.config.clone()))
}

fn section<T>(args: &Args, title: &str, file: &str, rows: &[T], preview: usize) -> Result<()>
where
    T: Serialize + tabled::Tabled + Clone,
{
    let path = args.output_dir.join(file);
    output::write_csv(&path, rows)?;
    println!("{title}\n");
    output::preview_table_rows(rows, preview);
    println!("(Full table exported to {})\n", path.display());
    Ok(())
}

fn handle_generate_reports(args: &Args) -> Result<()> {
    let Some((all, config)) = loaded_snapshot() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return Ok(());
    };
    let filter = match args.year {
        Some(y) => DatasetFilter::default().with_year(y),
        None => DatasetFilter::default(),
    };
    let data = filter.apply(&all);

    println!("Generating reports...");
    println!("Outputs saved to {}\n", args.output_dir.display());
    std::fs::create_dir_all(&args.output_dir)?;

    let zones = reports::zone_statistics(&data, &config.zones);
    section(args, "Report 1: Savings per Zone", "report1_zone_summary.csv", &zones, 5)?;

    let comparison = compare_to_benchmarks(&data, &config.benchmarks);
    if matches!(comparison, ComparisonReport::InsufficientData) {
        println!("Benchmark comparison: not enough savings or revenue rows.\n");
    }
    let bench = reports::benchmark_rows(&comparison);
    section(args, "Report 2: National Benchmarks", "report2_benchmarks.csv", &bench, 5)?;
    let communes = reports::commune_rows(&comparison);
    section(
        args,
        "Report 3: Communes against the National Savings Level",
        "report3_commune_comparison.csv",
        &communes,
        3,
    )?;

    let trends = analyze_trends(&all);
    let trend_rows = reports::trend_rows(&trends);
    section(args, "Report 4: Annual Trends", "report4_annual_trends.csv", &trend_rows, 3)?;

    let ranking = reports::financing_ranking(&data, reports::DEFAULT_RANKING_SIZE);
    section(args, "Report 5: Financing Capacity Ranking", "report5_financing_ranking.csv", &ranking, 3)?;

    let services = reports::annex_services(&data);
    section(args, "Report 6: Annex Budgets by Service", "report6_annex_services.csv", &services, 5)?;

    let markers = reports::map_markers(&data);
    output::write_csv(&args.output_dir.join("map_markers.csv"), &markers)?;

    let alerts = scan_alerts(&data, &config.thresholds);
    output::write_csv(&args.output_dir.join("alerts.csv"), &reports::alert_rows(&alerts))?;

    let export: Vec<RecordExportRow> = data.iter().map(RecordExportRow::from).collect();
    output::write_csv(&args.output_dir.join("filtered_dataset.csv"), &export)?;

    let today = Local::now().date_naive();
    let kpi = reports::kpi_summary(&data);
    let summary = Summary {
        generated_on: today.to_string(),
        year: args.year,
        kpi: &kpi,
        comparison: &comparison,
        trends: &trends,
        alert_count: alerts.len(),
    };
    output::write_json(&args.output_dir.join("summary.json"), &summary)?;
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"communes\": {}, \"total_savings\": \"{}\", \"alerts\": {}}}\n",
        kpi.commune_count,
        format_compact(kpi.total_savings, 1),
        alerts.len()
    );

    let text = reports::text_report(
        "Financial Report of the Communes of La Réunion",
        today,
        &data,
        &comparison,
        &alerts,
    );
    let report_path = args
        .output_dir
        .join(format!("financial_report_{}.txt", today.format("%Y%m%d")));
    output::write_text(&report_path, &text)?;
    println!("(Text report written to {})\n", report_path.display());
    Ok(())
}

fn handle_alerts(args: &Args) {
    let Some((all, config)) = loaded_snapshot() else {
        println!("Error: No data loaded. Please load the CSV file first (option 1).\n");
        return;
    };
    let data = match args.year {
        Some(y) => DatasetFilter::default().with_year(y).apply(&all),
        None => all,
    };
    let alerts = scan_alerts(&data, &config.thresholds);
    if alerts.is_empty() {
        println!("No critical alert detected.\n");
        return;
    }
    println!("{} alert(s):\n", format_int(alerts.len()));
    output::preview_table_rows(&reports::alert_rows(&alerts), alerts.len());
}

fn handle_configure() -> Result<()> {
    {
        let state = lock_state();
        println!("Benchmarks: {:?}", state.config.benchmarks);
        println!("Thresholds: {:?}\n", state.config.thresholds);
    }
    let Some(key) = prompt("Key (e.g. national_savings_per_capita, savings_low): ") else {
        return Ok(());
    };
    let Some(raw) = prompt("Value: ") else {
        return Ok(());
    };
    let value: f64 = raw
        .replace(',', ".")
        .parse()
        .map_err(|_| communes_report::ReportError::invalid(format!("not a number: {raw}")))?;

    lock_state().config.set_by_name(&key, value)?;
    println!("{key} set to {value}\n");
    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();

    if let Some(path) = &args.config {
        match AnalysisConfig::from_path(path) {
            Ok(config) => lock_state().config = config,
            Err(e) => {
                log::warn!("Ignoring config {}: {e}", path.display());
                eprintln!("Failed to read config, using defaults: {e}\n");
            }
        }
    }

    loop {
        println!("Select an option:");
        println!("[1] Load the file");
        println!("[2] Generate Reports");
        println!("[3] Show Alerts");
        println!("[4] Configure Benchmarks/Thresholds\n");
        let Some(choice) = prompt("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => {
                if let Err(e) = handle_load(&args) {
                    log::error!("Load failed: {e}");
                    eprintln!("Failed to load file: {e}\n");
                }
            }
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&args) {
                    log::error!("Report generation failed: {e}");
                    eprintln!("Write error: {e}\n");
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => handle_alerts(&args),
            "4" => {
                if let Err(e) = handle_configure() {
                    eprintln!("{e}\n");
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2, 3 or 4.\n"),
        }
    }
}
