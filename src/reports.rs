//! Report builders on top of the core results: KPIs, zone table, map
//! markers, annex services, financing ranking and the plain-text report.

use crate::aggregate::aggregate;
use crate::reference::{coordinates, has_coordinates, ZoneTable};
use crate::types::{
    AggregateQuery, AlertRecord, AlertRow, BenchmarkRow, BudgetRecord, BudgetType,
    CommuneBenchmarkRow, ComparisonReport, FinancingRow, GroupBy, Indicator, KpiSummary,
    MapMarkerRow, Metric, ServiceCountRow, TrendRow, YearlyIndicatorSet, ZoneSummaryRow,
};
use crate::util::{format_int, format_number, format_opt, format_signed};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use strum_macros::Display;

pub const DEFAULT_RANKING_SIZE: usize = 20;
pub const REPORT_ALERT_LIMIT: usize = 5;

pub fn kpi_summary(records: &[BudgetRecord]) -> KpiSummary {
    let mut total_savings = 0.0;
    let mut total_revenue = 0.0;
    let mut communes: HashSet<&str> = HashSet::new();
    let mut population: HashMap<(&str, i32), u64> = HashMap::new();

    for r in records.iter().filter(|r| r.is_main()) {
        communes.insert(&r.commune);
        if let Some(p) = r.population {
            population.entry((r.commune.as_str(), r.year)).or_insert(p);
        }
        match r.indicator {
            Indicator::GrossSavings => total_savings += r.amount.unwrap_or(0.0),
            Indicator::TotalRevenue => total_revenue += r.amount.unwrap_or(0.0),
            _ => {}
        }
    }

    KpiSummary {
        total_savings,
        commune_count: communes.len(),
        total_population: population.values().sum(),
        total_revenue,
    }
}

/// One row per zone, in zone table order, from the savings aggregate.
pub fn zone_statistics(records: &[BudgetRecord], zones: &ZoneTable) -> Vec<ZoneSummaryRow> {
    let query = AggregateQuery::new(
        GroupBy::Zone,
        Indicator::GrossSavings,
        BudgetType::MainBudget,
        Metric::Mean,
    );
    aggregate(records, zones, &query)
        .into_iter()
        .map(|a| ZoneSummaryRow {
            zone: a.key.to_string(),
            num_communes: a.commune_count,
            total_population: format_int(a.population),
            avg_savings_per_capita: format_opt(a.value, 0),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SavingsBand {
    Negative,
    Low,
    Moderate,
    High,
}

impl SavingsBand {
    pub fn of(savings_per_capita: f64) -> Self {
        if savings_per_capita < 0.0 {
            Self::Negative
        } else if savings_per_capita < 100.0 {
            Self::Low
        } else if savings_per_capita < 300.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

/// One marker per main-budget savings row that has a per-capita value.
/// Communes missing from the coordinate table sit on the island centroid.
pub fn map_markers(records: &[BudgetRecord]) -> Vec<MapMarkerRow> {
    records
        .iter()
        .filter(|r| r.is_main() && r.indicator == Indicator::GrossSavings)
        .filter_map(|r| {
            let savings = r.per_capita?;
            if !has_coordinates(&r.commune) {
                log::debug!("No coordinates for {}, using the island centroid", r.commune);
            }
            let (latitude, longitude) = coordinates(&r.commune);
            let population = r.population.unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let total = savings * population as f64;
            Some(MapMarkerRow {
                commune: r.commune.clone(),
                latitude,
                longitude,
                savings_per_capita: format_number(savings, 0),
                population: format_int(population),
                total_savings: format_number(total, 0),
                band: SavingsBand::of(savings).to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AnnexService {
    Water,
    Sanitation,
    #[strum(to_string = "Funeral services")]
    FuneralServices,
    #[strum(to_string = "SPANC")]
    Spanc,
    Other,
}

/// Classify an annex budget label. Checks run in order, so "Eau et
/// assainissement" counts as water.
pub fn classify_service(label: &str) -> AnnexService {
    let lower = label.to_lowercase();
    if lower.contains("eau") {
        AnnexService::Water
    } else if lower.contains("assain") {
        AnnexService::Sanitation
    } else if lower.contains("pompe") {
        AnnexService::FuneralServices
    } else if lower.contains("spanc") {
        AnnexService::Spanc
    } else {
        AnnexService::Other
    }
}

/// Distinct annex budgets per service, most frequent first.
pub fn annex_services(records: &[BudgetRecord]) -> Vec<ServiceCountRow> {
    let mut seen: HashSet<(&str, i32, &str)> = HashSet::new();
    let mut counts: HashMap<AnnexService, usize> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| r.budget_type == BudgetType::AnnexBudget)
    {
        let label = r.budget_label.as_deref().unwrap_or("");
        if seen.insert((r.commune.as_str(), r.year, label)) {
            *counts.entry(classify_service(label)).or_default() += 1;
        }
    }

    let mut rows: Vec<(AnnexService, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
    rows.into_iter()
        .map(|(service, budgets)| ServiceCountRow {
            service: service.to_string(),
            budgets,
        })
        .collect()
}

/// Top `limit` main-budget financing capacity rows per inhabitant, highest
/// first. Ties keep input order.
pub fn financing_ranking(records: &[BudgetRecord], limit: usize) -> Vec<FinancingRow> {
    let mut rows: Vec<(&BudgetRecord, f64)> = records
        .iter()
        .filter(|r| r.is_main() && r.indicator == Indicator::FinancingCapacity)
        .filter_map(|r| r.per_capita.map(|v| (r, v)))
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (r, v))| FinancingRow {
            rank: i + 1,
            commune: r.commune.clone(),
            year: r.year,
            financing_per_capita: format_number(v, 0),
        })
        .collect()
}

pub fn benchmark_rows(report: &ComparisonReport) -> Vec<BenchmarkRow> {
    let Some(comparison) = report.comparison() else {
        return Vec::new();
    };
    comparison
        .deltas
        .iter()
        .map(|d| {
            let unit = d.key.unit();
            let decimals = if unit == "%" { 1 } else { 0 };
            BenchmarkRow {
                indicator: d.key.label().to_string(),
                local: format!("{} {unit}", format_number(d.local, decimals)),
                benchmark: format!("{} {unit}", format_number(d.benchmark, decimals)),
                delta: format!("{} {unit}", format_signed(d.delta, decimals)),
                assessment: d.assessment.to_string(),
            }
        })
        .collect()
}

pub fn commune_rows(report: &ComparisonReport) -> Vec<CommuneBenchmarkRow> {
    let Some(comparison) = report.comparison() else {
        return Vec::new();
    };
    comparison
        .communes
        .iter()
        .map(|c| CommuneBenchmarkRow {
            commune: c.commune.clone(),
            savings_per_capita: format_number(c.savings_per_capita, 0),
            revenue_per_capita: format_number(c.revenue_per_capita, 0),
            spending_per_capita: format_number(c.spending_per_capita, 0),
            savings_rate: format!("{} %", format_number(c.savings_rate, 1)),
            delta_vs_national: format_signed(c.delta_vs_national, 0),
            position: c.position.to_string(),
        })
        .collect()
}

fn format_change(pct: Option<f64>) -> String {
    pct.map_or_else(|| "-".to_string(), |v| format!("{} %", format_signed(v, 1)))
}

pub fn trend_rows(series: &[YearlyIndicatorSet]) -> Vec<TrendRow> {
    series
        .iter()
        .map(|s| TrendRow {
            year: s.year,
            savings_per_capita: format_opt(s.savings_per_capita, 0),
            revenue_per_capita: format_opt(s.revenue_per_capita, 0),
            financing_per_capita: format_opt(s.financing_per_capita, 0),
            num_communes: s.commune_count,
            savings_change: format_change(s.change.and_then(|c| c.savings_pct)),
            revenue_change: format_change(s.change.and_then(|c| c.revenue_pct)),
        })
        .collect()
}

pub fn alert_rows(alerts: &[AlertRecord]) -> Vec<AlertRow> {
    alerts
        .iter()
        .map(|a| AlertRow {
            severity: a.severity.to_string(),
            commune: a.commune.clone(),
            year: a.year,
            indicator: a.subject.to_string(),
            message: a.message.clone(),
        })
        .collect()
}

/// Plain-text summary report in a light Markdown layout.
pub fn text_report(
    title: &str,
    date: NaiveDate,
    records: &[BudgetRecord],
    comparison: &ComparisonReport,
    alerts: &[AlertRecord],
) -> String {
    let kpi = kpi_summary(records);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# {title}");
    let _ = writeln!(out, "Date: {}", date.format("%d/%m/%Y"));
    let _ = writeln!(out);
    let _ = writeln!(out, "## Key figures");
    let _ = writeln!(out, "- Communes analysed: {}", format_int(kpi.commune_count));
    let _ = writeln!(out, "- Total population: {}", format_int(kpi.total_population));
    let _ = writeln!(
        out,
        "- Total gross savings: {} M€",
        format_number(kpi.total_savings / 1_000_000.0, 1)
    );
    let _ = writeln!(
        out,
        "- Total revenue: {} M€",
        format_number(kpi.total_revenue / 1_000_000.0, 1)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Benchmarks");
    match comparison.comparison() {
        None => {
            let _ = writeln!(out, "Not enough data for a benchmark comparison.");
        }
        Some(c) => {
            for row in benchmark_rows(comparison) {
                let _ = writeln!(
                    out,
                    "- {}: {} (benchmark {}, delta {}, {})",
                    row.indicator, row.local, row.benchmark, row.delta, row.assessment
                );
            }
            if let Some(s) = &c.summary {
                let _ = writeln!(
                    out,
                    "- Communes above the national savings level: {}/{} ({} %)",
                    s.above_count,
                    s.total,
                    format_number(s.above_pct, 1)
                );
                let _ = writeln!(
                    out,
                    "- Best performer: {} ({} €/inhabitant)",
                    s.best.commune,
                    format_signed(s.best.delta, 0)
                );
                let _ = writeln!(
                    out,
                    "- Worst performer: {} ({} €/inhabitant)",
                    s.worst.commune,
                    format_signed(s.worst.delta, 0)
                );
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Main alerts");
    if alerts.is_empty() {
        let _ = writeln!(out, "No critical alert detected.");
    } else {
        for a in alerts.iter().take(REPORT_ALERT_LIMIT) {
            let _ = writeln!(out, "- [{}] {} ({}): {}", a.severity, a.commune, a.year, a.message);
        }
        if alerts.len() > REPORT_ALERT_LIMIT {
            let _ = writeln!(out, "- ... and {} more", alerts.len() - REPORT_ALERT_LIMIT);
        }
    }
    out
}
