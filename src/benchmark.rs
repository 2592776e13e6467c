//! Local figures against national benchmarks, overall and per commune.

use crate::aggregate::{has_rows, mean_per_capita};
use crate::config::{BenchmarkKey, Benchmarks};
use crate::types::{
    Assessment, BenchmarkComparison, BudgetRecord, BudgetType, CommuneComparison,
    ComparisonReport, ComparisonSummary, Indicator, IndicatorDelta, LocalFigures, Performer,
    Position,
};
use crate::util::safe_ratio;
use std::collections::HashMap;

/// Derive spending, savings rate and spending/revenue ratio from the two
/// measured means. Both rates are 0 unless revenue is positive.
pub fn local_figures(savings_per_capita: f64, revenue_per_capita: f64) -> LocalFigures {
    let spending_per_capita = revenue_per_capita - savings_per_capita;
    let percent_of_revenue = |part: f64| {
        if revenue_per_capita > 0.0 {
            safe_ratio(part, revenue_per_capita) * 100.0
        } else {
            0.0
        }
    };
    LocalFigures {
        savings_per_capita,
        revenue_per_capita,
        spending_per_capita,
        savings_rate: percent_of_revenue(savings_per_capita),
        spending_revenue_ratio: percent_of_revenue(spending_per_capita),
    }
}

fn assess(key: BenchmarkKey, delta: f64) -> Assessment {
    if delta == 0.0 {
        Assessment::Neutral
    } else if (delta > 0.0) == key.higher_is_better() {
        Assessment::Favourable
    } else {
        Assessment::Unfavourable
    }
}

/// Signed `local - benchmark` deltas, one per benchmark key.
pub fn deltas(local: &LocalFigures, benchmarks: &Benchmarks) -> Vec<IndicatorDelta> {
    [
        (BenchmarkKey::NationalSavingsPerCapita, local.savings_per_capita),
        (BenchmarkKey::NationalRevenuePerCapita, local.revenue_per_capita),
        (BenchmarkKey::NationalSpendingPerCapita, local.spending_per_capita),
        (BenchmarkKey::NationalSavingsRate, local.savings_rate),
        (BenchmarkKey::NationalSpendingRevenueRatio, local.spending_revenue_ratio),
    ]
    .into_iter()
    .map(|(key, local)| {
        let benchmark = benchmarks.get(key);
        let delta = local - benchmark;
        IndicatorDelta {
            key,
            local,
            benchmark,
            delta,
            assessment: assess(key, delta),
        }
    })
    .collect()
}

/// Per-commune comparison against the national savings benchmark.
///
/// Walks main-budget savings rows in input order. Each commune is matched
/// with the first revenue row of the same commune and year; communes whose
/// savings or matched revenue is missing, or whose revenue is not positive,
/// are left out.
pub fn commune_comparisons(
    records: &[BudgetRecord],
    benchmarks: &Benchmarks,
) -> Vec<CommuneComparison> {
    let mut revenue: HashMap<(&str, i32), Option<f64>> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| r.is_main() && r.indicator == Indicator::TotalRevenue)
    {
        revenue.entry((r.commune.as_str(), r.year)).or_insert(r.per_capita);
    }

    let national = benchmarks.national_savings_per_capita;
    records
        .iter()
        .filter(|r| r.is_main() && r.indicator == Indicator::GrossSavings)
        .filter_map(|r| {
            let savings = r.per_capita?;
            let rev = (*revenue.get(&(r.commune.as_str(), r.year))?)?;
            if rev <= 0.0 {
                log::debug!("Excluding {} {} from commune comparison: revenue {rev}", r.commune, r.year);
                return None;
            }
            let figures = local_figures(savings, rev);
            Some(CommuneComparison {
                commune: r.commune.clone(),
                year: r.year,
                savings_per_capita: savings,
                revenue_per_capita: rev,
                spending_per_capita: figures.spending_per_capita,
                savings_rate: figures.savings_rate,
                delta_vs_national: savings - national,
                position: if savings > national {
                    Position::Above
                } else {
                    Position::Below
                },
            })
        })
        .collect()
}

struct Extremes {
    best: (f64, usize),
    worst: (f64, usize),
}

/// Best and worst performer by delta, as an explicit fold over the ordered
/// sequence. A later entry replaces the current extreme only when strictly
/// better (or worse), so ties keep the first occurrence.
pub fn summarize(communes: &[CommuneComparison]) -> Option<ComparisonSummary> {
    let extremes = communes
        .iter()
        .enumerate()
        .fold(None::<Extremes>, |acc, (idx, c)| {
            let d = c.delta_vs_national;
            Some(match acc {
                None => Extremes {
                    best: (d, idx),
                    worst: (d, idx),
                },
                Some(mut e) => {
                    if d > e.best.0 {
                        e.best = (d, idx);
                    }
                    if d < e.worst.0 {
                        e.worst = (d, idx);
                    }
                    e
                }
            })
        })?;

    let performer = |(delta, idx): (f64, usize)| Performer {
        commune: communes[idx].commune.clone(),
        delta,
    };
    let above_count = communes
        .iter()
        .filter(|c| c.position == Position::Above)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let above_pct = safe_ratio(above_count as f64, communes.len() as f64) * 100.0;

    Some(ComparisonSummary {
        above_count,
        total: communes.len(),
        above_pct,
        best: performer(extremes.best),
        worst: performer(extremes.worst),
    })
}

/// Compare the dataset's main-budget means with `benchmarks`.
///
/// Short-circuits to [`ComparisonReport::InsufficientData`] when either the
/// savings or the revenue group is empty or carries no per-capita value.
pub fn compare_to_benchmarks(records: &[BudgetRecord], benchmarks: &Benchmarks) -> ComparisonReport {
    let main = BudgetType::MainBudget;
    if !has_rows(records, &Indicator::GrossSavings, main)
        || !has_rows(records, &Indicator::TotalRevenue, main)
    {
        log::info!("Benchmark comparison skipped: savings or revenue rows missing");
        return ComparisonReport::InsufficientData;
    }
    let (Some(savings), Some(revenue)) = (
        mean_per_capita(records, &Indicator::GrossSavings, main),
        mean_per_capita(records, &Indicator::TotalRevenue, main),
    ) else {
        log::info!("Benchmark comparison skipped: no per-capita values");
        return ComparisonReport::InsufficientData;
    };

    let local = local_figures(savings, revenue);
    let communes = commune_comparisons(records, benchmarks);
    let summary = summarize(&communes);
    ComparisonReport::Complete(BenchmarkComparison {
        local,
        deltas: deltas(&local, benchmarks),
        communes,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BudgetType::MainBudget;

    fn row(commune: &str, indicator: Indicator, per_capita: Option<f64>) -> BudgetRecord {
        let r = BudgetRecord::new(2017, commune, MainBudget, indicator);
        match per_capita {
            Some(v) => r.with_per_capita(v),
            None => r,
        }
    }

    fn pair(commune: &str, savings: f64, revenue: f64) -> [BudgetRecord; 2] {
        [
            row(commune, Indicator::GrossSavings, Some(savings)),
            row(commune, Indicator::TotalRevenue, Some(revenue)),
        ]
    }

    fn complete(report: ComparisonReport) -> BenchmarkComparison {
        match report {
            ComparisonReport::Complete(c) => c,
            ComparisonReport::InsufficientData => panic!("expected a complete comparison"),
        }
    }

    #[test]
    fn local_spending_is_revenue_minus_savings() {
        let records: Vec<BudgetRecord> = [pair("A", 120.0, 1300.0), pair("B", 180.0, 1500.0)]
            .into_iter()
            .flatten()
            .collect();
        let c = complete(compare_to_benchmarks(&records, &Benchmarks::default()));
        assert!((c.local.savings_per_capita - 150.0).abs() < 1e-9);
        assert!((c.local.revenue_per_capita - 1400.0).abs() < 1e-9);
        assert_eq!(
            c.local.spending_per_capita,
            c.local.revenue_per_capita - c.local.savings_per_capita
        );
        for commune in &c.communes {
            assert_eq!(
                commune.spending_per_capita,
                commune.revenue_per_capita - commune.savings_per_capita
            );
        }
    }

    #[test]
    fn zero_revenue_mean_yields_zero_rates() {
        let records: Vec<BudgetRecord> = [pair("A", 100.0, 0.0), pair("B", 50.0, 0.0)]
            .into_iter()
            .flatten()
            .collect();
        let c = complete(compare_to_benchmarks(&records, &Benchmarks::default()));
        assert!(c.local.savings_rate.abs() < f64::EPSILON);
        assert!(c.local.spending_revenue_ratio.abs() < f64::EPSILON);
        // Zero-revenue communes drop out of the per-commune view.
        assert!(c.communes.is_empty());
        assert!(c.summary.is_none());
    }

    #[test]
    fn negative_revenue_mean_yields_zero_rates() {
        let local = local_figures(50.0, -100.0);
        assert!((local.spending_per_capita + 150.0).abs() < 1e-9);
        assert!(local.savings_rate.abs() < f64::EPSILON);
        assert!(local.spending_revenue_ratio.abs() < f64::EPSILON);

        let records = pair("A", 50.0, -100.0);
        let c = complete(compare_to_benchmarks(&records, &Benchmarks::default()));
        assert!(c.local.savings_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn deltas_against_benchmarks() {
        let records = pair("A", 150.0, 1350.0);
        let c = complete(compare_to_benchmarks(&records, &Benchmarks::default()));
        assert_eq!(c.deltas.len(), 5);
        let savings = &c.deltas[0];
        assert_eq!(savings.key, BenchmarkKey::NationalSavingsPerCapita);
        assert!(savings.delta.abs() < 1e-9);
        assert_eq!(savings.assessment, Assessment::Neutral);
        // spending 1200 vs 1200, rate 11.11 vs 11.1.
        let rate = &c.deltas[3];
        assert!((rate.local - 11.111_111).abs() < 1e-5);
        assert_eq!(rate.assessment, Assessment::Favourable);
    }

    #[test]
    fn lower_spending_is_favourable() {
        let local = local_figures(300.0, 1300.0);
        let d = deltas(&local, &Benchmarks::default());
        let spending = d
            .iter()
            .find(|d| d.key == BenchmarkKey::NationalSpendingPerCapita)
            .unwrap();
        assert!((spending.delta + 200.0).abs() < 1e-9);
        assert_eq!(spending.assessment, Assessment::Favourable);
    }

    #[test]
    fn empty_groups_short_circuit() {
        let only_savings = [row("A", Indicator::GrossSavings, Some(100.0))];
        assert_eq!(
            compare_to_benchmarks(&only_savings, &Benchmarks::default()),
            ComparisonReport::InsufficientData
        );
        let no_values = [
            row("A", Indicator::GrossSavings, None),
            row("A", Indicator::TotalRevenue, Some(1000.0)),
        ];
        assert_eq!(
            compare_to_benchmarks(&no_values, &Benchmarks::default()),
            ComparisonReport::InsufficientData
        );
        assert_eq!(
            compare_to_benchmarks(&[], &Benchmarks::default()),
            ComparisonReport::InsufficientData
        );
    }

    #[test]
    fn communes_without_usable_revenue_are_excluded() {
        let records = vec![
            row("A", Indicator::GrossSavings, Some(100.0)),
            row("A", Indicator::TotalRevenue, None),
            row("B", Indicator::GrossSavings, Some(100.0)),
            row("C", Indicator::GrossSavings, Some(100.0)),
            row("C", Indicator::TotalRevenue, Some(-5.0)),
            row("D", Indicator::GrossSavings, Some(200.0)),
            row("D", Indicator::TotalRevenue, Some(1000.0)),
        ];
        let communes = commune_comparisons(&records, &Benchmarks::default());
        assert_eq!(communes.len(), 1);
        assert_eq!(communes[0].commune, "D");
        assert_eq!(communes[0].position, Position::Above);
        assert!((communes[0].savings_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn best_performer_tie_keeps_first_occurrence() {
        // national 150: A +80, B -40, C +80.
        let records: Vec<BudgetRecord> = [
            pair("A", 230.0, 1000.0),
            pair("B", 110.0, 1000.0),
            pair("C", 230.0, 1000.0),
        ]
        .into_iter()
        .flatten()
        .collect();
        let c = complete(compare_to_benchmarks(&records, &Benchmarks::default()));
        let summary = c.summary.unwrap();
        assert_eq!(summary.best.commune, "A");
        assert!((summary.best.delta - 80.0).abs() < 1e-9);
        assert_eq!(summary.worst.commune, "B");
        assert_eq!(summary.above_count, 2);
        assert_eq!(summary.total, 3);
        assert!((summary.above_pct - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn worst_performer_tie_keeps_first_occurrence() {
        let records: Vec<BudgetRecord> = [
            pair("A", 100.0, 1000.0),
            pair("B", 100.0, 1000.0),
            pair("C", 400.0, 1000.0),
        ]
        .into_iter()
        .flatten()
        .collect();
        let summary = summarize(&commune_comparisons(&records, &Benchmarks::default())).unwrap();
        assert_eq!(summary.worst.commune, "A");
        assert_eq!(summary.best.commune, "C");
    }

    #[test]
    fn equal_to_benchmark_counts_as_below() {
        let communes = commune_comparisons(&pair("A", 150.0, 1000.0), &Benchmarks::default());
        assert_eq!(communes[0].position, Position::Below);
    }
}
