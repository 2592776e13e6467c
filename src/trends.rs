//! Year-over-year indicator series.

use crate::aggregate::aggregate;
use crate::reference::ZoneTable;
use crate::types::{
    AggregateQuery, BudgetRecord, BudgetType, GroupBy, GroupKey, Indicator, Metric, PeriodChange,
    YearlyIndicatorSet,
};
use crate::util::pct_change;
use std::collections::{BTreeMap, HashMap, HashSet};

fn yearly_means(records: &[BudgetRecord], indicator: Indicator) -> HashMap<i32, Option<f64>> {
    // Year grouping never consults the zone table.
    let zones = ZoneTable::new(Vec::new());
    let query = AggregateQuery::new(GroupBy::Year, indicator, BudgetType::MainBudget, Metric::Mean);
    aggregate(records, &zones, &query)
        .into_iter()
        .filter_map(|a| match a.key {
            GroupKey::Year(year) => Some((year, a.value)),
            _ => None,
        })
        .collect()
}

/// One entry per year that has main-budget rows, ascending.
///
/// With two or more years each entry carries a [`PeriodChange`] (the first
/// one empty); with fewer, `change` is left out entirely.
pub fn analyze_trends(records: &[BudgetRecord]) -> Vec<YearlyIndicatorSet> {
    let mut communes_by_year: BTreeMap<i32, HashSet<&str>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.is_main()) {
        communes_by_year
            .entry(r.year)
            .or_default()
            .insert(r.commune.as_str());
    }

    let savings = yearly_means(records, Indicator::GrossSavings);
    let revenue = yearly_means(records, Indicator::TotalRevenue);
    let financing = yearly_means(records, Indicator::FinancingCapacity);
    let lookup = |means: &HashMap<i32, Option<f64>>, year: i32| means.get(&year).copied().flatten();

    let mut series: Vec<YearlyIndicatorSet> = communes_by_year
        .into_iter()
        .map(|(year, communes)| YearlyIndicatorSet {
            year,
            savings_per_capita: lookup(&savings, year),
            revenue_per_capita: lookup(&revenue, year),
            financing_per_capita: lookup(&financing, year),
            commune_count: communes.len(),
            change: None,
        })
        .collect();

    if series.len() < 2 {
        log::info!("Trend analysis: {} year(s) available, no period changes", series.len());
        return series;
    }

    let mut previous: Option<(Option<f64>, Option<f64>)> = None;
    for entry in &mut series {
        entry.change = Some(match previous {
            None => PeriodChange::default(),
            Some((prev_savings, prev_revenue)) => PeriodChange {
                savings_pct: pct_change(prev_savings, entry.savings_per_capita),
                revenue_pct: pct_change(prev_revenue, entry.revenue_per_capita),
            },
        });
        previous = Some((entry.savings_per_capita, entry.revenue_per_capita));
    }
    series
}
