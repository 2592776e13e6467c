//! Indicator aggregator: group records and reduce them to one value per group.

use crate::reference::ZoneTable;
use crate::types::{
    AggregateQuery, BudgetRecord, BudgetType, GroupBy, GroupKey, Indicator, IndicatorAggregate,
    Metric,
};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct Acc<'a> {
    rows: usize,
    population: u64,
    amount_sum: f64,
    amount_count: usize,
    per_capita_sum: f64,
    per_capita_count: usize,
    communes: HashSet<&'a str>,
}

impl<'a> Acc<'a> {
    fn push(&mut self, r: &'a BudgetRecord) {
        self.rows += 1;
        self.population += r.population.unwrap_or(0);
        if let Some(amount) = r.amount {
            self.amount_sum += amount;
            self.amount_count += 1;
        }
        if let Some(v) = r.per_capita {
            self.per_capita_sum += v;
            self.per_capita_count += 1;
        }
        self.communes.insert(&r.commune);
    }

    /// Value and the number of rows it was computed from.
    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, metric: Metric) -> (Option<f64>, usize) {
        match metric {
            Metric::Sum => (
                (self.amount_count > 0).then_some(self.amount_sum),
                self.amount_count,
            ),
            Metric::Mean | Metric::PerCapitaMean => (
                (self.per_capita_count > 0)
                    .then(|| self.per_capita_sum / self.per_capita_count as f64),
                self.per_capita_count,
            ),
        }
    }
}

fn matches(r: &BudgetRecord, indicator: &Indicator, budget_type: BudgetType) -> bool {
    r.budget_type == budget_type && &r.indicator == indicator
}

/// Group `records` per `query`.
///
/// Groups come out in first-seen order for communes and years, and in zone
/// table order for zones. Records of communes outside every zone are left
/// out of zone groups.
pub fn aggregate(
    records: &[BudgetRecord],
    zones: &ZoneTable,
    query: &AggregateQuery,
) -> Vec<IndicatorAggregate> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Acc> = HashMap::new();
    let mut unmapped = 0usize;

    for r in records
        .iter()
        .filter(|r| matches(r, &query.indicator, query.budget_type))
    {
        let key = match query.group_by {
            GroupBy::Commune => GroupKey::Commune(r.commune.clone()),
            GroupBy::Year => GroupKey::Year(r.year),
            GroupBy::Zone => {
                let Some(zone) = zones.zone_of(&r.commune) else {
                    unmapped += 1;
                    continue;
                };
                GroupKey::Zone(zone.to_string())
            }
        };
        groups
            .entry(key)
            .or_insert_with_key(|k| {
                order.push(k.clone());
                Acc::default()
            })
            .push(r);
    }

    if unmapped > 0 {
        log::debug!("{unmapped} row(s) left out of zone groups (commune not in any zone)");
    }

    if query.group_by == GroupBy::Zone {
        order.sort_by_key(|k| match k {
            GroupKey::Zone(name) => zones.position(name).unwrap_or(usize::MAX),
            _ => usize::MAX,
        });
    }

    order
        .into_iter()
        .filter_map(|key| {
            let acc = groups.remove(&key)?;
            let (value, value_count) = acc.finish(query.metric);
            Some(IndicatorAggregate {
                key,
                indicator: query.indicator.clone(),
                value,
                population: acc.population,
                row_count: acc.rows,
                value_count,
                commune_count: acc.communes.len(),
            })
        })
        .collect()
}

/// Mean per-capita value over every matching record, ungrouped.
///
/// `None` when no matching record has a per-capita value.
pub fn mean_per_capita(
    records: &[BudgetRecord],
    indicator: &Indicator,
    budget_type: BudgetType,
) -> Option<f64> {
    let mut acc = Acc::default();
    records
        .iter()
        .filter(|r| matches(r, indicator, budget_type))
        .for_each(|r| acc.push(r));
    acc.finish(Metric::Mean).0
}

/// Whether any record matches `indicator` and `budget_type` at all.
pub fn has_rows(records: &[BudgetRecord], indicator: &Indicator, budget_type: BudgetType) -> bool {
    records.iter().any(|r| matches(r, indicator, budget_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BudgetType::{AnnexBudget, MainBudget};

    fn savings(commune: &str, year: i32, per_capita: Option<f64>) -> BudgetRecord {
        let r = BudgetRecord::new(year, commune, MainBudget, Indicator::GrossSavings)
            .with_amount(1000.0)
            .with_population(10);
        match per_capita {
            Some(v) => r.with_per_capita(v),
            None => r,
        }
    }

    fn query(group_by: GroupBy, metric: Metric) -> AggregateQuery {
        AggregateQuery::new(group_by, Indicator::GrossSavings, MainBudget, metric)
    }

    #[test]
    fn empty_input_groups_to_empty_output() {
        let zones = ZoneTable::reunion();
        for group_by in [GroupBy::Commune, GroupBy::Zone, GroupBy::Year] {
            assert!(aggregate(&[], &zones, &query(group_by, Metric::Sum)).is_empty());
        }
    }

    #[test]
    fn mean_ignores_missing_per_capita_values() {
        let records = vec![
            savings("Saint-Denis", 2017, Some(100.0)),
            savings("Saint-Denis", 2017, None),
            savings("Saint-Denis", 2017, Some(200.0)),
        ];
        let out = aggregate(&records, &ZoneTable::reunion(), &query(GroupBy::Commune, Metric::Mean));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Some(150.0));
        assert_eq!(out[0].row_count, 3);
        assert_eq!(out[0].value_count, 2);
    }

    #[test]
    fn all_missing_group_has_no_value() {
        let records = vec![savings("Cilaos", 2017, None), savings("Cilaos", 2017, None)];
        let out = aggregate(
            &records,
            &ZoneTable::reunion(),
            &query(GroupBy::Commune, Metric::PerCapitaMean),
        );
        assert_eq!(out[0].value, None);
        assert_eq!(out[0].value_count, 0);
    }

    #[test]
    fn sum_totals_absolute_amounts() {
        let records = vec![
            savings("Le Port", 2016, None),
            savings("Cilaos", 2016, None),
            savings("Cilaos", 2017, None),
        ];
        let out = aggregate(&records, &ZoneTable::reunion(), &query(GroupBy::Year, Metric::Sum));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, GroupKey::Year(2016));
        assert_eq!(out[0].value, Some(2000.0));
        assert_eq!(out[0].commune_count, 2);
        assert_eq!(out[1].value, Some(1000.0));
    }

    #[test]
    fn filters_on_budget_type_and_indicator() {
        let records = vec![
            savings("Le Port", 2017, Some(10.0)),
            BudgetRecord::new(2017, "Le Port", AnnexBudget, Indicator::GrossSavings)
                .with_per_capita(999.0),
            BudgetRecord::new(2017, "Le Port", MainBudget, Indicator::TotalRevenue)
                .with_per_capita(999.0),
        ];
        let out = aggregate(&records, &ZoneTable::reunion(), &query(GroupBy::Commune, Metric::Mean));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Some(10.0));
    }

    #[test]
    fn unmapped_communes_never_reach_zone_groups() {
        let records = vec![
            savings("Saint-Denis", 2017, Some(100.0)),
            savings("Atlantis", 2017, Some(-5000.0)),
            savings("Sainte-Marie", 2017, Some(200.0)),
            savings("Cilaos", 2017, Some(50.0)),
        ];
        let out = aggregate(&records, &ZoneTable::reunion(), &query(GroupBy::Zone, Metric::Mean));
        let keys: Vec<String> = out.iter().map(|a| a.key.to_string()).collect();
        assert_eq!(keys, vec!["Nord", "Cirques"]);
        assert_eq!(out[0].value, Some(150.0));
        assert_eq!(out[0].population, 20);
        assert_eq!(out[0].commune_count, 2);
        let grouped: usize = out.iter().map(|a| a.row_count).sum();
        assert_eq!(grouped, records.len() - 1);
    }

    #[test]
    fn zone_output_follows_table_order() {
        let records = vec![
            savings("Cilaos", 2017, Some(1.0)),
            savings("Le Port", 2017, Some(2.0)),
            savings("Saint-Denis", 2017, Some(3.0)),
        ];
        let out = aggregate(&records, &ZoneTable::reunion(), &query(GroupBy::Zone, Metric::Mean));
        let keys: Vec<String> = out.iter().map(|a| a.key.to_string()).collect();
        assert_eq!(keys, vec!["Nord", "Ouest", "Cirques"]);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let records = vec![
            savings("Saint-Denis", 2017, Some(100.0)),
            savings("Le Port", 2017, Some(50.0)),
            savings("Le Tampon", 2016, Some(75.0)),
        ];
        let zones = ZoneTable::reunion();
        for group_by in [GroupBy::Commune, GroupBy::Zone, GroupBy::Year] {
            let q = query(group_by, Metric::Mean);
            assert_eq!(aggregate(&records, &zones, &q), aggregate(&records, &zones, &q));
        }
    }

    #[test]
    fn overall_mean_and_presence() {
        let records = vec![
            savings("Saint-Denis", 2017, Some(100.0)),
            savings("Le Port", 2017, None),
            savings("Le Tampon", 2017, Some(50.0)),
        ];
        assert_eq!(
            mean_per_capita(&records, &Indicator::GrossSavings, MainBudget),
            Some(75.0)
        );
        assert_eq!(mean_per_capita(&records, &Indicator::TotalRevenue, MainBudget), None);
        assert!(has_rows(&records, &Indicator::GrossSavings, MainBudget));
        assert!(!has_rows(&records, &Indicator::GrossSavings, AnnexBudget));
    }
}
