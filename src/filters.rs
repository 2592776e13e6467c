//! Dataset selection applied before analysis: year, intercommunal group,
//! commune and commune characteristics.

use crate::types::{BudgetRecord, CommuneTraits};
use crate::util::canonical_commune;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFilter {
    pub year: Option<i32>,
    /// Keep only these groups; empty keeps all.
    pub groups: Vec<String>,
    /// Keep only these communes; empty keeps all.
    pub communes: Vec<String>,
    /// `Some(flag)` requires the commune trait to equal `flag`.
    pub traits: CommuneTraits,
}

fn trait_matches(wanted: Option<bool>, actual: Option<bool>) -> bool {
    wanted.map_or(true, |w| actual == Some(w))
}

impl DatasetFilter {
    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn with_groups<S: AsRef<str>>(mut self, groups: &[S]) -> Self {
        self.groups = groups.iter().map(|g| g.as_ref().trim().to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_communes<S: AsRef<str>>(mut self, communes: &[S]) -> Self {
        self.communes = communes
            .iter()
            .map(|c| canonical_commune(c.as_ref()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_traits(mut self, traits: CommuneTraits) -> Self {
        self.traits = traits;
        self
    }

    pub fn matches(&self, r: &BudgetRecord) -> bool {
        if self.year.is_some_and(|y| y != r.year) {
            return false;
        }
        if !self.groups.is_empty()
            && !r
                .group
                .as_ref()
                .is_some_and(|g| self.groups.iter().any(|wanted| wanted == g))
        {
            return false;
        }
        if !self.communes.is_empty() && !self.communes.contains(&r.commune) {
            return false;
        }
        trait_matches(self.traits.rural, r.traits.rural)
            && trait_matches(self.traits.mountain, r.traits.mountain)
            && trait_matches(self.traits.touristic, r.traits.touristic)
            && trait_matches(self.traits.priority_district, r.traits.priority_district)
    }

    pub fn apply(&self, records: &[BudgetRecord]) -> Vec<BudgetRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

pub fn available_years(records: &[BudgetRecord]) -> Vec<i32> {
    records
        .iter()
        .map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn available_groups(records: &[BudgetRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn available_communes(records: &[BudgetRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.commune.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BudgetType, Indicator};

    fn records() -> Vec<BudgetRecord> {
        let mut mountain = BudgetRecord::new(2017, "Cilaos", BudgetType::MainBudget, Indicator::GrossSavings)
            .with_group("CIVIS");
        mountain.traits.mountain = Some(true);
        vec![
            BudgetRecord::new(2016, "Saint-Denis", BudgetType::MainBudget, Indicator::GrossSavings)
                .with_group("CINOR"),
            BudgetRecord::new(2017, "Saint-Denis", BudgetType::MainBudget, Indicator::GrossSavings)
                .with_group("CINOR"),
            mountain,
            BudgetRecord::new(2017, "Le Port", BudgetType::MainBudget, Indicator::GrossSavings),
        ]
    }

    #[test]
    fn default_filter_keeps_everything() {
        assert_eq!(DatasetFilter::default().apply(&records()).len(), 4);
    }

    #[test]
    fn filters_by_year_group_and_commune() {
        let data = records();
        assert_eq!(DatasetFilter::default().with_year(2017).apply(&data).len(), 3);
        assert_eq!(
            DatasetFilter::default().with_groups(&["CINOR"]).apply(&data).len(),
            2
        );
        let one = DatasetFilter::default()
            .with_year(2017)
            .with_communes(&["saint-denis"])
            .apply(&data);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].commune, "SAINT-DENIS");
    }

    #[test]
    fn filters_by_traits() {
        let traits = CommuneTraits {
            mountain: Some(true),
            ..CommuneTraits::default()
        };
        let kept = DatasetFilter::default().with_traits(traits).apply(&records());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].commune, "CILAOS");
    }

    #[test]
    fn lists_available_values() {
        let data = records();
        assert_eq!(available_years(&data), vec![2016, 2017]);
        assert_eq!(available_groups(&data), vec!["CINOR", "CIVIS"]);
        assert_eq!(available_communes(&data), vec!["CILAOS", "LE PORT", "SAINT-DENIS"]);
    }
}
