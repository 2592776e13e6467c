//! Benchmarks, alert thresholds and the caller-owned configuration context.
//!
//! Nothing in the engine holds configuration globally: callers own an
//! [`AnalysisConfig`], adjust it through the keyed setters below, and pass
//! the pieces into each computation.

use crate::error::{ReportError, Result};
use crate::reference::ZoneTable;
use crate::types::parse_named;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

fn check_finite(key: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ReportError::invalid(format!("{key} must be a finite number, got {value}")))
    }
}

/// Keys of the [`Benchmarks`] record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BenchmarkKey {
    NationalSavingsPerCapita,
    NationalRevenuePerCapita,
    NationalSpendingPerCapita,
    NationalSavingsRate,
    NationalSpendingRevenueRatio,
}

impl BenchmarkKey {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NationalSavingsPerCapita => "Gross savings per inhabitant",
            Self::NationalRevenuePerCapita => "Revenue per inhabitant",
            Self::NationalSpendingPerCapita => "Spending per inhabitant",
            Self::NationalSavingsRate => "Savings rate",
            Self::NationalSpendingRevenueRatio => "Spending/revenue ratio",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::NationalSavingsRate | Self::NationalSpendingRevenueRatio => "%",
            _ => "€",
        }
    }

    /// Whether a local value above the benchmark is good news.
    pub const fn higher_is_better(self) -> bool {
        !matches!(
            self,
            Self::NationalSpendingPerCapita | Self::NationalSpendingRevenueRatio
        )
    }
}

/// National reference values, per inhabitant or in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Benchmarks {
    pub national_savings_per_capita: f64,
    pub national_revenue_per_capita: f64,
    pub national_spending_per_capita: f64,
    pub national_savings_rate: f64,
    pub national_spending_revenue_ratio: f64,
}

impl Default for Benchmarks {
    fn default() -> Self {
        Self {
            national_savings_per_capita: 150.0,
            national_revenue_per_capita: 1350.0,
            national_spending_per_capita: 1200.0,
            national_savings_rate: 11.1,
            national_spending_revenue_ratio: 88.9,
        }
    }
}

impl Benchmarks {
    pub const fn get(&self, key: BenchmarkKey) -> f64 {
        match key {
            BenchmarkKey::NationalSavingsPerCapita => self.national_savings_per_capita,
            BenchmarkKey::NationalRevenuePerCapita => self.national_revenue_per_capita,
            BenchmarkKey::NationalSpendingPerCapita => self.national_spending_per_capita,
            BenchmarkKey::NationalSavingsRate => self.national_savings_rate,
            BenchmarkKey::NationalSpendingRevenueRatio => self.national_spending_revenue_ratio,
        }
    }

    pub fn set(&mut self, key: BenchmarkKey, value: f64) -> Result<()> {
        check_finite(key.as_ref(), value)?;
        let slot = match key {
            BenchmarkKey::NationalSavingsPerCapita => &mut self.national_savings_per_capita,
            BenchmarkKey::NationalRevenuePerCapita => &mut self.national_revenue_per_capita,
            BenchmarkKey::NationalSpendingPerCapita => &mut self.national_spending_per_capita,
            BenchmarkKey::NationalSavingsRate => &mut self.national_savings_rate,
            BenchmarkKey::NationalSpendingRevenueRatio => {
                &mut self.national_spending_revenue_ratio
            }
        };
        *slot = value;
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<()> {
        let key: BenchmarkKey = parse_named("benchmark key", name)?;
        self.set(key, value)
    }

    fn validate(&self) -> Result<()> {
        use strum::IntoEnumIterator;
        BenchmarkKey::iter().try_for_each(|key| check_finite(key.as_ref(), self.get(key)))
    }
}

/// Keys of the [`AlertThresholds`] record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdKey {
    SavingsLow,
    SavingsHigh,
    SpendingLow,
    SpendingHigh,
    SpendingRevenueRatio,
    NegativeBalance,
}

/// Alert bounds. Per-inhabitant amounts except the ratio, which is a percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub savings_low: f64,
    pub savings_high: f64,
    pub spending_low: f64,
    pub spending_high: f64,
    pub spending_revenue_ratio: f64,
    pub negative_balance: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            savings_low: -100.0,
            savings_high: 300.0,
            spending_low: 800.0,
            spending_high: 2000.0,
            spending_revenue_ratio: 100.0,
            negative_balance: -50.0,
        }
    }
}

impl AlertThresholds {
    pub const fn get(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::SavingsLow => self.savings_low,
            ThresholdKey::SavingsHigh => self.savings_high,
            ThresholdKey::SpendingLow => self.spending_low,
            ThresholdKey::SpendingHigh => self.spending_high,
            ThresholdKey::SpendingRevenueRatio => self.spending_revenue_ratio,
            ThresholdKey::NegativeBalance => self.negative_balance,
        }
    }

    pub fn set(&mut self, key: ThresholdKey, value: f64) -> Result<()> {
        check_finite(key.as_ref(), value)?;
        let slot = match key {
            ThresholdKey::SavingsLow => &mut self.savings_low,
            ThresholdKey::SavingsHigh => &mut self.savings_high,
            ThresholdKey::SpendingLow => &mut self.spending_low,
            ThresholdKey::SpendingHigh => &mut self.spending_high,
            ThresholdKey::SpendingRevenueRatio => &mut self.spending_revenue_ratio,
            ThresholdKey::NegativeBalance => &mut self.negative_balance,
        };
        *slot = value;
        Ok(())
    }

    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<()> {
        let key: ThresholdKey = parse_named("threshold key", name)?;
        self.set(key, value)
    }

    fn validate(&self) -> Result<()> {
        use strum::IntoEnumIterator;
        ThresholdKey::iter().try_for_each(|key| check_finite(key.as_ref(), self.get(key)))
    }
}

/// Everything a batch of computations reads, owned by the caller.
///
/// Loaded from TOML with optional `[benchmarks]`, `[thresholds]` and
/// `[[zones]]` sections; whatever is absent keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub benchmarks: Benchmarks,
    pub thresholds: AlertThresholds,
    pub zones: ZoneTable,
}

impl AnalysisConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.benchmarks.validate()?;
        config.thresholds.validate()?;
        log::debug!(
            "Loaded analysis config ({} zone(s))",
            config.zones.zones().len()
        );
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Set a benchmark or threshold by key. The key picks the record, so a
    /// rejected value for a known key is reported against that key.
    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<()> {
        let name = name.trim();
        if let Ok(key) = name.parse::<BenchmarkKey>() {
            return self.benchmarks.set(key, value);
        }
        let key: ThresholdKey = parse_named("configuration key", name)?;
        self.thresholds.set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let b = Benchmarks::default();
        assert!((b.get(BenchmarkKey::NationalSavingsPerCapita) - 150.0).abs() < f64::EPSILON);
        assert!((b.get(BenchmarkKey::NationalSpendingRevenueRatio) - 88.9).abs() < f64::EPSILON);
        let t = AlertThresholds::default();
        assert!((t.get(ThresholdKey::SavingsLow) + 100.0).abs() < f64::EPSILON);
        assert!((t.get(ThresholdKey::NegativeBalance) + 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sets_values_by_name() {
        let mut b = Benchmarks::default();
        b.set_by_name("national_revenue_per_capita", 1400.0).unwrap();
        assert!((b.national_revenue_per_capita - 1400.0).abs() < f64::EPSILON);

        let mut t = AlertThresholds::default();
        t.set_by_name(" spending_high ", 2500.0).unwrap();
        assert!((t.spending_high - 2500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_keys_and_non_finite_values() {
        let mut b = Benchmarks::default();
        assert!(matches!(
            b.set_by_name("national_debt", 1.0),
            Err(ReportError::InvalidArgument { .. })
        ));
        assert!(matches!(
            b.set(BenchmarkKey::NationalSavingsRate, f64::NAN),
            Err(ReportError::InvalidArgument { .. })
        ));
        assert_eq!(b, Benchmarks::default());
    }

    #[test]
    fn config_setter_routes_by_key() {
        let mut config = AnalysisConfig::default();
        config.set_by_name("national_savings_per_capita", 175.0).unwrap();
        config.set_by_name("negative_balance", -60.0).unwrap();
        assert!((config.benchmarks.national_savings_per_capita - 175.0).abs() < f64::EPSILON);
        assert!((config.thresholds.negative_balance + 60.0).abs() < f64::EPSILON);

        let err = config
            .set_by_name("national_savings_per_capita", f64::NAN)
            .unwrap_err();
        assert!(err.to_string().contains("national_savings_per_capita must be a finite number"));
        assert!((config.benchmarks.national_savings_per_capita - 175.0).abs() < f64::EPSILON);

        assert!(matches!(
            config.set_by_name("national_debt", 1.0),
            Err(ReportError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [thresholds]
            savings_low = -80.0

            [[zones]]
            name = "Nord"
            communes = ["Saint-Denis", "Sainte-Marie"]
            "#,
        )
        .unwrap();
        assert!((config.thresholds.savings_low + 80.0).abs() < f64::EPSILON);
        assert!((config.thresholds.savings_high - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.benchmarks, Benchmarks::default());
        assert_eq!(config.zones.zone_of("SAINTE-MARIE"), Some("Nord"));
        assert_eq!(config.zones.zone_of("SAINT-PIERRE"), None);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(AnalysisConfig::from_toml_str("").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn non_finite_toml_values_are_rejected() {
        let err = AnalysisConfig::from_toml_str("[benchmarks]\nnational_savings_rate = nan\n")
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidArgument { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AnalysisConfig::from_toml_str("[benchmarks\n").unwrap_err();
        assert!(matches!(err, ReportError::Toml(_)));
    }
}
