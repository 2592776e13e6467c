use crate::config::BenchmarkKey;
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};
use tabled::Tabled;

/// Parse a closed-vocabulary name, turning an unknown one into
/// [`ReportError::InvalidArgument`].
pub fn parse_named<T: FromStr>(kind: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ReportError::invalid(format!("unrecognized {kind}: {raw:?}")))
}

/// One already-parsed source row: raw column name -> raw text value, in
/// column order. Where a column repeats, the first occurrence wins on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum BudgetType {
    #[strum(to_string = "MainBudget", serialize = "Budget principal", serialize = "main")]
    MainBudget,
    #[strum(to_string = "AnnexBudget", serialize = "Budget annexe", serialize = "annex")]
    AnnexBudget,
}

impl BudgetType {
    /// Map a source budget-type tag. Unknown tags are a structural fault.
    pub fn from_tag(tag: &str) -> Result<Self> {
        parse_named("budget type", tag)
    }
}

/// Aggregate financial indicator carried by a row.
///
/// The four named variants are the ones the engine computes with; any other
/// aggregate label found in the data is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Indicator {
    GrossSavings,
    TotalRevenue,
    TotalSpending,
    FinancingCapacity,
    Other(String),
}

impl Indicator {
    pub const KNOWN: [Self; 4] = [
        Self::GrossSavings,
        Self::TotalRevenue,
        Self::TotalSpending,
        Self::FinancingCapacity,
    ];

    /// Label used by the source dataset (`Agrégat` column).
    pub fn source_label(&self) -> &str {
        match self {
            Self::GrossSavings => "Epargne brute",
            Self::TotalRevenue => "Recettes totales hors emprunts",
            Self::TotalSpending => "Dépenses totales hors emprunts",
            Self::FinancingCapacity => "Capacité ou besoin de financement",
            Self::Other(label) => label,
        }
    }

    pub fn display_label(&self) -> &str {
        match self {
            Self::GrossSavings => "Gross savings",
            Self::TotalRevenue => "Total revenue excluding loans",
            Self::TotalSpending => "Total spending excluding loans",
            Self::FinancingCapacity => "Financing capacity/need",
            Self::Other(label) => label,
        }
    }

    /// Unit of the absolute amount; per-capita figures are this per inhabitant.
    pub const fn unit(&self) -> &'static str {
        "€"
    }

    const fn variant_name(&self) -> &'static str {
        match self {
            Self::GrossSavings => "GrossSavings",
            Self::TotalRevenue => "TotalRevenue",
            Self::TotalSpending => "TotalSpending",
            Self::FinancingCapacity => "FinancingCapacity",
            Self::Other(_) => "Other",
        }
    }

    /// Lenient mapping used for data rows: unknown labels become `Other`.
    pub fn from_source_label(label: &str) -> Self {
        let label = crate::util::normalize_text(label);
        Self::KNOWN
            .into_iter()
            .find(|known| known.source_label().to_lowercase() == label.to_lowercase())
            .unwrap_or_else(|| Self::Other(label))
    }

    /// Strict mapping used for queries: the name must denote one of the
    /// known indicators (source label, display label or variant name).
    pub fn from_query(name: &str) -> Result<Self> {
        let wanted = crate::util::normalize_text(name).to_lowercase();
        Self::KNOWN
            .into_iter()
            .find(|known| {
                [known.source_label(), known.display_label(), known.variant_name()]
                    .iter()
                    .any(|candidate| candidate.to_lowercase() == wanted)
            })
            .ok_or_else(|| ReportError::invalid(format!("unrecognized indicator: {name:?}")))
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl FromStr for Indicator {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_query(s)
    }
}

impl From<String> for Indicator {
    fn from(label: String) -> Self {
        Self::from_source_label(&label)
    }
}

impl From<Indicator> for String {
    fn from(indicator: Indicator) -> Self {
        indicator.source_label().to_string()
    }
}

/// Yes/no commune characteristics from the source. `None` when the source
/// did not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommuneTraits {
    pub rural: Option<bool>,
    pub mountain: Option<bool>,
    pub touristic: Option<bool>,
    /// Presence of a priority urban district (QPV).
    pub priority_district: Option<bool>,
}

/// One normalized budget row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub year: i32,
    /// Canonical upper-case commune name.
    pub commune: String,
    pub commune_code: Option<String>,
    /// Intercommunal group (EPCI) name.
    pub group: Option<String>,
    pub budget_type: BudgetType,
    /// Free-text budget label, used to classify annex budgets.
    pub budget_label: Option<String>,
    pub indicator: Indicator,
    pub amount: Option<f64>,
    pub per_capita: Option<f64>,
    pub population: Option<u64>,
    pub traits: CommuneTraits,
}

impl BudgetRecord {
    pub fn new(year: i32, commune: &str, budget_type: BudgetType, indicator: Indicator) -> Self {
        Self {
            year,
            commune: crate::util::canonical_commune(commune),
            commune_code: None,
            group: None,
            budget_type,
            budget_label: None,
            indicator,
            amount: None,
            per_capita: None,
            population: None,
            traits: CommuneTraits::default(),
        }
    }

    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn with_per_capita(mut self, per_capita: f64) -> Self {
        self.per_capita = Some(per_capita);
        self
    }

    #[must_use]
    pub fn with_population(mut self, population: u64) -> Self {
        self.population = Some(population);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    #[must_use]
    pub fn with_budget_label(mut self, label: &str) -> Self {
        self.budget_label = Some(label.to_string());
        self
    }

    pub fn is_main(&self) -> bool {
        self.budget_type == BudgetType::MainBudget
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum GroupBy {
    Commune,
    Zone,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Metric {
    /// Total of absolute amounts.
    Sum,
    /// Mean of per-capita amounts over rows where one is present.
    Mean,
    /// Same computation as `Mean`.
    #[strum(to_string = "PerCapitaMean", serialize = "per_capita_mean")]
    PerCapitaMean,
}

/// What to aggregate and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    pub group_by: GroupBy,
    pub indicator: Indicator,
    pub budget_type: BudgetType,
    pub metric: Metric,
}

impl AggregateQuery {
    pub const fn new(
        group_by: GroupBy,
        indicator: Indicator,
        budget_type: BudgetType,
        metric: Metric,
    ) -> Self {
        Self {
            group_by,
            indicator,
            budget_type,
            metric,
        }
    }

    /// Build a query from caller-supplied names. Any unknown name is an
    /// [`ReportError::InvalidArgument`].
    pub fn parse(group_by: &str, indicator: &str, budget_type: &str, metric: &str) -> Result<Self> {
        Ok(Self {
            group_by: parse_named("grouping key", group_by)?,
            indicator: Indicator::from_query(indicator)?,
            budget_type: BudgetType::from_tag(budget_type)?,
            metric: parse_named("metric", metric)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKey {
    Commune(String),
    Zone(String),
    Year(i32),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commune(name) | Self::Zone(name) => f.write_str(name),
            Self::Year(year) => write!(f, "{year}"),
        }
    }
}

/// One group's aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorAggregate {
    pub key: GroupKey,
    pub indicator: Indicator,
    /// `None` when no row in the group carried a usable value.
    pub value: Option<f64>,
    /// Sum of the known populations of the participating rows.
    pub population: u64,
    /// Rows that matched the filter and landed in this group.
    pub row_count: usize,
    /// Rows that actually contributed to `value`.
    pub value_count: usize,
    pub commune_count: usize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
pub enum Severity {
    Positive,
    Warning,
    Danger,
}

/// What an alert rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum AlertSubject {
    #[strum(to_string = "Gross savings")]
    GrossSavings,
    #[strum(to_string = "Spending per inhabitant")]
    SpendingPerCapita,
    #[strum(to_string = "Spending/revenue ratio")]
    SpendingRevenueRatio,
    #[strum(to_string = "Financing capacity/need")]
    FinancingCapacity,
}

impl AlertSubject {
    pub const fn unit(self) -> &'static str {
        match self {
            Self::SpendingRevenueRatio => "%",
            _ => "€/inhabitant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub commune: String,
    pub year: i32,
    pub subject: AlertSubject,
    pub message: String,
    pub value: f64,
}

/// How a local figure sits against its benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Assessment {
    Favourable,
    Unfavourable,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Position {
    Above,
    Below,
}

/// Local mean figures the comparison is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFigures {
    pub savings_per_capita: f64,
    pub revenue_per_capita: f64,
    pub spending_per_capita: f64,
    pub savings_rate: f64,
    pub spending_revenue_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDelta {
    pub key: BenchmarkKey,
    pub local: f64,
    pub benchmark: f64,
    /// `local - benchmark`.
    pub delta: f64,
    pub assessment: Assessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommuneComparison {
    pub commune: String,
    pub year: i32,
    pub savings_per_capita: f64,
    pub revenue_per_capita: f64,
    pub spending_per_capita: f64,
    pub savings_rate: f64,
    pub delta_vs_national: f64,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    pub commune: String,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub above_count: usize,
    pub total: usize,
    pub above_pct: f64,
    pub best: Performer,
    pub worst: Performer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub local: LocalFigures,
    pub deltas: Vec<IndicatorDelta>,
    pub communes: Vec<CommuneComparison>,
    /// Absent when no commune qualified for the per-commune comparison.
    pub summary: Option<ComparisonSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComparisonReport {
    /// The savings or revenue group was empty.
    InsufficientData,
    Complete(BenchmarkComparison),
}

impl ComparisonReport {
    pub const fn comparison(&self) -> Option<&BenchmarkComparison> {
        match self {
            Self::InsufficientData => None,
            Self::Complete(c) => Some(c),
        }
    }
}

/// Percentage change against the previous year in the series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodChange {
    pub savings_pct: Option<f64>,
    pub revenue_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyIndicatorSet {
    pub year: i32,
    pub savings_per_capita: Option<f64>,
    pub revenue_per_capita: Option<f64>,
    pub financing_per_capita: Option<f64>,
    pub commune_count: usize,
    /// Only present when the series spans at least two years.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub change: Option<PeriodChange>,
}

// Rendered report rows. Numbers are pre-formatted strings, as in the CSV
// exports and Markdown previews.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ZoneSummaryRow {
    #[serde(rename = "Zone")]
    #[tabled(rename = "Zone")]
    pub zone: String,
    #[serde(rename = "NumCommunes")]
    #[tabled(rename = "NumCommunes")]
    pub num_communes: usize,
    #[serde(rename = "TotalPopulation")]
    #[tabled(rename = "TotalPopulation")]
    pub total_population: String,
    #[serde(rename = "AvgSavingsPerCapita")]
    #[tabled(rename = "AvgSavingsPerCapita")]
    pub avg_savings_per_capita: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BenchmarkRow {
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Local")]
    #[tabled(rename = "Local")]
    pub local: String,
    #[serde(rename = "Benchmark")]
    #[tabled(rename = "Benchmark")]
    pub benchmark: String,
    #[serde(rename = "Delta")]
    #[tabled(rename = "Delta")]
    pub delta: String,
    #[serde(rename = "Assessment")]
    #[tabled(rename = "Assessment")]
    pub assessment: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CommuneBenchmarkRow {
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "SavingsPerCapita")]
    #[tabled(rename = "SavingsPerCapita")]
    pub savings_per_capita: String,
    #[serde(rename = "RevenuePerCapita")]
    #[tabled(rename = "RevenuePerCapita")]
    pub revenue_per_capita: String,
    #[serde(rename = "SpendingPerCapita")]
    #[tabled(rename = "SpendingPerCapita")]
    pub spending_per_capita: String,
    #[serde(rename = "SavingsRate")]
    #[tabled(rename = "SavingsRate")]
    pub savings_rate: String,
    #[serde(rename = "DeltaVsNational")]
    #[tabled(rename = "DeltaVsNational")]
    pub delta_vs_national: String,
    #[serde(rename = "Position")]
    #[tabled(rename = "Position")]
    pub position: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TrendRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "SavingsPerCapita")]
    #[tabled(rename = "SavingsPerCapita")]
    pub savings_per_capita: String,
    #[serde(rename = "RevenuePerCapita")]
    #[tabled(rename = "RevenuePerCapita")]
    pub revenue_per_capita: String,
    #[serde(rename = "FinancingPerCapita")]
    #[tabled(rename = "FinancingPerCapita")]
    pub financing_per_capita: String,
    #[serde(rename = "NumCommunes")]
    #[tabled(rename = "NumCommunes")]
    pub num_communes: usize,
    #[serde(rename = "SavingsChange")]
    #[tabled(rename = "SavingsChange")]
    pub savings_change: String,
    #[serde(rename = "RevenueChange")]
    #[tabled(rename = "RevenueChange")]
    pub revenue_change: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AlertRow {
    #[serde(rename = "Severity")]
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Indicator")]
    #[tabled(rename = "Indicator")]
    pub indicator: String,
    #[serde(rename = "Message")]
    #[tabled(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MapMarkerRow {
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "Latitude")]
    #[tabled(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    #[tabled(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "SavingsPerCapita")]
    #[tabled(rename = "SavingsPerCapita")]
    pub savings_per_capita: String,
    #[serde(rename = "Population")]
    #[tabled(rename = "Population")]
    pub population: String,
    #[serde(rename = "TotalSavings")]
    #[tabled(rename = "TotalSavings")]
    pub total_savings: String,
    #[serde(rename = "Band")]
    #[tabled(rename = "Band")]
    pub band: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ServiceCountRow {
    #[serde(rename = "Service")]
    #[tabled(rename = "Service")]
    pub service: String,
    #[serde(rename = "Budgets")]
    #[tabled(rename = "Budgets")]
    pub budgets: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FinancingRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Commune")]
    #[tabled(rename = "Commune")]
    pub commune: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "FinancingPerCapita")]
    #[tabled(rename = "FinancingPerCapita")]
    pub financing_per_capita: String,
}

/// Flat export of a normalized record.
#[derive(Debug, Serialize, Clone)]
pub struct RecordExportRow {
    pub year: i32,
    pub commune: String,
    pub commune_code: Option<String>,
    pub group: Option<String>,
    pub budget_type: String,
    pub budget_label: Option<String>,
    pub indicator: String,
    pub amount: Option<f64>,
    pub per_capita: Option<f64>,
    pub population: Option<u64>,
}

impl From<&BudgetRecord> for RecordExportRow {
    fn from(r: &BudgetRecord) -> Self {
        Self {
            year: r.year,
            commune: r.commune.clone(),
            commune_code: r.commune_code.clone(),
            group: r.group.clone(),
            budget_type: r.budget_type.to_string(),
            budget_label: r.budget_label.clone(),
            indicator: r.indicator.source_label().to_string(),
            amount: r.amount,
            per_capita: r.per_capita,
            population: r.population,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KpiSummary {
    pub total_savings: f64,
    pub commune_count: usize,
    pub total_population: u64,
    pub total_revenue: f64,
}
