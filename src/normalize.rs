//! Dataset normalizer: raw source rows to [`BudgetRecord`]s.
//!
//! Column names are resolved through a fixed mapping table that knows the
//! current OFGL export headers, the older underscore-style names and the
//! canonical snake-case names, so already-normalized data passes through.

use crate::error::{ReportError, Result};
use crate::types::{BudgetRecord, BudgetType, CommuneTraits, Indicator, RawRow};
use crate::util::{
    canonical_commune, normalize_text, parse_f64_safe, parse_flag, parse_i32_safe, parse_u64_safe,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Year,
    Department,
    Group,
    Commune,
    CommuneCode,
    BudgetLabel,
    BudgetType,
    Indicator,
    Amount,
    PerCapita,
    Population,
    Rural,
    Mountain,
    Touristic,
    PriorityDistrict,
}

const COLUMN_MAPPING: &[(&str, Field)] = &[
    // Source export headers.
    ("Exercice", Field::Year),
    ("Code Insee 2024 Département", Field::Department),
    ("Nom 2024 EPCI", Field::Group),
    ("Nom 2024 Commune", Field::Commune),
    ("Code Insee 2024 Commune", Field::CommuneCode),
    ("Libellé Budget", Field::BudgetLabel),
    ("Type de budget", Field::BudgetType),
    ("Agrégat", Field::Indicator),
    ("Montant", Field::Amount),
    ("Montant en € par habitant", Field::PerCapita),
    ("Population totale", Field::Population),
    ("Commune rurale", Field::Rural),
    ("Commune de montagne", Field::Mountain),
    ("Commune touristique", Field::Touristic),
    ("Présence QPV", Field::PriorityDistrict),
    // Legacy underscore names.
    ("Code_Departement", Field::Department),
    ("Nom_EPCI", Field::Group),
    ("Commune", Field::Commune),
    ("Code_Commune", Field::CommuneCode),
    ("Libelle_Budget", Field::BudgetLabel),
    ("Type_budget", Field::BudgetType),
    ("Agregat", Field::Indicator),
    ("Montant_par_habitant", Field::PerCapita),
    ("Population", Field::Population),
    ("Commune_rurale", Field::Rural),
    ("Commune_montagne", Field::Mountain),
    ("Commune_touristique", Field::Touristic),
    ("Presence_QPV", Field::PriorityDistrict),
    // Canonical names.
    ("year", Field::Year),
    ("department_code", Field::Department),
    ("group", Field::Group),
    ("commune", Field::Commune),
    ("commune_code", Field::CommuneCode),
    ("budget_label", Field::BudgetLabel),
    ("budget_type", Field::BudgetType),
    ("indicator", Field::Indicator),
    ("amount", Field::Amount),
    ("per_capita", Field::PerCapita),
    ("population", Field::Population),
    ("rural", Field::Rural),
    ("mountain", Field::Mountain),
    ("touristic", Field::Touristic),
    ("priority_district", Field::PriorityDistrict),
];

fn field_for(column: &str) -> Option<Field> {
    let column = column.trim().trim_start_matches('\u{feff}');
    COLUMN_MAPPING
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, field)| *field)
}

/// Row counts gathered while normalizing, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub out_of_jurisdiction: usize,
    /// Rows without a year, commune, indicator or budget type.
    pub incomplete_rows: usize,
}

/// Department codes compare numerically when both sides are numbers, so
/// `974`, `974.0` and ` 974 ` all match.
fn same_code(raw: &str, target: &str) -> bool {
    let (raw, target) = (raw.trim(), target.trim());
    match (parse_f64_safe(Some(raw)), parse_f64_safe(Some(target))) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => raw.eq_ignore_ascii_case(target),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(normalize_text)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

/// Normalize `rows`, keeping only those of `jurisdiction_code`.
///
/// # Errors
///
/// Returns [`ReportError::InvalidArgument`] if an in-jurisdiction row carries
/// a budget-type tag that is neither a main nor an annex budget.
pub fn normalize(rows: &[RawRow], jurisdiction_code: &str) -> Result<Vec<BudgetRecord>> {
    normalize_with_report(rows, jurisdiction_code).map(|(records, _)| records)
}

/// [`normalize`], also returning row counts.
///
/// # Errors
///
/// See [`normalize`].
pub fn normalize_with_report(
    rows: &[RawRow],
    jurisdiction_code: &str,
) -> Result<(Vec<BudgetRecord>, NormalizeReport)> {
    let mut report = NormalizeReport {
        total_rows: rows.len(),
        ..NormalizeReport::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let mut fields: HashMap<Field, &str> = HashMap::new();
        for (column, value) in row.iter() {
            if let Some(field) = field_for(column) {
                fields.entry(field).or_insert(value);
            }
        }
        let get = |field: Field| fields.get(&field).copied();

        // The jurisdiction filter only applies when the column exists.
        if let Some(code) = get(Field::Department) {
            if !same_code(code, jurisdiction_code) {
                report.out_of_jurisdiction += 1;
                continue;
            }
        }

        let year = parse_i32_safe(get(Field::Year));
        let commune = non_empty(get(Field::Commune));
        let indicator = non_empty(get(Field::Indicator));
        let budget_tag = non_empty(get(Field::BudgetType));
        let (Some(year), Some(commune), Some(indicator), Some(budget_tag)) =
            (year, commune, indicator, budget_tag)
        else {
            log::debug!("Dropping incomplete row #{idx}");
            report.incomplete_rows += 1;
            continue;
        };

        let budget_type = BudgetType::from_tag(&budget_tag).map_err(|_| {
            ReportError::invalid(format!(
                "row #{idx}: unrecognized budget type tag {budget_tag:?}"
            ))
        })?;

        records.push(BudgetRecord {
            year,
            commune: canonical_commune(&commune),
            commune_code: non_empty(get(Field::CommuneCode)),
            group: non_empty(get(Field::Group)),
            budget_type,
            budget_label: non_empty(get(Field::BudgetLabel)),
            indicator: Indicator::from_source_label(&indicator),
            amount: parse_f64_safe(get(Field::Amount)),
            per_capita: parse_f64_safe(get(Field::PerCapita)),
            population: parse_u64_safe(get(Field::Population)),
            traits: CommuneTraits {
                rural: parse_flag(get(Field::Rural)),
                mountain: parse_flag(get(Field::Mountain)),
                touristic: parse_flag(get(Field::Touristic)),
                priority_district: parse_flag(get(Field::PriorityDistrict)),
            },
        });
    }

    report.kept_rows = records.len();
    log::info!(
        "Normalized {} of {} rows ({} outside jurisdiction {jurisdiction_code}, {} incomplete)",
        report.kept_rows,
        report.total_rows,
        report.out_of_jurisdiction,
        report.incomplete_rows
    );
    Ok((records, report))
}
