//! Threshold alerts over per-commune indicator values.
//!
//! Every rule goes through the same classifier and the same severity policy:
//! strictly below a rule's low bound is `Danger`, strictly above its high
//! bound is `Positive`, anything in between yields nothing.

use crate::config::{AlertThresholds, ThresholdKey};
use crate::types::{AlertRecord, AlertSubject, BudgetRecord, Indicator, Severity};
use crate::util::{format_number, safe_ratio};
use std::collections::HashMap;

/// One side of a rule: the threshold it reads and the message prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub key: ThresholdKey,
    pub text: &'static str,
}

/// Bounds applied to one subject. A side set to `None` never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRule {
    pub subject: AlertSubject,
    pub low: Option<Bound>,
    pub high: Option<Bound>,
}

pub const DEFAULT_RULES: [AlertRule; 4] = [
    AlertRule {
        subject: AlertSubject::GrossSavings,
        low: Some(Bound {
            key: ThresholdKey::SavingsLow,
            text: "Very low gross savings",
        }),
        high: Some(Bound {
            key: ThresholdKey::SavingsHigh,
            text: "Exceptional gross savings",
        }),
    },
    AlertRule {
        subject: AlertSubject::SpendingPerCapita,
        low: Some(Bound {
            key: ThresholdKey::SpendingLow,
            text: "Very low spending",
        }),
        high: Some(Bound {
            key: ThresholdKey::SpendingHigh,
            text: "Very high spending",
        }),
    },
    AlertRule {
        subject: AlertSubject::SpendingRevenueRatio,
        low: None,
        high: Some(Bound {
            key: ThresholdKey::SpendingRevenueRatio,
            text: "Spending/revenue ratio above bound",
        }),
    },
    AlertRule {
        subject: AlertSubject::FinancingCapacity,
        low: Some(Bound {
            key: ThresholdKey::NegativeBalance,
            text: "Heavy financing need",
        }),
        high: None,
    },
];

impl AlertRule {
    /// Classify `value` against this rule's bounds.
    pub fn classify(&self, value: f64, thresholds: &AlertThresholds) -> Option<(Severity, &'static str)> {
        if let Some(low) = self.low {
            if value < thresholds.get(low.key) {
                return Some((Severity::Danger, low.text));
            }
        }
        if let Some(high) = self.high {
            if value > thresholds.get(high.key) {
                return Some((Severity::Positive, high.text));
            }
        }
        None
    }
}

fn render(text: &str, subject: AlertSubject, value: f64) -> String {
    let decimals = if subject == AlertSubject::SpendingRevenueRatio { 1 } else { 0 };
    format!("{text}: {} {}", format_number(value, decimals), subject.unit())
}

/// Scan with [`DEFAULT_RULES`].
pub fn scan_alerts(records: &[BudgetRecord], thresholds: &AlertThresholds) -> Vec<AlertRecord> {
    scan_alerts_with(records, thresholds, &DEFAULT_RULES)
}

/// Scan main-budget rows in input order.
///
/// Savings rows feed the savings subject directly and, when the same commune
/// has a positive revenue per inhabitant for that year, the derived spending
/// and spending/revenue subjects. Financing capacity rows feed the balance
/// subject. Rows without a per-capita value are skipped.
pub fn scan_alerts_with(
    records: &[BudgetRecord],
    thresholds: &AlertThresholds,
    rules: &[AlertRule],
) -> Vec<AlertRecord> {
    let mut revenue: HashMap<(&str, i32), Option<f64>> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| r.is_main() && r.indicator == Indicator::TotalRevenue)
    {
        revenue.entry((r.commune.as_str(), r.year)).or_insert(r.per_capita);
    }

    let mut alerts = Vec::new();
    for r in records.iter().filter(|r| r.is_main()) {
        let Some(v) = r.per_capita else {
            continue;
        };
        let mut subjects: Vec<(AlertSubject, f64)> = Vec::with_capacity(3);
        match r.indicator {
            Indicator::GrossSavings => {
                subjects.push((AlertSubject::GrossSavings, v));
                if let Some(&Some(rev)) = revenue.get(&(r.commune.as_str(), r.year)) {
                    if rev > 0.0 {
                        let spending = rev - v;
                        subjects.push((AlertSubject::SpendingPerCapita, spending));
                        subjects.push((
                            AlertSubject::SpendingRevenueRatio,
                            safe_ratio(spending, rev) * 100.0,
                        ));
                    }
                }
            }
            Indicator::FinancingCapacity => subjects.push((AlertSubject::FinancingCapacity, v)),
            _ => continue,
        }

        for rule in rules {
            let Some(&(subject, value)) = subjects.iter().find(|(s, _)| *s == rule.subject) else {
                continue;
            };
            if let Some((severity, text)) = rule.classify(value, thresholds) {
                alerts.push(AlertRecord {
                    severity,
                    commune: r.commune.clone(),
                    year: r.year,
                    subject,
                    message: render(text, subject, value),
                    value,
                });
            }
        }
    }

    log::debug!("Alert scan produced {} alert(s)", alerts.len());
    alerts
}
