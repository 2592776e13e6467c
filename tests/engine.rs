use communes_report::reports::{text_report, zone_statistics};
use communes_report::types::GroupKey;
use communes_report::{
    aggregate, analyze_trends, compare_to_benchmarks, normalize, scan_alerts, AggregateQuery,
    AnalysisConfig, ComparisonReport, DatasetFilter, RawRow, ReportError, Severity,
};

const HEADERS: [&str; 8] = [
    "Exercice",
    "Code Insee 2024 Département",
    "Nom 2024 Commune",
    "Type de budget",
    "Agrégat",
    "Montant",
    "Montant en € par habitant",
    "Population totale",
];

fn row(values: [&str; 8]) -> RawRow {
    HEADERS.into_iter().zip(values).collect()
}

fn dataset() -> Vec<RawRow> {
    vec![
        row(["2016", "974", "Saint-Denis", "Budget principal", "Epargne brute", "15 000 000", "100", "150000"]),
        row(["2017", "974", "Saint-Denis", "Budget principal", "Epargne brute", "18 000 000", "120", "150000"]),
        row(["2017", "974", "Saint-Denis", "Budget principal", "Recettes totales hors emprunts", "210 000 000", "1400", "150000"]),
        row(["2017", "974", "Salazie", "Budget principal", "Epargne brute", "-1 125 000", "-150", "7500"]),
        row(["2017", "974", "Salazie", "Budget principal", "Recettes totales hors emprunts", "9 000 000", "1200", "7500"]),
        row(["2017", "974", "Salazie", "Budget annexe", "Epargne brute", "10 000", "1,3", "7500"]),
        row(["2017", "971", "Basse-Terre", "Budget principal", "Epargne brute", "1", "9999", "10000"]),
        row(["2017", "974", "", "Budget principal", "Epargne brute", "1", "1", "1"]),
    ]
}

#[test]
fn raw_rows_flow_through_every_analysis() {
    let all = normalize(&dataset(), "974").unwrap();
    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|r| r.commune != "BASSE-TERRE"));

    let config = AnalysisConfig::default();
    let year = DatasetFilter::default().with_year(2017).apply(&all);

    let query = AggregateQuery::parse("commune", "Gross savings", "main", "mean").unwrap();
    let per_commune = aggregate(&year, &config.zones, &query);
    assert_eq!(per_commune.len(), 2);
    assert_eq!(per_commune[0].key, GroupKey::Commune("SAINT-DENIS".into()));
    assert_eq!(per_commune[1].value, Some(-150.0));

    let alerts = scan_alerts(&year, &config.thresholds);
    let danger: Vec<&str> = alerts
        .iter()
        .filter(|a| a.severity == Severity::Danger)
        .map(|a| a.commune.as_str())
        .collect();
    assert!(danger.contains(&"SALAZIE"));
    assert!(!danger.contains(&"SAINT-DENIS"));

    let ComparisonReport::Complete(comparison) = compare_to_benchmarks(&year, &config.benchmarks)
    else {
        panic!("expected a complete comparison");
    };
    assert!((comparison.local.savings_per_capita + 15.0).abs() < 1e-9);
    assert!((comparison.local.revenue_per_capita - 1300.0).abs() < 1e-9);
    let summary = comparison.summary.as_ref().unwrap();
    assert_eq!(summary.above_count, 0);
    assert_eq!(summary.best.commune, "SAINT-DENIS");
    assert_eq!(summary.worst.commune, "SALAZIE");

    let trends = analyze_trends(&all);
    assert_eq!(trends.len(), 2);
    let change = trends[1].change.unwrap();
    assert!((change.savings_pct.unwrap() - (-15.0 - 100.0) / 100.0 * 100.0).abs() < 1e-9);

    let zones = zone_statistics(&year, &config.zones);
    let names: Vec<&str> = zones.iter().map(|z| z.zone.as_str()).collect();
    assert_eq!(names, vec!["Nord", "Cirques"]);

    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let text = text_report("Report", date, &year, &ComparisonReport::Complete(comparison), &alerts);
    assert!(text.contains("Date: 30/06/2024"));
    assert!(text.contains("SALAZIE"));
}

#[test]
fn configuration_changes_flow_into_alerts() {
    let all = normalize(&dataset(), "974").unwrap();
    let config = AnalysisConfig::from_toml_str(
        "[thresholds]\nsavings_low = -200.0\nspending_revenue_ratio = 150.0\n",
    )
    .unwrap();
    let alerts = scan_alerts(&all, &config.thresholds);
    assert!(alerts.iter().all(|a| a.commune != "SALAZIE"));
}

#[test]
fn structural_faults_are_invalid_arguments() {
    let bad = vec![row(["2017", "974", "Cilaos", "Budget consolidé", "Epargne brute", "1", "1", "1"])];
    assert!(matches!(
        normalize(&bad, "974"),
        Err(ReportError::InvalidArgument { .. })
    ));
    assert!(matches!(
        AggregateQuery::parse("region", "Gross savings", "main", "mean"),
        Err(ReportError::InvalidArgument { .. })
    ));
}
