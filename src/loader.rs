use communes_report::types::RawRow;
use communes_report::Result;
use csv::ReaderBuilder;
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
    /// The file was not UTF-8 and was decoded as Windows-1252.
    pub legacy_encoding: bool,
}

/// Decode the file as UTF-8, dropping a leading BOM. Exports that are not
/// valid UTF-8 are decoded as Windows-1252, which keeps `€` (0x80) intact.
fn decode(bytes: &[u8]) -> (String, bool) {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return (text.into_owned(), false);
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text.into_owned(), true)
}

/// Read a `;`-separated export into raw rows keyed by header.
pub fn read_rows(text: &str) -> Result<(Vec<RawRow>, usize)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows: Vec<RawRow> = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::debug!("Skipping unreadable line: {e}");
                parse_errors += 1;
                continue;
            }
        };
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect(),
        );
    }
    Ok((rows, parse_errors))
}

pub fn load_rows(path: &Path) -> Result<(Vec<RawRow>, LoadReport)> {
    let bytes = std::fs::read(path)?;
    let (text, legacy_encoding) = decode(&bytes);
    if legacy_encoding {
        log::warn!("{} is not valid UTF-8, decoded as Windows-1252", path.display());
    }
    let (rows, parse_errors) = read_rows(&text)?;
    let report = LoadReport {
        total_rows: rows.len() + parse_errors,
        parse_errors,
        legacy_encoding,
    };
    log::info!(
        "Read {} row(s) from {} ({} unreadable)",
        report.total_rows,
        path.display(),
        parse_errors
    );
    Ok((rows, report))
}
