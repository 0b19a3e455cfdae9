use std::io::Write;
use std::path::Path;

use deckhand_core::{DeckEntry, DeckRecord};

use crate::{ExportError, ExportFormat};

/// Delimiter used to join the founders list in the CSV column.
pub const FOUNDERS_DELIMITER: &str = "; ";

/// Fixed CSV column order. The market sub-object is flattened into the
/// TAM/SAM/SOM columns; no record field is omitted.
const CSV_HEADER: &str = "StartupName,FoundingYear,Founders,Industry,Niche,USP,FundingStage,CurrentRevenue,TAM,SAM,SOM,AmountRaised";

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_row(record: &DeckRecord) -> String {
    let founders = record.founders.join(FOUNDERS_DELIMITER);
    [
        csv_escape(&record.startup_name),
        csv_escape(record.founding_year.as_deref().unwrap_or("")),
        csv_escape(&founders),
        csv_escape(&record.industry),
        csv_escape(&record.niche),
        csv_escape(&record.usp),
        csv_escape(&record.funding_stage),
        csv_escape(&record.current_revenue),
        csv_escape(record.market.tam.as_deref().unwrap_or("")),
        csv_escape(record.market.sam.as_deref().unwrap_or("")),
        csv_escape(record.market.som.as_deref().unwrap_or("")),
        csv_escape(&record.amount_raised),
    ]
    .join(",")
}

/// Render all entries as CSV, one row per document in store order.
///
/// Failed entries keep their row: their record is empty, which renders as a
/// visibly blank line for that deck rather than a missing one.
pub fn export_csv(entries: &[DeckEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&csv_row(&entry.record));
        out.push('\n');
    }
    out
}

/// Render all entries as a JSON array of records, preserving the nested
/// market object.
pub fn export_json(entries: &[DeckEntry]) -> Result<String, ExportError> {
    let records: Vec<&DeckRecord> = entries.iter().map(|e| &e.record).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Write the export to a file in the requested format.
pub fn export_to_path(
    entries: &[DeckEntry],
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    let content = match format {
        ExportFormat::Csv => export_csv(entries),
        ExportFormat::Json => export_json(entries)?,
    };
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
