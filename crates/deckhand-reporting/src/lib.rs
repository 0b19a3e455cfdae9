use thiserror::Error;

pub mod export;

pub use export::{FOUNDERS_DELIMITER, export_csv, export_json, export_to_path};

/// Output format for the aggregated records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}
