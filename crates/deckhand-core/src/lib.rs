use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod insight;
pub mod keyslides;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod rate_limit;
pub mod score;
pub mod store;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use insight::DeckInsight;
pub use keyslides::KeySlides;
pub use llm::{CompletionClient, CompletionError, OpenAiClient};
pub use normalize::record_from_response;
pub use pipeline::{BatchOutcome, ProgressEvent, process_batch, process_deck};
pub use rate_limit::{AdaptiveLimiter, complete_with_retry};
pub use score::{PitchScore, SectionScore};
pub use store::{DeckLibrary, RecordFilter};

/// TAM/SAM/SOM market size estimates as stated in a deck.
///
/// Values are kept verbatim (e.g. `"$95B"`); decks rarely state them in a
/// machine-friendly unit, so no numeric parsing is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSize {
    pub tam: Option<String>,
    pub sam: Option<String>,
    pub som: Option<String>,
}

impl MarketSize {
    pub fn is_empty(&self) -> bool {
        self.tam.is_none() && self.sam.is_none() && self.som.is_none()
    }
}

/// The normalized structured fields for one pitch deck.
///
/// Every field is present after normalization: string fields the model did
/// not produce become `""`, `founding_year` and the market sub-fields become
/// `None`, and `founders` is an empty list rather than null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub startup_name: String,
    pub founding_year: Option<String>,
    pub founders: Vec<String>,
    pub industry: String,
    pub niche: String,
    pub usp: String,
    pub funding_stage: String,
    pub current_revenue: String,
    pub market: MarketSize,
    pub amount_raised: String,
}

/// Per-page text extracted from one deck. Transient: lives between text
/// acquisition and prompt construction, then only the record survives.
#[derive(Debug, Clone)]
pub struct DeckText {
    pub filename: String,
    pub pages: Vec<String>,
}

impl DeckText {
    pub fn from_pages(filename: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            pages,
        }
    }

    /// Render the slide-labeled text blob sent to the model:
    /// `----- Slide 1 -----\n<text>\n\n----- Slide 2 -----\n...`
    pub fn joined(&self) -> String {
        let blocks: Vec<String> = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, text)| format!("----- Slide {} -----\n{}\n", i + 1, text.trim()))
            .collect();
        blocks.join("\n")
    }
}

/// Whether a stored entry carries real extracted data or a failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Extracted,
    Failed,
}

/// One row of the aggregation store: the record plus provenance and the
/// optional scoring/insight payloads.
///
/// Failed documents keep their row (empty record + error reason) so the
/// store always holds one entry per submitted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckEntry {
    /// Document key: the source filename.
    pub key: String,
    pub record: DeckRecord,
    pub status: EntryStatus,
    pub error: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub score: Option<PitchScore>,
    pub insight: Option<DeckInsight>,
    pub key_slides: Option<KeySlides>,
}

impl DeckEntry {
    pub fn extracted(key: impl Into<String>, record: DeckRecord) -> Self {
        Self {
            key: key.into(),
            record,
            status: EntryStatus::Extracted,
            error: None,
            extracted_at: Utc::now(),
            score: None,
            insight: None,
            key_slides: None,
        }
    }

    pub fn failed(key: impl Into<String>, error: &DeckError) -> Self {
        Self {
            key: key.into(),
            record: DeckRecord::default(),
            status: EntryStatus::Failed,
            error: Some(error.to_string()),
            extracted_at: Utc::now(),
            score: None,
            insight: None,
            key_slides: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == EntryStatus::Failed
    }

    /// Preferred one-line summary: the rubric scorer's summary when present,
    /// otherwise the insight pass's.
    pub fn summary(&self) -> Option<&str> {
        self.score
            .as_ref()
            .map(|s| s.summary.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.insight
                    .as_ref()
                    .map(|i| i.summary_insight.as_str())
                    .filter(|s| !s.is_empty())
            })
    }
}

#[derive(Error, Debug)]
pub enum DeckError {
    /// The input bytes are not a readable PDF. Fatal for that document only.
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),
    /// Transient remote failure that survived the retry schedule.
    /// Fatal for the document this run; eligible for manual retry.
    #[error("extraction endpoint unavailable after {attempts} attempts: {message}")]
    ExtractionUnavailable { attempts: u32, message: String },
    /// Credentials rejected. Fatal for the whole run.
    #[error("extraction endpoint rejected credentials: {0}")]
    ExtractionAuth(String),
    /// Quota or billing exhausted. Fatal for the whole run.
    #[error("extraction quota exhausted: {0}")]
    ExtractionQuota(String),
    /// The response could not be parsed into the record schema, even after
    /// the recovery pass. The entry is kept with a failure marker.
    #[error("malformed extraction response: {0}")]
    MalformedExtraction(String),
}

impl DeckError {
    /// Run-fatal errors stop the whole batch; everything else only fails
    /// the document it occurred on.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            DeckError::ExtractionAuth(_) | DeckError::ExtractionQuota(_)
        )
    }
}

impl From<BackendError> for DeckError {
    fn from(e: BackendError) -> Self {
        DeckError::UnreadableDocument(e.to_string())
    }
}

/// Configuration for the extraction pipeline.
#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API, without a trailing slash.
    pub api_base: String,
    /// Model used for field extraction and the insight pass.
    pub model: String,
    /// Model used for the rubric scoring pass.
    pub scoring_model: String,
    pub max_tokens: u32,
    /// Budget for the deck text portion of the prompt, in characters.
    /// Longer decks are truncated head+tail with an explicit marker.
    pub max_prompt_chars: usize,
    pub request_timeout_secs: u64,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    pub requests_per_minute: u32,
    pub num_workers: usize,
    pub with_scoring: bool,
    pub with_insights: bool,
    pub with_key_slides: bool,
    pub limiter: Arc<AdaptiveLimiter>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("scoring_model", &self.scoring_model)
            .field("max_tokens", &self.max_tokens)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("num_workers", &self.num_workers)
            .field("with_scoring", &self.with_scoring)
            .field("with_insights", &self.with_insights)
            .field("with_key_slides", &self.with_key_slides)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            scoring_model: "gpt-4o".to_string(),
            max_tokens: 800,
            max_prompt_chars: 16_000,
            request_timeout_secs: 60,
            max_retries: 3,
            requests_per_minute: 20,
            num_workers: 2,
            with_scoring: false,
            with_insights: false,
            with_key_slides: false,
            limiter: Arc::new(AdaptiveLimiter::per_minute(20)),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_labels_slides_in_page_order() {
        let text = DeckText::from_pages(
            "deck.pdf",
            vec!["Yabscore".into(), "".into(), "Team:\nIK Ezekwelu".into()],
        );
        let joined = text.joined();
        let s1 = joined.find("----- Slide 1 -----").unwrap();
        let s2 = joined.find("----- Slide 2 -----").unwrap();
        let s3 = joined.find("----- Slide 3 -----").unwrap();
        assert!(s1 < s2 && s2 < s3);
        assert!(joined.contains("IK Ezekwelu"));
    }

    #[test]
    fn joined_length_grows_with_pages() {
        let mut pages: Vec<String> = vec![];
        let mut prev = 0;
        for i in 0..5 {
            pages.push(format!("slide {} content", i));
            let len = DeckText::from_pages("deck.pdf", pages.clone()).joined().len();
            assert!(len > prev);
            prev = len;
        }
    }

    #[test]
    fn empty_page_becomes_empty_block() {
        let text = DeckText::from_pages("deck.pdf", vec!["".into()]);
        assert_eq!(text.joined(), "----- Slide 1 -----\n\n");
    }

    #[test]
    fn config_debug_redacts_api_key() {
        let config = Config {
            api_key: Some("sk-secret-value".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn run_fatal_classification() {
        assert!(DeckError::ExtractionAuth("401".into()).is_run_fatal());
        assert!(DeckError::ExtractionQuota("out of credits".into()).is_run_fatal());
        assert!(!DeckError::UnreadableDocument("bad magic".into()).is_run_fatal());
        assert!(!DeckError::MalformedExtraction("not json".into()).is_run_fatal());
        assert!(
            !DeckError::ExtractionUnavailable {
                attempts: 3,
                message: "timeout".into()
            }
            .is_run_fatal()
        );
    }

    #[test]
    fn failed_entry_keeps_key_and_reason() {
        let err = DeckError::MalformedExtraction("unexpected token".into());
        let entry = DeckEntry::failed("deck.pdf", &err);
        assert_eq!(entry.key, "deck.pdf");
        assert!(entry.is_failed());
        assert!(entry.error.as_deref().unwrap().contains("unexpected token"));
        assert_eq!(entry.record, DeckRecord::default());
    }
}
