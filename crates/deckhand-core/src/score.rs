//! Rubric scoring pass: ten fixed sections, weighted by presence and
//! quality, producing a total score and a one-line summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::CompletionClient;
use crate::normalize::parse_payload;
use crate::prompt::build_scoring_prompt;
use crate::rate_limit::complete_with_retry;
use crate::{Config, DeckError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionScore {
    pub name: String,
    pub score: u8,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchScore {
    pub sections: Vec<SectionScore>,
    pub total_score: Option<u32>,
    pub summary: String,
}

/// Parse the scorer's JSON reply. Tolerant per-field: a malformed section
/// entry is dropped rather than failing the whole score.
pub fn parse_score_response(raw: &str) -> Result<PitchScore, DeckError> {
    let value = parse_payload(raw)?;

    let sections = value
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.to_string();
                    let score = item.get("score")?.as_u64()?.min(10) as u8;
                    let reason = item
                        .get("reason")
                        .or_else(|| item.get("comment"))
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    Some(SectionScore {
                        name,
                        score,
                        reason,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let total_score = value
        .get("total_score")
        .and_then(Value::as_u64)
        .map(|n| n as u32);

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    Ok(PitchScore {
        sections,
        total_score,
        summary,
    })
}

/// Run the scoring prompt against the deck text.
pub async fn score_deck(
    deck_text: &str,
    llm: &dyn CompletionClient,
    client: &reqwest::Client,
    config: &Config,
) -> Result<PitchScore, DeckError> {
    let prompt = build_scoring_prompt(deck_text, config.max_prompt_chars);
    let raw = complete_with_retry(llm, &config.scoring_model, &prompt, client, config, None).await?;
    parse_score_response(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_total_and_summary() {
        let raw = r#"{
          "sections": [
            {"name": "Team", "score": 8, "reason": "Founders listed with roles."},
            {"name": "Problem", "score": 6, "reason": "Implied but not articulated."}
          ],
          "total_score": 72,
          "summary": "Solid pitch overall."
        }"#;
        let score = parse_score_response(raw).unwrap();
        assert_eq!(score.sections.len(), 2);
        assert_eq!(score.sections[0].name, "Team");
        assert_eq!(score.sections[0].score, 8);
        assert_eq!(score.total_score, Some(72));
        assert_eq!(score.summary, "Solid pitch overall.");
    }

    #[test]
    fn accepts_comment_alias_for_reason() {
        let raw = r#"{"sections": [{"name": "Team", "score": 5, "comment": "thin"}]}"#;
        let score = parse_score_response(raw).unwrap();
        assert_eq!(score.sections[0].reason, "thin");
    }

    #[test]
    fn section_scores_are_clamped_to_ten() {
        let raw = r#"{"sections": [{"name": "Team", "score": 25}]}"#;
        let score = parse_score_response(raw).unwrap();
        assert_eq!(score.sections[0].score, 10);
    }

    #[test]
    fn malformed_section_entries_are_dropped() {
        let raw = r#"{"sections": [{"name": "Team", "score": 7}, {"score": 3}, "junk"]}"#;
        let score = parse_score_response(raw).unwrap();
        assert_eq!(score.sections.len(), 1);
    }

    #[test]
    fn missing_everything_yields_empty_score() {
        let score = parse_score_response("{}").unwrap();
        assert!(score.sections.is_empty());
        assert_eq!(score.total_score, None);
        assert_eq!(score.summary, "");
    }

    #[test]
    fn fenced_score_response_recovers() {
        let raw = "```json\n{\"total_score\": 55, \"summary\": \"ok\"}\n```";
        let score = parse_score_response(raw).unwrap();
        assert_eq!(score.total_score, Some(55));
    }

    #[test]
    fn unparseable_score_is_malformed() {
        assert!(matches!(
            parse_score_response("no json here"),
            Err(DeckError::MalformedExtraction(_))
        ));
    }
}
