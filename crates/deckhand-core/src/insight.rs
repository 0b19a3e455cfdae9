//! Qualitative insight pass: red flags, suggested investor questions and a
//! short investment-readiness summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::CompletionClient;
use crate::normalize::parse_payload;
use crate::prompt::build_insight_prompt;
use crate::rate_limit::complete_with_retry;
use crate::{Config, DeckError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckInsight {
    /// Overall pitch quality, 0-100.
    pub pitch_score: Option<u32>,
    pub red_flags: Vec<String>,
    pub suggested_questions: Vec<String>,
    pub summary_insight: String,
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the insight reply into [`DeckInsight`].
pub fn parse_insight_response(raw: &str) -> Result<DeckInsight, DeckError> {
    let value = parse_payload(raw)?;

    Ok(DeckInsight {
        pitch_score: value
            .get("Pitch Score")
            .or_else(|| value.get("pitch_score"))
            .and_then(Value::as_u64)
            .map(|n| n.min(100) as u32),
        red_flags: string_list(value.get("Red Flags").or_else(|| value.get("red_flags"))),
        suggested_questions: string_list(
            value
                .get("Suggested Questions")
                .or_else(|| value.get("suggested_questions")),
        ),
        summary_insight: value
            .get("Summary Insight")
            .or_else(|| value.get("summary_insight"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string(),
    })
}

/// Run the insight prompt against the deck text.
pub async fn generate_insight(
    deck_text: &str,
    llm: &dyn CompletionClient,
    client: &reqwest::Client,
    config: &Config,
) -> Result<DeckInsight, DeckError> {
    let prompt = build_insight_prompt(deck_text, config.max_prompt_chars);
    let raw = complete_with_retry(llm, &config.model, &prompt, client, config, None).await?;
    parse_insight_response(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_insight() {
        let raw = r#"{
          "Pitch Score": 68,
          "Red Flags": ["No clear monetization strategy"],
          "Suggested Questions": ["Who is your paying customer?"],
          "Summary Insight": "Strong team, unclear go-to-market."
        }"#;
        let insight = parse_insight_response(raw).unwrap();
        assert_eq!(insight.pitch_score, Some(68));
        assert_eq!(insight.red_flags.len(), 1);
        assert_eq!(insight.suggested_questions.len(), 1);
        assert_eq!(insight.summary_insight, "Strong team, unclear go-to-market.");
    }

    #[test]
    fn missing_keys_default() {
        let insight = parse_insight_response("{}").unwrap();
        assert_eq!(insight.pitch_score, None);
        assert!(insight.red_flags.is_empty());
        assert!(insight.suggested_questions.is_empty());
        assert_eq!(insight.summary_insight, "");
    }

    #[test]
    fn score_clamped_to_100() {
        let insight = parse_insight_response(r#"{"Pitch Score": 400}"#).unwrap();
        assert_eq!(insight.pitch_score, Some(100));
    }

    #[test]
    fn snake_case_keys_accepted() {
        let raw = r#"{"pitch_score": 80, "red_flags": ["x"], "summary_insight": "ok"}"#;
        let insight = parse_insight_response(raw).unwrap();
        assert_eq!(insight.pitch_score, Some(80));
        assert_eq!(insight.red_flags, vec!["x"]);
        assert_eq!(insight.summary_insight, "ok");
    }

    #[test]
    fn non_string_flags_are_dropped() {
        let raw = r#"{"Red Flags": ["real", 42, {"k": "v"}]}"#;
        let insight = parse_insight_response(raw).unwrap();
        assert_eq!(insight.red_flags, vec!["real"]);
    }
}
