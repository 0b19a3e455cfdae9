//! Defensive parsing and normalization of model output.
//!
//! The model's free-text reply is the only untrusted input in the pipeline,
//! so nothing from it is taken at face value: one strict parse, one recovery
//! pass, then field-by-field coercion into a fully-populated [`DeckRecord`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{DeckError, DeckRecord, MarketSize};

/// Opening code fence, with an optional language tag (```json etc).
static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*\s*\n?").expect("fence regex"));

/// Parse the raw response as JSON.
///
/// Strict parse first; on failure, one recovery pass (strip markdown fences,
/// then slice from the first `{` to the last `}` to drop leading/trailing
/// prose) and one retry. A second failure is [`DeckError::MalformedExtraction`].
pub fn parse_payload(raw: &str) -> Result<Value, DeckError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(value);
    }

    let recovered = recover_json_text(raw);
    serde_json::from_str::<Value>(&recovered).map_err(|e| {
        DeckError::MalformedExtraction(format!(
            "{} (response began: {:?})",
            e,
            raw.chars().take(80).collect::<String>()
        ))
    })
}

fn recover_json_text(raw: &str) -> String {
    let mut text = raw.trim();

    // Strip a markdown fence wrapper if present.
    let stripped;
    if FENCE_OPEN.is_match(text) {
        stripped = FENCE_OPEN.replace(text, "").to_string();
        text = stripped.trim_end().trim_end_matches("```").trim();
    }

    // Slice out the outermost object: drops "Sure! Here's the data:" prose.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
    {
        return text[start..=end].to_string();
    }
    text.to_string()
}

/// Look a field up under the spellings the model (and our own serializer)
/// may have used: spaced title case, compact, snake_case.
fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| value.get(n))
}

/// Coerce a scalar to a trimmed string.
///
/// Numbers and booleans are stringified (the model sometimes emits a bare
/// `2019`); null, empty and the literal string "null" count as absent.
fn coerce_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(s)
    }
}

fn string_or_empty(value: Option<&Value>) -> String {
    value.and_then(coerce_string).unwrap_or_default()
}

fn coerce_founders(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(coerce_string).collect(),
        // A bare string becomes a single-element list.
        Some(other) => coerce_string(other).into_iter().collect(),
        None => vec![],
    }
}

fn coerce_market(value: Option<&Value>) -> MarketSize {
    match value {
        Some(v @ Value::Object(_)) => MarketSize {
            tam: field(v, &["TAM", "tam"]).and_then(coerce_string),
            sam: field(v, &["SAM", "sam"]).and_then(coerce_string),
            som: field(v, &["SOM", "som"]).and_then(coerce_string),
        },
        _ => MarketSize::default(),
    }
}

/// Build a fully-populated [`DeckRecord`] from parsed model output.
///
/// Unknown keys are ignored; every schema field ends up present. Running
/// the result back through this function yields the same record.
pub fn normalize(value: &Value) -> DeckRecord {
    DeckRecord {
        startup_name: string_or_empty(field(
            value,
            &["Startup Name", "StartupName", "startup_name"],
        )),
        founding_year: field(value, &["Founding Year", "FoundingYear", "founding_year"])
            .and_then(coerce_string),
        founders: coerce_founders(field(value, &["Founders", "founders"])),
        industry: string_or_empty(field(value, &["Industry", "industry"])),
        niche: string_or_empty(field(value, &["Niche", "niche"])),
        usp: string_or_empty(field(value, &["USP", "usp"])),
        funding_stage: string_or_empty(field(
            value,
            &["Funding Stage", "FundingStage", "funding_stage"],
        )),
        current_revenue: string_or_empty(field(
            value,
            &["Current Revenue", "CurrentRevenue", "current_revenue"],
        )),
        market: coerce_market(field(value, &["Market", "market"])),
        amount_raised: string_or_empty(field(
            value,
            &["Amount Raised", "AmountRaised", "amount_raised"],
        )),
    }
}

/// Parse + normalize in one step: raw response text to record.
pub fn record_from_response(raw: &str) -> Result<DeckRecord, DeckError> {
    Ok(normalize(&parse_payload(raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const YABSCORE_RESPONSE: &str = r#"{
      "Startup Name": "Yabscore",
      "Founding Year": "2019",
      "Founders": ["IK Ezekwelu", "Dapo Arowa"],
      "Industry": "SportTech",
      "Niche": "Mobile sports betting",
      "USP": "First fully mobile sports-betting platform for Nigerian football fans.",
      "Funding Stage": null,
      "Current Revenue": "$3.1k",
      "Market": { "TAM": "$95B", "SAM": "$2.2B", "SOM": "$193M" },
      "Amount Raised": "$10m"
    }"#;

    #[test]
    fn well_formed_response_normalizes() {
        let record = record_from_response(YABSCORE_RESPONSE).unwrap();
        assert_eq!(record.startup_name, "Yabscore");
        assert_eq!(record.founding_year.as_deref(), Some("2019"));
        assert_eq!(record.founders, vec!["IK Ezekwelu", "Dapo Arowa"]);
        assert_eq!(record.market.tam.as_deref(), Some("$95B"));
        assert_eq!(record.market.sam.as_deref(), Some("$2.2B"));
        assert_eq!(record.market.som.as_deref(), Some("$193M"));
        assert_eq!(record.amount_raised, "$10m");
        assert_eq!(record.funding_stage, "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let record = record_from_response(YABSCORE_RESPONSE).unwrap();
        let reserialized = serde_json::to_value(&record).unwrap();
        assert_eq!(normalize(&reserialized), record);
    }

    #[test]
    fn fenced_response_recovers() {
        let raw = "```json\n{\"Startup Name\": \"Acme\", \"Founders\": []}\n```";
        let record = record_from_response(raw).unwrap();
        assert_eq!(record.startup_name, "Acme");
    }

    #[test]
    fn leading_prose_recovers() {
        let raw = "Sure! Here's the data: {\"Startup Name\": \"Acme\"} Hope that helps.";
        let record = record_from_response(raw).unwrap();
        assert_eq!(record.startup_name, "Acme");
    }

    #[test]
    fn unrecoverable_response_is_malformed() {
        let raw = "Sure! Here's the data: {\"Startup Name\": ";
        let err = record_from_response(raw).unwrap_err();
        assert!(matches!(err, DeckError::MalformedExtraction(_)));
    }

    #[test]
    fn plain_prose_is_malformed() {
        let err = record_from_response("I could not find any fields.").unwrap_err();
        assert!(matches!(err, DeckError::MalformedExtraction(_)));
    }

    #[test]
    fn missing_market_fills_all_null() {
        let record = record_from_response(r#"{"Startup Name": "Acme"}"#).unwrap();
        assert_eq!(record.market, MarketSize::default());
        assert!(record.market.is_empty());
    }

    #[test]
    fn partial_market_fills_missing_subkeys() {
        let record =
            record_from_response(r#"{"Market": {"TAM": "$5B"}}"#).unwrap();
        assert_eq!(record.market.tam.as_deref(), Some("$5B"));
        assert_eq!(record.market.sam, None);
        assert_eq!(record.market.som, None);
    }

    #[test]
    fn non_object_market_becomes_all_null() {
        let record = record_from_response(r#"{"Market": "huge"}"#).unwrap();
        assert_eq!(record.market, MarketSize::default());
    }

    #[test]
    fn bare_string_founders_wraps() {
        let record = record_from_response(r#"{"Founders": "Alice"}"#).unwrap();
        assert_eq!(record.founders, vec!["Alice"]);
    }

    #[test]
    fn null_founders_becomes_empty() {
        let record = record_from_response(r#"{"Founders": null}"#).unwrap();
        assert!(record.founders.is_empty());
    }

    #[test]
    fn non_string_founder_elements_are_stringified() {
        let record = record_from_response(r#"{"Founders": ["Alice", 42, null]}"#).unwrap();
        assert_eq!(record.founders, vec!["Alice", "42"]);
    }

    #[test]
    fn numeric_founding_year_is_stringified() {
        let record = record_from_response(r#"{"Founding Year": 2019}"#).unwrap();
        assert_eq!(record.founding_year.as_deref(), Some("2019"));
    }

    #[test]
    fn literal_null_string_counts_as_absent() {
        let record =
            record_from_response(r#"{"Funding Stage": "null", "Founding Year": "NULL"}"#).unwrap();
        assert_eq!(record.funding_stage, "");
        assert_eq!(record.founding_year, None);
    }

    #[test]
    fn compact_key_spellings_accepted() {
        let record = record_from_response(
            r#"{"StartupName": "Acme", "FundingStage": "Seed", "CurrentRevenue": "$1m"}"#,
        )
        .unwrap();
        assert_eq!(record.startup_name, "Acme");
        assert_eq!(record.funding_stage, "Seed");
        assert_eq!(record.current_revenue, "$1m");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let record = record_from_response(
            r#"{"Startup Name": "Acme", "Confidence": 0.93, "Notes": ["extra"]}"#,
        )
        .unwrap();
        assert_eq!(record.startup_name, "Acme");
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let record = record_from_response("{}").unwrap();
        assert_eq!(record, DeckRecord::default());
        // Every string field is "" rather than absent, founders is [].
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "startup_name",
            "industry",
            "niche",
            "usp",
            "funding_stage",
            "current_revenue",
            "amount_raised",
        ] {
            assert_eq!(json[key], "", "field {key}");
        }
        assert_eq!(json["founding_year"], Value::Null);
        assert_eq!(json["founders"], serde_json::json!([]));
        assert_eq!(
            json["market"],
            serde_json::json!({"tam": null, "sam": null, "som": null})
        );
    }

    #[test]
    fn whitespace_is_trimmed() {
        let record = record_from_response(r#"{"Startup Name": "  Acme  "}"#).unwrap();
        assert_eq!(record.startup_name, "Acme");
    }
}
