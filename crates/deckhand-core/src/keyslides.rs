//! Key-slide identification: which pages carry the Team, Market and
//! Traction slides. Used by the display layer to pick preview pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::CompletionClient;
use crate::normalize::parse_payload;
use crate::prompt::build_key_slide_prompt;
use crate::rate_limit::complete_with_retry;
use crate::{Config, DeckError};

/// 1-indexed page numbers for the key slides; None when the model could not
/// locate one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySlides {
    pub team_page: Option<usize>,
    pub market_page: Option<usize>,
    pub traction_page: Option<usize>,
}

impl KeySlides {
    pub fn is_empty(&self) -> bool {
        self.team_page.is_none() && self.market_page.is_none() && self.traction_page.is_none()
    }
}

/// Read a page number, tolerating both `7` and `"7"`, and reject anything
/// outside 1..=page_count.
fn page_number(value: Option<&Value>, page_count: usize) -> Option<usize> {
    let n = match value {
        Some(Value::Number(n)) => n.as_u64()? as usize,
        Some(Value::String(s)) => s.trim().parse().ok()?,
        _ => return None,
    };
    (1..=page_count).contains(&n).then_some(n)
}

/// Parse the model's `{"TeamPage": .., "MarketPage": .., "TractionPage": ..}`
/// reply. An unparseable reply degrades to all-None rather than erroring;
/// key-slide preview is cosmetic.
pub fn parse_key_slide_response(raw: &str, page_count: usize) -> KeySlides {
    let Ok(value) = parse_payload(raw) else {
        return KeySlides::default();
    };
    KeySlides {
        team_page: page_number(value.get("TeamPage"), page_count),
        market_page: page_number(value.get("MarketPage"), page_count),
        traction_page: page_number(value.get("TractionPage"), page_count),
    }
}

/// Ask the model which pages hold the Team/Market/Traction slides.
pub async fn identify_key_slides(
    pages: &[String],
    llm: &dyn CompletionClient,
    client: &reqwest::Client,
    config: &Config,
) -> Result<KeySlides, DeckError> {
    let prompt = build_key_slide_prompt(pages);
    let raw = complete_with_retry(llm, &config.model, &prompt, client, config, None).await?;
    Ok(parse_key_slide_response(&raw, pages.len()))
}
