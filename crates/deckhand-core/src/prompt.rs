//! Fixed prompt templates: the few-shot extraction prefix, the rubric
//! scoring prompt, the insight prompt and the key-slide prompt.
//!
//! The templates are deliberately hardcoded. The whole tool is a single
//! prompt against a single schema; treating the prompt as data would only
//! add a config surface for something that must stay in lockstep with the
//! normalizer.

use once_cell::sync::Lazy;

const EXAMPLE_1_TEXT: &str = r#"
----- Slide 1 -----
Yabscore
----- Slide 2 -----
Founded in Oct 2019, we are a sport-tech startup focused on mobile sports betting in Nigeria.
----- Slide 3 -----
Team:
IK Ezekwelu - Co-Founder
Dapo Arowa - Co-Founder
Adewale Adeleke - Creative Head
----- Slide 4 -----
Unique Selling Proposition:
Yabscore is the first fully mobile sports-betting platform tailored to Nigerian football fans, offering in-play wagering and live performance stats.
----- Slide 7 -----
Market Size:
TAM: $95 Billion +
SAM: $2.2 Billion +
Market Opp.: $193 Million +
----- Slide 12 -----
Traction:
Gross Revenues in 2020: $3.1k
"#;

const EXAMPLE_1_JSON: &str = r#"{
  "Startup Name": "Yabscore",
  "Founding Year": "2019",
  "Founders": ["IK Ezekwelu", "Dapo Arowa"],
  "Industry": "SportTech",
  "Niche": "Mobile sports betting",
  "USP": "Yabscore is the first fully mobile sports-betting platform tailored to Nigerian football fans, offering in-play wagering and live performance stats.",
  "Funding Stage": null,
  "Current Revenue": "$3.1k",
  "Market": { "TAM": "$95B", "SAM": "$2.2B", "SOM": "$193M" },
  "Amount Raised": "$0"
}"#;

const EXAMPLE_2_TEXT: &str = r#"
----- Slide 1 -----
Quidax

----- Slide 2 -----
Founded in August 2018, Quidax is a fintech "cryptocurrency enabler" that lets individuals and businesses across Africa buy, sell, save and spend crypto in their local currency through an exchange, OTC desk and a single, full-stack crypto API.

----- Slide 3 -----
Team:
Buchi Okoro - Co-Founder & CEO
Uzo Awili - Co-Founder & CTO
Morris Ebieroma - Co-Founder & CIO

----- Slide 4 -----
Unique Selling Proposition:
An Africa-focused, all-in-one crypto platform offering:
- Seamless fiat on/off-ramps and 1,200+ trading pairs.
- A single API that lets banks, fintechs and gaming apps embed custody, trading and payments in days.
- "African Proximity Advantage" - deep local rails, faster support and lower switching costs than global rivals.

----- Slide 7 -----
Market Opportunity:
- 575 million+ global crypto users as of Dec 2024; 65 million in Africa, with Nigeria ranked #2 worldwide for adoption.
(The deck does not state dollar TAM/SAM/SOM figures.)

----- Slide 12 -----
Traction:
- Crossed $10 million ARR and 700k sign-ups in 2023.
- Surpassed $100 million cumulative trading volume by Oct 2020 and now processes ~$25 million monthly.
- Serves 2,000+ business API clients across digital banking, gaming and fintech.

(No fundraising ask, Series round or formal TAM/SAM/SOM numbers are disclosed in the deck.)
"#;

const EXAMPLE_2_JSON: &str = r#"{
  "Startup Name": "Quidax",
  "Founding Year": "2018",
  "Founders": ["Buchi Okoro", "Uzo Awili", "Morris Ebieroma"],
  "Industry": "Fintech",
  "Niche": "Cryptocurrency exchange",
  "USP": "All-in-one platform with seamless fiat on/off ramps and a single API enabling African users and businesses to access 1,200+ crypto pairs securely",
  "Funding Stage": null,
  "Current Revenue": "$10m",
  "Market": { "TAM": null, "SAM": null, "SOM": null },
  "Amount Raised": "$0"
}"#;

const SCHEMA_INSTRUCTIONS: &str = r#"You are an expert at extracting structured data from investor pitch decks. For each deck, I will present the slide text. Return exactly one JSON object with these ten fields:
{
  "Startup Name": string or null,  # the most likely startup name: a single name repeated through the deck, not a sentence, no hashtags
  "Founding Year": string or null, # if no explicit "Founded in YYYY" appears, scan timeline dates, traction graph captions, team-bio phrasing and funding-history dates for the most probable founding year; if several plausible years appear, choose the earliest with direct or indirect support
  "Founders": [string, ...] or null, # the likely founders of this startup
  "Industry": string or null,       # one of: Fintech, Insurtech, Healthtech, Medtech, Biotech, Femtech, Proptech, Agtech, Foodtech, ClimateTech, CleanTech, EnergyTech, Edtech, HRtech, Martech, Adtech, RetailTech, Ecommerce, Marketplace, MobilityTech, TransportTech, LogisticsTech, TravelTech, SpaceTech, DefenceTech, SportTech, GamingTech, MediaTech, MusicTech, SocialTech, Cybersecurity, AI, MachineLearning, BigData, CloudTech, SaaS, DevOps, IoT, Robotics, HardwareTech, AR/VR/XR, Web3, Blockchain, Crypto, LegalTech, Govtech, PetTech etc.
  "Niche": string or null,          # free-text, e.g. "crypto exchange", "mobile betting", "AI tutoring"
  "USP": string or null,            # a single sentence from the deck stating the unique selling proposition
  "Funding Stage": string or null,  # if no explicit round is mentioned, infer the most probable round (Pre-seed, Seed, Series A, Series B, Series C or later) from capital sought, traction, product maturity, team size, prior funding and planned use of funds
  "Current Revenue": string or null, # revenue for the latest actual year in the financials, not future forecasts
  "Market": { "TAM": string or null, "SAM": string or null, "SOM": string or null } or null,
  "Amount Raised": string or null   # funds previously raised from investors since inception; exclude the amount currently being sought
}
Return strict JSON only. If any field is not present in the slides, set it to null. Do not fabricate data that is not in the text."#;

/// The fixed few-shot prefix: schema instructions plus two worked examples.
static PROMPT_PREFIX: Lazy<String> = Lazy::new(|| {
    format!(
        "{SCHEMA_INSTRUCTIONS}\n\n---- EXAMPLE 1 ----\nSlide texts:\n{EXAMPLE_1_TEXT}\nJSON answer:\n{EXAMPLE_1_JSON}\n\n---- EXAMPLE 2 ----\nSlide texts:\n{EXAMPLE_2_TEXT}\nJSON answer:\n{EXAMPLE_2_JSON}\n\n---- NOW PROCESS THIS NEW DECK ----\nSlide texts:\n"
    )
});

/// Marker spliced in where truncation dropped the middle of a deck.
pub const TRUNCATION_MARKER: &str = "\n[... middle slides omitted ...]\n";

/// Fraction of the character budget given to the head of the deck text.
/// Intro/team slides cluster at the start, financials and the ask at the
/// end, so the middle is the cheapest part to drop.
const HEAD_FRACTION: f64 = 0.6;

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Enforce the prompt budget on the deck text: keep head and tail, drop the
/// middle, splice in [`TRUNCATION_MARKER`].
pub fn truncate_deck_text(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(TRUNCATION_MARKER.len()).max(2);
    let head_len = floor_char_boundary(text, (budget as f64 * HEAD_FRACTION) as usize);
    let tail_len = budget - head_len;
    let tail_start = floor_char_boundary(text, text.len() - tail_len.min(text.len()));
    format!(
        "{}{}{}",
        &text[..head_len],
        TRUNCATION_MARKER,
        &text[tail_start..]
    )
}

/// Build the full extraction prompt for one deck.
pub fn build_extraction_prompt(deck_text: &str, max_chars: usize) -> String {
    let deck_text = truncate_deck_text(deck_text, max_chars);
    format!("{}{}\nJSON answer:", *PROMPT_PREFIX, deck_text)
}

/// Build the rubric scoring prompt (supplementary pass).
pub fn build_scoring_prompt(deck_text: &str, max_chars: usize) -> String {
    let deck_text = truncate_deck_text(deck_text, max_chars);
    format!(
        r#"You are a world-class venture capital analyst evaluating startup pitch decks. Your task is to score the quality of a pitch based on exactly these 10 sections:

1. Team
2. Problem
3. Solution
4. Business Model
5. Market Size
6. Product
7. Traction
8. Competition
9. Financials
10. Ask

Rules:
- Only score a section if the content directly addresses it in the pitch. Do not assume or infer.
- If a section is missing, vague, or superficial, give it a score of 0 to 3 and say why.
- Never award 10/10 unless the content is clear, complete, and convincing.
- Include a brief reason for each score (1 sentence max).
- Return the sum of all 10 section scores as total_score.
- If a section is not present, do not guess: penalize.

Return your output as strict JSON:
{{
  "sections": [
    {{ "name": "Team", "score": 7, "reason": "Experienced founders but lacks depth on roles" }},
    ...
  ],
  "total_score": 65,
  "summary": "Strong traction and product, but team details and financials are lacking."
}}
--- BEGIN SLIDE TEXT ---
{deck_text}
--- END SLIDE TEXT ---
"#
    )
}

/// Build the qualitative insight prompt (supplementary pass).
pub fn build_insight_prompt(deck_text: &str, max_chars: usize) -> String {
    let deck_text = truncate_deck_text(deck_text, max_chars);
    format!(
        r#"You are a world-class venture capital analyst. Given the slide text from a startup's pitch deck, evaluate the deck's quality and investment readiness.

Return exactly one JSON object with the following keys:
- "Pitch Score": integer (0 to 100), overall quality of the pitch based on clarity, traction, team, market, and completeness.
- "Red Flags": list of strings (weaknesses, missing slides, unclear metrics, unrealistic claims).
- "Suggested Questions": list of strings (what an investor should ask in a meeting to probe the deck further).
- "Summary Insight": one or two sentences summarizing the investment potential.

If information is missing, penalize the score and flag it clearly.

--- EXAMPLE 1 ---
Slide text:
"We are an AI platform helping students revise smarter using personalized flashcards. The product is live with 2k monthly users. Team: Janet (Founder, ex-Edmodo), Kunle (CTO, Oxford PhD). Monetization TBD."

JSON Output:
{{
  "Pitch Score": 68,
  "Red Flags": [
    "No clear monetization strategy",
    "Limited traction data (only user count mentioned)"
  ],
  "Suggested Questions": [
    "What are your revenue projections for the next 12 months?",
    "Who is your paying customer (schools, parents, students)?"
  ],
  "Summary Insight": "The founding team has strong credentials and early traction, but monetization and go-to-market strategy remain unclear."
}}

--- EXAMPLE 2 ---
Slide text:
"Our SaaS platform automates logistics for mid-size retailers. $150k ARR in 6 months, with 95% retention. Team includes ex-Amazon logistics head. Raising $1M Seed to scale."

JSON Output:
{{
  "Pitch Score": 90,
  "Red Flags": [],
  "Suggested Questions": [
    "What's your CAC and LTV?",
    "How do you plan to scale customer acquisition?"
  ],
  "Summary Insight": "This is a high-quality deck with strong traction and a credible team in a clear market."
}}

--- NOW EVALUATE THIS DECK ---
Slide text:
{deck_text}

JSON Output:
"#
    )
}

/// Per-page snippet length used by the key-slide prompt.
const SNIPPET_CHARS: usize = 200;

/// Build the key-slide identification prompt from per-page texts.
///
/// Each page contributes a single-line snippet; the model answers with
/// 1-indexed page numbers for the Team, Market and Traction slides.
pub fn build_key_slide_prompt(pages: &[String]) -> String {
    let mut out = String::from(
        "I'm going to give you the text from each slide of a pitch deck, one by one. \
         Tell me exactly which page number (1-indexed) is the Team slide, which page \
         number is the Market slide, and which page number is the Traction slide. \
         Format your answer exactly as JSON with keys \"TeamPage\", \"MarketPage\", \
         \"TractionPage\". If you can't find one of them, put null for that field.\n",
    );
    for (i, text) in pages.iter().enumerate() {
        let snippet: String = text.trim().replace('\n', " ");
        let end = {
            let mut e = snippet.len().min(SNIPPET_CHARS);
            while e > 0 && !snippet.is_char_boundary(e) {
                e -= 1;
            }
            e
        };
        out.push_str(&format!("---\nPage {}:\n{}\n", i + 1, &snippet[..end]));
    }
    out.push_str(
        "\nAnswer in JSON, for example:\n{\n  \"TeamPage\": 7,\n  \"MarketPage\": 5,\n  \"TractionPage\": 15\n}\n",
    );
    out
}
