//! Lexicon-based text analysis
//!
//! Sentiment scans tokens left to right. Each sentiment word looks back up to
//! two tokens for a negation marker (which moves 0.8 of its weight to the
//! opposite polarity) and for intensity modifiers (the strongest one scales
//! it). Neutral mass starts at a fixed baseline and grows with neutral words
//! and non-sentiment filler, so short emphatic text leans polar while long
//! descriptive text leans neutral.

use compass_core::{
    ConfidenceScores, DetectedLanguage, Entity, ProviderError, Sentiment, SentimentLabel,
    TextAnalysis, TextFeature, TextRequest,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::seed::round3;

// ============================================================================
// LEXICONS
// ============================================================================

pub const POSITIVE_WORDS: &[&str] = &[
    "love", "loved", "amazing", "great", "excellent", "perfect", "beautiful", "wonderful",
    "fantastic", "awesome", "brilliant", "outstanding", "superb", "magnificent", "incredible",
    "fabulous", "recommend", "pleased", "satisfied", "happy", "delighted", "impressed",
    "thrilled", "good", "nice",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "hate", "terrible", "awful", "disappointed", "broke", "broken", "worst", "horrible",
    "disgusting", "useless", "cheap", "flimsy", "poor", "bad", "defective", "damaged", "waste",
    "regret", "angry", "frustrated", "annoyed", "upset", "dissatisfied", "unhappy",
];

pub const NEUTRAL_WORDS: &[&str] = &[
    "okay", "fine", "average", "decent", "acceptable", "standard", "typical", "normal",
    "expected", "basic", "simple", "plain", "regular", "ordinary",
];

pub const INTENSITY_MODIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("extremely", 1.5),
    ("absolutely", 1.4),
    ("completely", 1.4),
    ("totally", 1.3),
    ("really", 1.2),
    ("quite", 1.1),
    ("pretty", 1.1),
    ("highly", 1.3),
];

pub const NEGATION_MARKERS: &[&str] = &[
    "not", "never", "no", "none", "neither", "nothing", "don't", "won't", "can't", "isn't",
    "wasn't", "doesn't", "didn't",
];

/// Curated review vocabulary boosted during key-phrase extraction.
pub const DEFAULT_KEY_PHRASE_BOOST: &[&str] = &[
    "quality", "price", "shipping", "delivery", "customer service", "material", "design",
    "color", "size", "fit", "comfort", "durability", "value", "recommend",
];

const NEGATION_FLIP_FACTOR: f64 = 0.8;
const NEUTRAL_BASELINE: f64 = 0.5;
const FILLER_WEIGHT: f64 = 0.05;
const MAX_KEY_PHRASES: usize = 8;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had", "has",
    "have", "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "it's", "i'm", "me",
    "my", "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "too", "us", "was", "we", "were", "what",
    "when", "which", "who", "will", "with", "would", "you", "your", "just", "also", "much",
    "more", "all", "any", "can", "could", "did", "do", "does", "got", "get", "one", "about",
];

static TOKEN_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)?"));

// ============================================================================
// TOKENIZATION
// ============================================================================

/// Lower-cased word tokens, keeping contractions like `don't` whole.
pub fn tokenize(text: &str) -> Result<Vec<String>, ProviderError> {
    let re = TOKEN_RE.as_ref().map_err(|e| ProviderError::SimulatorFailure {
        reason: format!("tokenizer regex: {}", e),
    })?;
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    Ok(re
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect())
}

fn intensity_of(token: &str) -> Option<f64> {
    INTENSITY_MODIFIERS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, mult)| *mult)
}

fn is_negation(token: &str) -> bool {
    NEGATION_MARKERS.contains(&token)
}

// ============================================================================
// SENTIMENT
// ============================================================================

/// Accumulated polarity mass before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentimentMass {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

pub fn score_tokens(tokens: &[String]) -> SentimentMass {
    let mut positive = 0.0;
    let mut negative = 0.0;
    let mut neutral_hits = 0usize;
    let mut filler = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        let token = token.as_str();
        let polarity = if POSITIVE_WORDS.contains(&token) {
            1
        } else if NEGATIVE_WORDS.contains(&token) {
            -1
        } else {
            0
        };

        if polarity == 0 {
            if NEUTRAL_WORDS.contains(&token) {
                neutral_hits += 1;
            } else if intensity_of(token).is_none() && !is_negation(token) {
                filler += 1;
            }
            continue;
        }

        let lookback = &tokens[i.saturating_sub(2)..i];
        let negated = lookback.iter().any(|t| is_negation(t));
        let magnitude = lookback
            .iter()
            .filter_map(|t| intensity_of(t))
            .fold(1.0, f64::max);

        match (polarity > 0, negated) {
            (true, false) => positive += magnitude,
            (true, true) => negative += magnitude * NEGATION_FLIP_FACTOR,
            (false, false) => negative += magnitude,
            (false, true) => positive += magnitude * NEGATION_FLIP_FACTOR,
        }
    }

    SentimentMass {
        positive,
        negative,
        neutral: NEUTRAL_BASELINE + neutral_hits as f64 + FILLER_WEIGHT * filler as f64,
    }
}

/// Normalize mass into a distribution and pick the label.
pub fn classify(mass: SentimentMass) -> Sentiment {
    // neutral >= NEUTRAL_BASELINE, so total is never zero.
    let total = mass.positive + mass.negative + mass.neutral;
    let scores = ConfidenceScores {
        positive: mass.positive / total,
        neutral: mass.neutral / total,
        negative: mass.negative / total,
    };

    let overall = if scores.positive > scores.neutral && scores.positive > scores.negative {
        SentimentLabel::Positive
    } else if scores.negative > scores.neutral && scores.negative > scores.positive {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    Sentiment {
        overall,
        confidence_scores: scores,
    }
}

// ============================================================================
// KEY PHRASES
// ============================================================================

/// Stoplist-filtered frequency/position ranking with a curated boost list.
pub fn extract_key_phrases(tokens: &[String], text: &str, boost: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    let n = tokens.len();
    let edge = (n / 5).max(1);

    let is_candidate = |t: &str| {
        t.chars().count() >= 3
            && !t.chars().all(|c| c.is_numeric())
            && !STOPWORDS.contains(&t)
            && !is_negation(t)
            && intensity_of(t).is_none()
    };
    let boosted = |t: &str| boost.iter().any(|b| b == t);

    // phrase -> (score, first position)
    let mut scores: HashMap<String, (f64, usize)> = HashMap::new();
    let mut bump = |phrase: String, amount: f64, pos: usize| {
        let entry = scores.entry(phrase).or_insert((0.0, pos));
        entry.0 += amount;
        entry.1 = entry.1.min(pos);
    };

    for (i, token) in tokens.iter().enumerate() {
        if !is_candidate(token) {
            continue;
        }
        let mut score = 1.0;
        if i < edge || i >= n.saturating_sub(edge) {
            score += 0.5;
        }
        if boosted(token) {
            score += 2.0;
            // A descriptor right before a boosted term forms a phrase, e.g. "fast shipping".
            if i > 0 && is_candidate(&tokens[i - 1]) && !boosted(&tokens[i - 1]) {
                bump(format!("{} {}", tokens[i - 1], token), 3.5, i - 1);
            }
        }
        bump(token.clone(), score, i);
    }

    // Multi-word boost entries are matched against the raw text.
    for phrase in boost.iter().filter(|b| b.contains(' ')) {
        if let Some(byte_pos) = lowered.find(phrase.as_str()) {
            let pos = lowered[..byte_pos].split_whitespace().count();
            bump(phrase.clone(), 4.0, pos);
        }
    }

    // Drop single words already covered by a ranked phrase.
    let phrases: Vec<String> = scores.keys().filter(|k| k.contains(' ')).cloned().collect();
    scores.retain(|k, _| k.contains(' ') || !phrases.iter().any(|p| p.split(' ').any(|w| w == k)));

    let mut ranked: Vec<(String, f64, usize)> =
        scores.into_iter().map(|(k, (s, p))| (k, s, p)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(MAX_KEY_PHRASES)
        .map(|(k, _, _)| k)
        .collect()
}

// ============================================================================
// ENTITIES
// ============================================================================

struct EntityRule {
    entity_type: &'static str,
    confidence: f64,
    pattern: &'static str,
}

const ENTITY_RULES: &[EntityRule] = &[
    EntityRule {
        entity_type: "URL",
        confidence: 0.95,
        pattern: r"https?://[^\s]+[^\s.,;:!?)]",
    },
    EntityRule {
        entity_type: "Email",
        confidence: 0.95,
        pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    },
    EntityRule {
        entity_type: "Quantity",
        confidence: 0.85,
        pattern: r"[$€£]\s?\d+(?:[.,]\d+)?|\b\d+(?:\.\d+)?\s?%",
    },
    EntityRule {
        entity_type: "DateTime",
        confidence: 0.8,
        pattern: r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)(?:\s+\d{1,2}(?:st|nd|rd|th)?)?(?:,?\s+\d{4})?\b",
    },
    EntityRule {
        entity_type: "Organization",
        confidence: 0.7,
        pattern: r"\b[A-Z][A-Za-z0-9&]*[a-z0-9&][A-Za-z0-9&]*(?:\s+[A-Z][A-Za-z0-9&]+)*\b|\b[A-Z]{2,}\b",
    },
];

static ENTITY_REGEXES: Lazy<Result<Vec<Regex>, regex::Error>> = Lazy::new(|| {
    ENTITY_RULES
        .iter()
        .map(|rule| Regex::new(rule.pattern))
        .collect()
});

fn at_sentence_start(text: &str, start: usize) -> bool {
    text[..start]
        .trim_end()
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?'))
        .unwrap_or(true)
}

/// Regex heuristics; earlier rules claim their spans first.
pub fn extract_entities(text: &str) -> Result<Vec<Entity>, ProviderError> {
    let regexes = ENTITY_REGEXES
        .as_ref()
        .map_err(|e| ProviderError::SimulatorFailure {
            reason: format!("entity regex: {}", e),
        })?;

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut found: Vec<(usize, Entity)> = Vec::new();

    for (rule, re) in ENTITY_RULES.iter().zip(regexes.iter()) {
        for m in re.find_iter(text) {
            let (mut start, end) = (m.start(), m.end());
            if claimed.iter().any(|&(s, e)| start < e && s < end) {
                continue;
            }
            let mut surface = m.as_str();
            if rule.entity_type == "Organization" && at_sentence_start(text, start) {
                // A capitalized sentence opener is not evidence of a name.
                match surface.split_once(char::is_whitespace) {
                    Some((_, rest)) => {
                        surface = rest.trim_start();
                        start = end - surface.len();
                    }
                    None if surface.chars().all(|c| c.is_ascii_uppercase()) && surface.len() > 1 => {}
                    None => continue,
                }
            }
            claimed.push((start, end));
            if found.iter().any(|(_, e)| e.text == surface) {
                continue;
            }
            found.push((
                start,
                Entity {
                    text: surface.to_string(),
                    entity_type: rule.entity_type.to_string(),
                    confidence: rule.confidence,
                },
            ));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    Ok(found.into_iter().map(|(_, e)| e).collect())
}

// ============================================================================
// LANGUAGE
// ============================================================================

struct LanguageProfile {
    iso: &'static str,
    name: &'static str,
    stopwords: &'static [&'static str],
}

const LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        iso: "en",
        name: "English",
        stopwords: &["the", "and", "is", "it", "to", "of", "in", "that", "this", "with", "for", "was", "you", "are", "not", "my"],
    },
    LanguageProfile {
        iso: "es",
        name: "Spanish",
        stopwords: &["el", "la", "los", "las", "de", "que", "y", "es", "en", "un", "una", "por", "con", "para", "muy", "mi"],
    },
    LanguageProfile {
        iso: "fr",
        name: "French",
        stopwords: &["le", "la", "les", "de", "et", "est", "un", "une", "pour", "avec", "dans", "que", "pas", "très", "je", "ce"],
    },
    LanguageProfile {
        iso: "de",
        name: "German",
        stopwords: &["der", "die", "das", "und", "ist", "nicht", "ein", "eine", "mit", "für", "zu", "ich", "sehr", "auf", "es", "sie"],
    },
];

/// Stop-word overlap; the earlier profile wins ties.
pub fn detect_language(tokens: &[String]) -> DetectedLanguage {
    let hits: Vec<usize> = LANGUAGES
        .iter()
        .map(|lang| {
            tokens
                .iter()
                .filter(|t| lang.stopwords.contains(&t.as_str()))
                .count()
        })
        .collect();
    let total: usize = hits.iter().sum();

    let mut best = 0;
    for (i, h) in hits.iter().enumerate() {
        if *h > hits[best] {
            best = i;
        }
    }

    let profile = &LANGUAGES[best];
    let confidence = if total == 0 {
        0.5
    } else {
        round3(0.5 + 0.5 * hits[best] as f64 / total as f64)
    };
    DetectedLanguage {
        name: profile.name.to_string(),
        iso6391_name: profile.iso.to_string(),
        confidence,
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

pub fn analyze(request: &TextRequest, boost: &[String]) -> Result<TextAnalysis, ProviderError> {
    if request.text.trim().is_empty() {
        return Err(ProviderError::invalid_input("text is empty"));
    }
    let tokens = tokenize(&request.text)?;

    Ok(TextAnalysis {
        sentiment: request
            .wants(TextFeature::Sentiment)
            .then(|| classify(score_tokens(&tokens))),
        key_phrases: request
            .wants(TextFeature::KeyPhrases)
            .then(|| extract_key_phrases(&tokens, &request.text, boost)),
        entities: if request.wants(TextFeature::Entities) {
            Some(extract_entities(&request.text)?)
        } else {
            None
        },
        language: request
            .wants(TextFeature::Language)
            .then(|| detect_language(&tokens)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;

    fn default_boost() -> Vec<String> {
        DEFAULT_KEY_PHRASE_BOOST.iter().map(|s| s.to_string()).collect()
    }

    fn sentiment_of(text: &str) -> Result<Sentiment, ProviderError> {
        Ok(classify(score_tokens(&tokenize(text)?)))
    }

    #[test]
    fn test_tokenize_keeps_contractions() -> Result<(), ProviderError> {
        let tokens = tokenize("I Don't like it, it\u{2019}s BROKEN!")?;
        assert_eq!(tokens, vec!["i", "don't", "like", "it", "it's", "broken"]);
        Ok(())
    }

    #[test]
    fn test_enthusiastic_review_is_positive() -> Result<(), ProviderError> {
        let s = sentiment_of("This product is absolutely amazing! I love it so much!")?;
        assert_eq!(s.overall, SentimentLabel::Positive);
        assert!(s.confidence_scores.positive > 0.6);
        Ok(())
    }

    #[test]
    fn test_negation_flips_polarity() -> Result<(), ProviderError> {
        let s = sentiment_of("not good")?;
        assert_eq!(s.overall, SentimentLabel::Negative);
        assert_eq!(s.confidence_scores.positive, 0.0);

        let s = sentiment_of("never disappointed")?;
        assert_eq!(s.overall, SentimentLabel::Positive);
        Ok(())
    }

    #[test]
    fn test_negation_outside_lookback_is_ignored() -> Result<(), ProviderError> {
        let mass = score_tokens(&tokenize("not the usual good")?);
        assert!(mass.positive > 0.0);
        assert_eq!(mass.negative, 0.0);
        Ok(())
    }

    #[test]
    fn test_intensity_scales_magnitude() -> Result<(), ProviderError> {
        let plain = score_tokens(&tokenize("terrible")?);
        let strong = score_tokens(&tokenize("extremely terrible")?);
        assert!((strong.negative - plain.negative * 1.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_tie_goes_to_neutral() -> Result<(), ProviderError> {
        // One positive, one negative, and a neutral mass that is lower than either.
        let s = sentiment_of("great awful")?;
        assert_eq!(s.overall, SentimentLabel::Neutral);
        Ok(())
    }

    #[test]
    fn test_plain_text_is_neutral() -> Result<(), ProviderError> {
        let s = sentiment_of("The package arrived on Tuesday in a box.")?;
        assert_eq!(s.overall, SentimentLabel::Neutral);
        assert!((s.confidence_scores.neutral - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_empty_text_is_invalid() {
        let req = TextRequest::new("   ");
        assert!(matches!(
            analyze(&req, &default_boost()),
            Err(ProviderError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_key_phrases_prefer_boosted_terms() -> Result<(), ProviderError> {
        let text = "Fast shipping and good quality. The customer service team answered quickly.";
        let phrases = extract_key_phrases(&tokenize(text)?, text, &default_boost());
        assert!(phrases.contains(&"fast shipping".to_string()), "{:?}", phrases);
        assert!(phrases.contains(&"good quality".to_string()), "{:?}", phrases);
        assert!(phrases.contains(&"customer service".to_string()), "{:?}", phrases);
        assert!(!phrases.contains(&"shipping".to_string()));
        assert!(phrases.len() <= MAX_KEY_PHRASES);
        Ok(())
    }

    #[test]
    fn test_key_phrases_skip_stopwords() -> Result<(), ProviderError> {
        let text = "the and of it was to";
        assert!(extract_key_phrases(&tokenize(text)?, text, &default_boost()).is_empty());
        Ok(())
    }

    #[test]
    fn test_custom_boost_list() -> Result<(), ProviderError> {
        let text = "Lovely glaze on this mug, the handle feels solid";
        let phrases = extract_key_phrases(&tokenize(text)?, text, &["glaze".to_string()]);
        assert_eq!(phrases.first().map(String::as_str), Some("lovely glaze"));
        Ok(())
    }

    #[test]
    fn test_entities() -> Result<(), ProviderError> {
        let text = "Ordered from Etsy on March 3rd, 2024 for $25.50 and got 20% off. \
                    Contact help@shop.example or visit https://shop.example/faq.";
        let entities = extract_entities(text)?;
        let find = |t: &str| entities.iter().find(|e| e.text == t).map(|e| e.entity_type.as_str());
        assert_eq!(find("Etsy"), Some("Organization"));
        assert_eq!(find("March 3rd, 2024"), Some("DateTime"));
        assert_eq!(find("$25.50"), Some("Quantity"));
        assert_eq!(find("20%"), Some("Quantity"));
        assert_eq!(find("help@shop.example"), Some("Email"));
        assert_eq!(find("https://shop.example/faq"), Some("URL"));
        assert_eq!(find("Ordered"), None);
        assert_eq!(find("Contact"), None);
        Ok(())
    }

    #[test]
    fn test_language_detection() -> Result<(), ProviderError> {
        let en = detect_language(&tokenize("This is the best mug and it was cheap")?);
        assert_eq!(en.iso6391_name, "en");
        let es = detect_language(&tokenize("El producto es muy bonito y la calidad es buena")?);
        assert_eq!(es.iso6391_name, "es");
        let fr = detect_language(&tokenize("Je suis très content, le produit est pour ma mère")?);
        assert_eq!(fr.iso6391_name, "fr");
        let de = detect_language(&tokenize("Das ist nicht gut und ich bin sehr traurig")?);
        assert_eq!(de.iso6391_name, "de");
        let none = detect_language(&tokenize("xyzzy plugh")?);
        assert_eq!((none.iso6391_name.as_str(), none.confidence), ("en", 0.5));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_confidences_sum_to_one(text in "[a-zA-Z' !.,]{1,200}") {
            prop_assume!(!text.trim().is_empty());
            let s = sentiment_of(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!((s.confidence_scores.sum() - 1.0).abs() < 1e-6);
            prop_assert!(s.confidence_scores.positive >= 0.0);
            prop_assert!(s.confidence_scores.negative >= 0.0);
        }

        #[test]
        fn prop_lexicon_text_sums_to_one(words in proptest::collection::vec(
            proptest::sample::select(vec!["very", "not", "great", "awful", "okay", "item", "never", "love"]),
            1..40,
        )) {
            let text = words.join(" ");
            let s = sentiment_of(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!((s.confidence_scores.sum() - 1.0).abs() < 1e-6);
        }
    }
}
