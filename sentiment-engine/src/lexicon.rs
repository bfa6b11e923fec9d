use mentionwatch_core::LexiconConfig;

pub const POSITIVE_WORDS: &[&str] = &[
    "good",
    "great",
    "excellent",
    "amazing",
    "awesome",
    "love",
    "best",
    "helpful",
    "recommend",
    "effective",
    "impressed",
    "happy",
    "fantastic",
    "wonderful",
    "quality",
    "reliable",
    "legit",
    "trustworthy",
    "improved",
    "benefit",
    "success",
    "solid",
    "perfect",
    "favorite",
    "exciting",
    "grateful",
    "worth it",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "horrible",
    "worst",
    "hate",
    "scam",
    "fraud",
    "fake",
    "waste",
    "useless",
    "disappoint",
    "poor",
    "broken",
    "ripoff",
    "rip off",
    "overpriced",
    "avoid",
    "complaint",
    "refund",
    "lawsuit",
    "misleading",
    "lying",
    "sketchy",
    "dangerous",
    "side effect",
    "scheme",
];

/// Red-flag terms that force a negative verdict regardless of anything else.
pub const PRIORITY_NEGATIVE: &[&str] = &["scam", "fraud", "fake", "pyramid", "mlm", "scheme"];

/// High-signal terms that force a positive verdict when no red flag is present.
pub const PRIORITY_POSITIVE: &[&str] = &[
    "breakthrough",
    "innovation",
    "promising",
    "clinical trial",
    "funding",
    "investment",
];

/// The four term lists the keyword scorer works from. All entries are stored
/// lower-cased so matching only has to lower-case the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub priority_negative: Vec<String>,
    pub priority_positive: Vec<String>,
}

fn normalize(terms: &[impl AsRef<str>]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            positive: normalize(POSITIVE_WORDS),
            negative: normalize(NEGATIVE_WORDS),
            priority_negative: normalize(PRIORITY_NEGATIVE),
            priority_positive: normalize(PRIORITY_POSITIVE),
        }
    }
}

impl Lexicon {
    /// Built-in lists, with any list present in `config` replacing its default.
    pub fn from_config(config: &LexiconConfig) -> Self {
        let defaults = Self::default();
        let pick = |custom: &Option<Vec<String>>, default: Vec<String>| match custom {
            Some(terms) => normalize(terms),
            None => default,
        };
        Self {
            positive: pick(&config.positive, defaults.positive),
            negative: pick(&config.negative, defaults.negative),
            priority_negative: pick(&config.priority_negative, defaults.priority_negative),
            priority_positive: pick(&config.priority_positive, defaults.priority_positive),
        }
    }
}
