/// Reports which tracked terms appear in a piece of text.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    terms: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Self {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let lowered = terms.iter().map(|t| t.to_lowercase()).collect();
        Self { terms, lowered }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Case-insensitive substring match. Returned terms keep their configured
    /// casing and order.
    pub fn find_matches(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let text = text.to_lowercase();
        self.terms
            .iter()
            .zip(&self.lowered)
            .filter(|(_, needle)| text.contains(needle.as_str()))
            .map(|(term, _)| term.clone())
            .collect()
    }
}

/// One-shot form of [`KeywordMatcher::find_matches`].
pub fn match_keywords<S: AsRef<str>>(text: &str, terms: &[S]) -> Vec<String> {
    KeywordMatcher::new(terms).find_matches(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_keeps_configured_casing() {
        assert_eq!(match_keywords("I love LifeX products", &["lifex"]), vec!["lifex"]);
        assert!(match_keywords("no match here", &["lifex"]).is_empty());
    }

    #[test]
    fn test_multiple_terms_in_configured_order() {
        let matcher = KeywordMatcher::new(&["LifeX Research", "LifeX"]);
        let found = matcher.find_matches("Anyone tried lifex? lifex research just posted");
        assert_eq!(found, vec!["LifeX Research".to_string(), "LifeX".to_string()]);

        let found = matcher.find_matches("LIFEX only");
        assert_eq!(found, vec!["LifeX".to_string()]);
    }

    #[test]
    fn test_empty_inputs() {
        let matcher = KeywordMatcher::new(&["LifeX", "  "]);
        assert_eq!(matcher.terms().len(), 1);
        assert!(matcher.find_matches("").is_empty());

        let nothing: [&str; 0] = [];
        assert!(match_keywords("LifeX", &nothing).is_empty());
    }
}
