//! Heuristic for queries that ask about recent or current information,
//! which a web search serves better than a model's training data.
//!
//! The orchestrator only reports the verdict on the response; it never
//! performs a search itself.

use crate::keyword::{Keyword, words};

/// Decides whether a query would benefit from a web search.
pub trait SearchAdvisor: Send + Sync {
    fn should_search(&self, query: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct SearchHeuristic {
    triggers: Vec<Keyword>,
}

impl SearchHeuristic {
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            triggers: triggers
                .into_iter()
                .filter_map(|t| Keyword::parse(t.as_ref()))
                .collect(),
        }
    }
}

impl Default for SearchHeuristic {
    fn default() -> Self {
        Self::new([
            "latest",
            "recent",
            "recently",
            "current",
            "news",
            "today",
            "this year",
            "new release",
            "just published",
            "up to date",
            "what's new",
            "search for",
            "look up",
        ])
    }
}

impl SearchAdvisor for SearchHeuristic {
    fn should_search(&self, query: &str) -> bool {
        let query_words = words(query);
        self.triggers.iter().any(|t| t.matches(&query_words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_words_trigger_search() {
        let h = SearchHeuristic::default();
        assert!(h.should_search("What are the latest CRISPR papers?"));
        assert!(h.should_search("any news on AlphaFold 3"));
        assert!(h.should_search("Look up the current release of BLAST+"));
    }

    #[test]
    fn timeless_questions_do_not() {
        let h = SearchHeuristic::default();
        assert!(!h.should_search("What is GC content?"));
        assert!(!h.should_search("explain Needleman-Wunsch"));
    }

    #[test]
    fn custom_triggers() {
        let h = SearchHeuristic::new(["Preprint"]);
        assert!(h.should_search("find a preprint on this"));
        assert!(!h.should_search("latest results"));
    }
}
