//! Word-boundary keyword matching shared by the query classifiers.

/// Split lower-cased text into words. Hyphens stay inside a word so terms
/// like `rna-seq` survive; every other non-alphanumeric character separates.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// A keyword or phrase, matched word by word against a query.
///
/// Each keyword word must start a query word, and phrase words must be
/// consecutive. So `tree` matches "trees" but not "street", and the stem
/// `phylogen` matches "phylogenetic".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Keyword {
    words: Vec<String>,
}

impl Keyword {
    /// `None` when `text` has no words.
    pub(crate) fn parse(text: &str) -> Option<Self> {
        let words = words(text);
        (!words.is_empty()).then_some(Self { words })
    }

    pub(crate) fn matches(&self, query_words: &[String]) -> bool {
        query_words.windows(self.words.len()).any(|window| {
            window
                .iter()
                .zip(&self.words)
                .all(|(query_word, keyword)| query_word.starts_with(keyword.as_str()))
        })
    }
}
