//! Swappable pattern lists behind the scoring heuristics
//!
//! Every regex list the scorers match against (fillers, politeness markers,
//! complexity connectives, advanced-grammar markers) lives here as
//! configuration, not inlined logic, so the heuristics can be tuned per
//! locale or replaced wholesale without touching the scoring algorithms.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProgressError;

/// The raw, serializable pattern lists. Entries are regex fragments joined
/// into one case-insensitive, word-bounded alternation per list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicPatterns {
    pub fillers: Vec<String>,
    pub politeness: Vec<String>,
    pub connectives: Vec<String>,
    pub advanced_grammar: Vec<String>,
}

impl Default for HeuristicPatterns {
    fn default() -> Self {
        Self {
            fillers: [
                "um", "uh", "erm", "like", "you know", "so", "well", "basically", "actually",
            ]
            .map(String::from)
            .to_vec(),
            politeness: [
                "please",
                "thank you",
                "thanks",
                "sorry",
                "excuse me",
                "pardon",
                "would you",
                "could you",
                "may i",
                "i wonder if",
            ]
            .map(String::from)
            .to_vec(),
            connectives: [
                "although",
                "however",
                "moreover",
                "furthermore",
                "nevertheless",
                "whereas",
                "on the one hand",
                "on the other hand",
                "in contrast",
            ]
            .map(String::from)
            .to_vec(),
            advanced_grammar: [
                "would have",
                "could have",
                "should have",
                "might have",
                "if i were",
                "had i known",
                "has been",
                "have been",
                "had been",
                "is being",
                "are being",
                "was being",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Compiled scoring heuristics.
#[derive(Debug, Clone)]
pub struct ScoringHeuristics {
    patterns: HeuristicPatterns,
    fillers: Regex,
    politeness: Regex,
    connectives: Regex,
    advanced_grammar: Regex,
}

impl ScoringHeuristics {
    /// Compile a pattern set.
    pub fn compile(patterns: HeuristicPatterns) -> Result<Self, ProgressError> {
        Ok(Self {
            fillers: compile_list(&patterns.fillers)?,
            politeness: compile_list(&patterns.politeness)?,
            connectives: compile_list(&patterns.connectives)?,
            advanced_grammar: compile_list(&patterns.advanced_grammar)?,
            patterns,
        })
    }

    /// Load pattern lists from a TOML document and compile them.
    pub fn from_toml_str(s: &str) -> Result<Self, ProgressError> {
        let patterns: HeuristicPatterns = toml::from_str(s)?;
        Self::compile(patterns)
    }

    /// The raw lists backing this compiled set.
    #[must_use]
    pub fn patterns(&self) -> &HeuristicPatterns {
        &self.patterns
    }

    /// Number of filler-word matches in a text.
    #[must_use]
    pub fn filler_count(&self, text: &str) -> usize {
        self.fillers.find_iter(text).count()
    }

    /// Whether a text contains at least one politeness marker.
    #[must_use]
    pub fn has_politeness_marker(&self, text: &str) -> bool {
        self.politeness.is_match(text)
    }

    /// Number of complexity-connective matches in a text.
    #[must_use]
    pub fn connective_count(&self, text: &str) -> usize {
        self.connectives.find_iter(text).count()
    }

    /// Number of advanced-grammar marker matches in a text.
    #[must_use]
    pub fn advanced_grammar_count(&self, text: &str) -> usize {
        self.advanced_grammar.find_iter(text).count()
    }
}

impl Default for ScoringHeuristics {
    fn default() -> Self {
        // The built-in lists are valid patterns
        Self::compile(HeuristicPatterns::default())
            .expect("default heuristic patterns must compile")
    }
}

fn compile_list(entries: &[String]) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b(?:{})\b", entries.join("|")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_heuristics_compile() {
        let h = ScoringHeuristics::default();
        assert!(!h.patterns().fillers.is_empty());
    }

    #[test]
    fn filler_count_is_case_insensitive_and_word_bounded() {
        let h = ScoringHeuristics::default();
        assert_eq!(h.filler_count("Um, well, I think so"), 3);
        // "summer" must not match "um"
        assert_eq!(h.filler_count("summer is nice"), 0);
    }

    #[test]
    fn politeness_markers_detected() {
        let h = ScoringHeuristics::default();
        assert!(h.has_politeness_marker("Could you help me, please?"));
        assert!(h.has_politeness_marker("I wonder if that works"));
        assert!(!h.has_politeness_marker("give me the menu"));
    }

    #[test]
    fn connectives_and_advanced_grammar_counted() {
        let h = ScoringHeuristics::default();
        assert_eq!(
            h.connective_count("However, the plan failed; moreover, it was late"),
            2
        );
        assert_eq!(
            h.advanced_grammar_count("I would have gone if I were free"),
            2
        );
    }

    #[test]
    fn heuristics_load_from_toml() {
        let toml = r#"
            fillers = ["hm"]
            politeness = ["por favor"]
            connectives = ["sin embargo"]
            advanced_grammar = ["hubiera"]
        "#;
        let h = ScoringHeuristics::from_toml_str(toml).unwrap();
        assert_eq!(h.filler_count("hm, hm"), 2);
        assert!(h.has_politeness_marker("un cafe por favor"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let patterns = HeuristicPatterns {
            fillers: vec!["(unclosed".to_string()],
            ..HeuristicPatterns::default()
        };
        assert!(ScoringHeuristics::compile(patterns).is_err());
    }
}
