use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EnergyRequirement {
    High,
    Medium,
    Low,
}

impl EnergyRequirement {
    /// Energy level a task of this class wants to be scheduled at.
    pub fn required_energy(&self) -> f64 {
        match self {
            EnergyRequirement::High => 0.8,
            EnergyRequirement::Medium => 0.5,
            EnergyRequirement::Low => 0.3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyRequirement::High => "high",
            EnergyRequirement::Medium => "medium",
            EnergyRequirement::Low => "low",
        }
    }
}

impl fmt::Display for EnergyRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers scheduling traits from free text (title plus description).
pub trait TaskClassifier: Send + Sync {
    fn classify_energy(&self, text: &str) -> EnergyRequirement;

    fn is_deep_work(&self, text: &str) -> bool;
}

static HIGH_ENERGY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:strateg\w*|design\w*|architect\w*|research\w*|analy[sz]\w*|writ(?:e|ing)|plan(?:ning)?|creat\w*|develop\w*|build\w*|complex|solv\w*|learn\w*|study|studying|present\w*)\b",
    )
    .expect("high-energy keyword pattern is valid")
});

static LOW_ENERGY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:e-?mails?|inbox|admin\w*|fil(?:e|ing)|organi[sz]\w*|call|calls|repl(?:y|ies)|expenses?|invoices?|routine|clean(?:up|ing)?|updates?|check\w*|errands?|tidy)\b",
    )
    .expect("low-energy keyword pattern is valid")
});

static DEEP_WORK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:deep|focus\w*|research\w*|writ(?:e|ing)|design\w*|architect\w*|develop\w*|cod(?:e|ing)|implement\w*|analy[sz]\w*|study|thesis|draft\w*)\b",
    )
    .expect("deep-work keyword pattern is valid")
});

/// Keyword heuristic; high-energy keywords win over low-energy ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl TaskClassifier for KeywordClassifier {
    fn classify_energy(&self, text: &str) -> EnergyRequirement {
        if HIGH_ENERGY_PATTERN.is_match(text) {
            EnergyRequirement::High
        } else if LOW_ENERGY_PATTERN.is_match(text) {
            EnergyRequirement::Low
        } else {
            EnergyRequirement::Medium
        }
    }

    fn is_deep_work(&self, text: &str) -> bool {
        DEEP_WORK_PATTERN.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_energy_from_keywords() {
        let classifier = KeywordClassifier;
        assert_eq!(
            classifier.classify_energy("Design the storage architecture"),
            EnergyRequirement::High
        );
        assert_eq!(
            classifier.classify_energy("Clear inbox and reply to emails"),
            EnergyRequirement::Low
        );
        assert_eq!(
            classifier.classify_energy("Team sync notes"),
            EnergyRequirement::Medium
        );
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let classifier = KeywordClassifier;
        // "profile" must not trip the low-energy "file" keyword.
        assert_eq!(
            classifier.classify_energy("Profile page copy"),
            EnergyRequirement::Medium
        );
        assert!(!classifier.is_deep_work("Decode receipts"));
        assert!(classifier.is_deep_work("Write chapter draft"));
    }
}
