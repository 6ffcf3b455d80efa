//! Word-list classifier for running without a FinBERT service.
//!
//! Hits on financial positive/negative vocabulary become logits for a
//! three-way softmax with a unit neutral prior, so text without any known
//! vocabulary lands on "neutral" and scores exactly zero.

use async_trait::async_trait;
use forecast_core::{ClassProbabilities, ForecastError, SentimentClassifier};
use std::collections::HashSet;

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "dont", "doesnt", "didnt", "isnt", "arent",
    "wasnt", "werent", "wont", "wouldnt", "couldnt", "shouldnt", "hardly",
    "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "gains", "profit", "growth", "beat", "beats",
    "upgrade", "outperform", "strong", "positive", "rise", "increase",
    "breakthrough", "innovation", "success", "exceed", "exceeds", "momentum",
    "buy", "recommend", "optimistic", "record", "high", "advance",
    "dividend", "buyback", "repurchase", "accretive", "upside",
    "recovery", "rebound", "expansion", "robust", "accelerating",
    "overweight", "raised", "upgraded", "soar", "jump", "upbeat", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "losses", "fall", "plunge", "crash", "miss", "misses",
    "downgrade", "underperform", "weak", "negative", "drop", "decrease",
    "concern", "risk", "fail", "disappoint", "slump", "sell",
    "warning", "pessimistic", "low", "retreat", "fear", "trouble",
    "dilution", "dilutive", "headwind", "lawsuit", "litigation",
    "recall", "investigation", "probe", "default", "bankruptcy",
    "restructuring", "layoff", "layoffs", "downside", "overvalued", "bubble",
    "underweight", "lowered", "suspended", "fraud", "recession", "downgraded",
];

pub struct LexiconClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl LexiconClassifier {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Positive and negative hit counts, with polarity flipped inside a negation window.
    fn count_hits(&self, text: &str) -> (f64, f64) {
        let lower = text.to_lowercase();
        let words: Vec<String> = lower
            .split_whitespace()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(w.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut positive = 0.0;
        let mut negative = 0.0;
        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(word.as_str());
            let is_negative = self.negative.contains(word.as_str());
            if !is_positive && !is_negative {
                continue;
            }

            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);

            if is_positive != negated {
                positive += 1.0;
            } else {
                negative += 1.0;
            }
        }
        (positive, negative)
    }

    pub fn probabilities(&self, text: &str) -> Result<ClassProbabilities, ForecastError> {
        let (positive, negative) = self.count_hits(text);
        let logits = [negative, 1.0, positive];
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        ClassProbabilities::normalized(exps[0], exps[1], exps[2])
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ClassProbabilities, ForecastError> {
        self.probabilities(text)
    }

    fn backend_name(&self) -> &'static str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_vocabulary_is_exactly_neutral() {
        let p = LexiconClassifier::new().probabilities("The company held a meeting").unwrap();
        assert_eq!(p.net_score(), 0.0);
        assert_eq!(p.label(), "neutral");
    }

    #[test]
    fn test_positive_text() {
        let p = LexiconClassifier::new()
            .probabilities("Shares surge as profit beats estimates")
            .unwrap();
        assert!(p.net_score() > 0.5);
        assert_eq!(p.label(), "positive");
    }

    #[test]
    fn test_negative_text() {
        let p = LexiconClassifier::new()
            .probabilities("Analysts downgrade stock after revenue miss and layoffs")
            .unwrap();
        assert!(p.net_score() < -0.5);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let classifier = LexiconClassifier::new();
        let plain = classifier.probabilities("growth").unwrap().net_score();
        let negated = classifier.probabilities("no growth").unwrap().net_score();
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn test_balanced_hits_tie_at_zero() {
        let p = LexiconClassifier::new().probabilities("gain loss").unwrap();
        assert!(p.net_score().abs() < 1e-12);
    }
}
