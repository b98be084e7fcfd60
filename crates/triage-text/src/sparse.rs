use std::collections::HashMap;
use std::hash::Hasher;

use tantivy::tokenizer::TextAnalyzer;
use twox_hash::XxHash64;

use triage_core::traits::SparseEncoder;
use triage_core::types::SparseVector;
use triage_core::Result;

use crate::tantivy_utils::{analyze, build_analyzer};

/// Term-frequency lexical encoder.
///
/// Terms come from the shared tantivy analyzer and are hashed into the `u32`
/// index space, so no vocabulary has to be persisted next to the store.
/// Weights are `1 + ln(tf)`, L2-normalised per text.
#[derive(Clone)]
pub struct LexicalEncoder {
    analyzer: TextAnalyzer,
}

impl Default for LexicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalEncoder {
    pub fn new() -> Self {
        Self { analyzer: build_analyzer() }
    }

    pub fn term_id(term: &str) -> u32 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(term.as_bytes());
        hasher.finish() as u32
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        analyze(&self.analyzer, text)
    }
}

impl SparseEncoder for LexicalEncoder {
    fn encode(&self, text: &str) -> Result<SparseVector> {
        let mut tf: HashMap<u32, u32> = HashMap::new();
        for term in self.terms(text) {
            *tf.entry(Self::term_id(&term)).or_insert(0) += 1;
        }
        let weighted: Vec<(u32, f32)> =
            tf.into_iter().map(|(id, n)| (id, 1.0 + (n as f32).ln())).collect();
        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Ok(SparseVector::default());
        }
        let vector = SparseVector::from_pairs(weighted.into_iter().map(|(id, w)| (id, w / norm)))?;
        tracing::trace!(terms = vector.len(), "encoded sparse vector");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_and_case_are_ignored() {
        let enc = LexicalEncoder::new();
        assert_eq!(enc.terms("How do I RESET the Password?"), vec!["reset", "password"]);
    }

    #[test]
    fn encoding_is_deterministic_and_normalised() {
        let enc = LexicalEncoder::new();
        let a = enc.encode("login page crashes on submit").unwrap();
        let b = enc.encode("login page crashes on submit").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.values().iter().map(|w| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn repeated_terms_weigh_more() {
        let enc = LexicalEncoder::new();
        let v = enc.encode("crash crash crash login").unwrap();
        let crash = LexicalEncoder::term_id("crash");
        let login = LexicalEncoder::term_id("login");
        let weight = |id: u32| {
            let pos = v.indices().iter().position(|i| *i == id).unwrap();
            v.values()[pos]
        };
        assert!(weight(crash) > weight(login));
    }

    #[test]
    fn only_stop_words_gives_empty_vector() {
        let enc = LexicalEncoder::new();
        assert!(enc.encode("what is the").unwrap().is_empty());
    }

    #[test]
    fn overlapping_texts_have_positive_similarity() {
        let enc = LexicalEncoder::new();
        let q = enc.encode("password reset").unwrap();
        let d = enc.encode("The password reset email never arrived").unwrap();
        let other = enc.encode("Dark mode looks great").unwrap();
        assert!(q.dot(&d) > 0.0);
        assert_eq!(q.dot(&other), 0.0);
    }
}
