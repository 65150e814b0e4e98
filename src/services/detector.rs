//! Detector de pré-apontamento
//!
//! Heurística, não parser: conta quantos rótulos de campo distintos e quantos
//! padrões de separador distintos aparecem no texto. Falso positivo vira
//! "revisão manual" mais adiante; falso negativo só faz a mensagem ser ignorada.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Rótulos de campo (comparados em minúsculas)
pub const INDICATORS: [&str; 6] = ["data:", "projeto:", "empresa:", "serviço:", "fazenda:", "talhão:"];

/// Separadores visuais. Uma linha longa de traços casa os dois primeiros.
pub const SEPARATORS: [&str; 3] = ["-------------", "---", "========"];

pub const MIN_INDICATORS: usize = 3;
pub const MIN_SEPARATORS: usize = 2;

static INDICATOR_MATCHER: Lazy<AhoCorasick> =
    Lazy::new(|| AhoCorasick::new(INDICATORS).expect("indicadores fixos são padrões válidos"));

static SEPARATOR_MATCHER: Lazy<AhoCorasick> =
    Lazy::new(|| AhoCorasick::new(SEPARATORS).expect("separadores fixos são padrões válidos"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionScore {
    pub indicators: usize,
    pub separators: usize,
}

impl DetectionScore {
    pub fn is_report(&self) -> bool {
        self.indicators >= MIN_INDICATORS || self.separators >= MIN_SEPARATORS
    }
}

fn distinct_patterns(matcher: &AhoCorasick, haystack: &str) -> usize {
    matcher
        .find_overlapping_iter(haystack)
        .map(|m| m.pattern())
        .collect::<HashSet<_>>()
        .len()
}

pub fn score(text: &str) -> DetectionScore {
    let lower = text.to_lowercase();
    DetectionScore {
        indicators: distinct_patterns(&INDICATOR_MATCHER, &lower),
        separators: distinct_patterns(&SEPARATOR_MATCHER, text),
    }
}

/// O texto parece um pré-apontamento?
pub fn detect(text: &str) -> bool {
    let result = score(text);
    tracing::debug!(
        "🔍 Detector: {} indicadores, {} separadores",
        result.indicators,
        result.separators
    );
    result.is_report()
}
