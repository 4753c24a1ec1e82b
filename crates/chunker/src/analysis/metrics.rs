//! Content ratios, complexity score and content classification.

use serde::{Deserialize, Serialize};

use super::elements::LineKind;
use crate::config::{AnalysisConfig, ClassificationThresholds, ComplexityWeights};

/// Document or chunk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    CodeHeavy,
    ListHeavy,
    Mixed,
    Primary,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeHeavy => "code_heavy",
            Self::ListHeavy => "list_heavy",
            Self::Mixed => "mixed",
            Self::Primary => "primary",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content ratios, each in `[0, 1]`, summing to 1 for non-empty input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRatios {
    pub code: f64,
    pub text: f64,
    pub list: f64,
    pub table: f64,
}

impl ContentRatios {
    /// Compute ratios from per-line kinds and character counts.
    ///
    /// Every line contributes its characters plus one for its newline, so
    /// blank lines and headers count as text.
    pub(crate) fn from_lines(kinds: &[LineKind], line_chars: &[usize]) -> Self {
        let mut code = 0usize;
        let mut list = 0usize;
        let mut table = 0usize;
        let mut total = 0usize;

        for (kind, chars) in kinds.iter().zip(line_chars) {
            let weight = chars + 1;
            total += weight;
            match kind {
                LineKind::Code => code += weight,
                LineKind::List => list += weight,
                LineKind::Table => table += weight,
                LineKind::Blank | LineKind::Text | LineKind::Header => {}
            }
        }

        if total == 0 {
            return Self::default();
        }

        let total = total as f64;
        let code = code as f64 / total;
        let list = list as f64 / total;
        let table = table as f64 / total;
        let text = (1.0 - code - list - table).clamp(0.0, 1.0);

        Self {
            code,
            text,
            list,
            table,
        }
    }

    fn as_array(&self) -> [f64; 4] {
        [self.code, self.text, self.list, self.table]
    }

    /// Population variance of the four ratios, normalized to `[0, 1]`.
    ///
    /// The maximum (one ratio at 1, the rest at 0) is 3/16.
    pub fn normalized_variance(&self) -> f64 {
        let values = self.as_array();
        let mean = values.iter().sum::<f64>() / 4.0;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        (variance / (3.0 / 16.0)).clamp(0.0, 1.0)
    }
}

/// Classify content from its ratios.
pub fn classify(ratios: &ContentRatios, thresholds: &ClassificationThresholds) -> ContentType {
    if ratios.code >= thresholds.code_heavy {
        return ContentType::CodeHeavy;
    }

    if ratios.list >= thresholds.list_heavy && ratios.code < thresholds.minimal_code {
        return ContentType::ListHeavy;
    }

    let signals = [
        ratios.code > thresholds.mixed_component,
        ratios.list > thresholds.mixed_component,
        ratios.table > thresholds.mixed_component,
        ratios.text > thresholds.mixed_text,
    ];
    if signals.iter().filter(|&&s| s).count() >= 2 {
        return ContentType::Mixed;
    }

    ContentType::Primary
}

/// Composite complexity score in `[0, 1]`.
///
/// Header depth is scaled by 6 levels, list nesting saturates at 5 levels.
pub fn complexity_score(
    max_header_depth: u8,
    max_list_depth: usize,
    ratios: &ContentRatios,
    weights: &ComplexityWeights,
) -> f64 {
    let total_weight = weights.header_depth + weights.list_depth + weights.ratio_variance;
    if total_weight <= 0.0 {
        return 0.0;
    }

    let header = f64::from(max_header_depth.min(6)) / 6.0;
    let list = max_list_depth.min(5) as f64 / 5.0;
    let variance = ratios.normalized_variance();

    let score = header * weights.header_depth
        + list * weights.list_depth
        + variance * weights.ratio_variance;

    (score / total_weight).clamp(0.0, 1.0)
}

/// Classify a line range using the document's configured thresholds.
pub(crate) fn classify_lines(
    kinds: &[LineKind],
    line_chars: &[usize],
    config: &AnalysisConfig,
) -> ContentType {
    classify(&ContentRatios::from_lines(kinds, line_chars), &config.thresholds)
}
