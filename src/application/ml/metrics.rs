//! Held-out evaluation metrics for the Gatekeeper classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Area under the ROC curve, or the reason it cannot be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AucScore {
    Defined { value: f64 },
    Undefined { reason: String },
}

impl AucScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            AucScore::Defined { value } => Some(*value),
            AucScore::Undefined { .. } => None,
        }
    }
}

impl fmt::Display for AucScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AucScore::Defined { value } => write!(f, "{:.4}", value),
            AucScore::Undefined { .. } => write!(f, "undefined"),
        }
    }
}

/// ROC AUC of `probabilities` against binary `labels`.
///
/// A set with a single class has no ranking to measure, so the score is
/// `Undefined` instead of a fabricated 0.0 / 1.0.
pub fn roc_auc(labels: &[u8], probabilities: &[f64]) -> AucScore {
    if labels.is_empty() || labels.len() != probabilities.len() {
        return AucScore::Undefined {
            reason: format!(
                "{} labels for {} predictions",
                labels.len(),
                probabilities.len()
            ),
        };
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == labels.len() {
        let class = u8::from(positives > 0);
        return AucScore::Undefined {
            reason: format!(
                "held-out partition contains only class {} ({} rows)",
                class,
                labels.len()
            ),
        };
    }

    let y_true: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
    let y_score: Vec<f64> = probabilities.to_vec();
    let value = smartcore::metrics::roc_auc_score(&y_true, &y_score);
    AucScore::Defined { value }
}

/// Binary confusion matrix at a fixed probability threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_count: usize,
}

impl ConfusionMatrix {
    /// Class 1 = approve. A prediction is positive when `p >= threshold`.
    pub fn at_threshold(labels: &[u8], probabilities: &[f64], threshold: f64) -> Self {
        let mut m = Self::default();
        for (&label, &p) in labels.iter().zip(probabilities) {
            match (p >= threshold, label == 1) {
                (true, true) => m.tp += 1,
                (true, false) => m.fp += 1,
                (false, false) => m.tn += 1,
                (false, true) => m.fn_count += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_count
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_count)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acc={:.4} prec={:.4} rec={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy(),
            self.precision(),
            self.recall(),
            self.tp,
            self.fp,
            self.tn,
            self.fn_count,
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Mean binary cross-entropy, probabilities clipped to `[1e-15, 1 - 1e-15]`.
pub fn log_loss(labels: &[u8], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let eps = 1e-15;
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auc_known_value() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]);
        assert!((auc.value().unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_auc_perfect_ranking() {
        let auc = roc_auc(&[0, 1, 0, 1], &[0.2, 0.9, 0.1, 0.7]);
        assert!((auc.value().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_auc_single_class_is_undefined() {
        let auc = roc_auc(&[1, 1, 1], &[0.2, 0.9, 0.5]);
        assert!(matches!(auc, AucScore::Undefined { .. }));
        assert_eq!(auc.value(), None);
        assert_eq!(auc.to_string(), "undefined");

        assert!(roc_auc(&[0, 0], &[0.2, 0.3]).value().is_none());
        assert!(roc_auc(&[], &[]).value().is_none());
    }

    #[test]
    fn test_confusion_matrix_counts() {
        // 3 TP, 1 FP, 2 TN, 1 FN
        let labels = [1, 1, 1, 0, 0, 0, 1];
        let probs = [0.9, 0.5, 0.7, 0.6, 0.1, 0.49, 0.2];
        let m = ConfusionMatrix::at_threshold(&labels, &probs, 0.5);
        assert_eq!(m.tp, 3);
        assert_eq!(m.fp, 1);
        assert_eq!(m.tn, 2);
        assert_eq!(m.fn_count, 1);
        assert!((m.accuracy() - 5.0 / 7.0).abs() < 1e-9);
        assert!((m.precision() - 0.75).abs() < 1e-9);
        assert!((m.recall() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_empty_confusion_matrix() {
        let m = ConfusionMatrix::at_threshold(&[], &[], 0.5);
        assert_eq!(m.total(), 0);
        assert_eq!(m.accuracy(), 0.0);
    }

    #[test]
    fn test_log_loss_of_coin_flip() {
        let loss = log_loss(&[0, 1], &[0.5, 0.5]);
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-12);
    }
}
