use serde::{Deserialize, Serialize};

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Per-feature standardisation fitted on the training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl FeatureScaler {
    /// Population mean and standard deviation per column. Constant columns get
    /// a scale of 1 so they pass through centred but unscaled.
    pub fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2);
            }
        }
        for s in scales.iter_mut() {
            *s = (*s / n).sqrt();
            if !s.is_finite() || *s < 1e-12 {
                *s = 1.0;
            }
        }

        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }
}

/// Logistic decision boundary: `p = sigmoid(coefficients · x + intercept)`.
///
/// When a scaler is present the coefficients live in standardized space and
/// [`FittedModel::raw_parameters`] folds the scaler back into raw-feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scaler: Option<FeatureScaler>,
}

impl FittedModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
            scaler: None,
        }
    }

    pub fn with_scaler(mut self, scaler: FeatureScaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    /// Linear score on raw features.
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let scaled;
        let x = match &self.scaler {
            Some(scaler) => {
                scaled = scaler.transform(features);
                scaled.as_slice()
            }
            None => features,
        };
        self.coefficients
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.intercept
    }

    /// Approve probability.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.decision_function(features))
    }

    /// Coefficients and intercept expressed on raw features:
    /// `w' = w / s`, `b' = b - sum(w * m / s)`.
    pub fn raw_parameters(&self) -> (Vec<f64>, f64) {
        match &self.scaler {
            None => (self.coefficients.clone(), self.intercept),
            Some(scaler) => {
                let mut intercept = self.intercept;
                let coefficients = self
                    .coefficients
                    .iter()
                    .zip(&scaler.means)
                    .zip(&scaler.scales)
                    .map(|((w, m), s)| {
                        intercept -= w * m / s;
                        w / s
                    })
                    .collect();
                (coefficients, intercept)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_model_is_neutral() {
        let model = FittedModel::new(vec![0.0; 4], 0.0);
        assert_eq!(model.predict_proba(&[1.0, -3.0, 99.0, 0.1]), 0.5);
    }

    #[test]
    fn test_folding_matches_scaled_prediction() {
        let rows = vec![
            vec![10.0, 0.01],
            vec![30.0, 0.03],
            vec![50.0, -0.02],
            vec![70.0, 0.00],
        ];
        let scaler = FeatureScaler::fit(&rows, 2);
        let model = FittedModel::new(vec![0.8, -1.3], 0.25).with_scaler(scaler);
        let (w, b) = model.raw_parameters();

        for row in &rows {
            let raw = sigmoid(w[0] * row[0] + w[1] * row[1] + b);
            assert!((raw - model.predict_proba(row)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0]];
        let scaler = FeatureScaler::fit(&rows, 1);
        assert_eq!(scaler.means, vec![5.0]);
        assert_eq!(scaler.scales, vec![1.0]);
    }
}
