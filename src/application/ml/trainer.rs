use super::metrics::{AucScore, ConfusionMatrix, log_loss, roc_auc};
use super::solver::{SolverSettings, fit_logistic};
use crate::domain::errors::TrainingError;
use crate::domain::ml::{Dataset, FeatureScaler, FeatureSchema, FittedModel};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeighting {
    #[default]
    None,
    /// Inverse class frequency, `n / (2 * n_class)`.
    Balanced,
}

impl FromStr for ClassWeighting {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(ClassWeighting::None),
            "balanced" => Ok(ClassWeighting::Balanced),
            _ => anyhow::bail!("Invalid class weighting: {}. Must be 'none' or 'balanced'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub class_weighting: ClassWeighting,
    pub standardize: bool,
    pub solver: SolverSettings,
    /// Probability threshold for the reported confusion matrix.
    pub eval_threshold: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            class_weighting: ClassWeighting::None,
            standardize: false,
            solver: SolverSettings::default(),
            eval_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEntry {
    pub feature: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub schema_version: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_positives: usize,
    pub test_positives: usize,
    pub class_weighting: ClassWeighting,
    pub standardized: bool,
    pub auc: AucScore,
    pub confusion: ConfusionMatrix,
    pub log_loss: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Raw-feature coefficients, largest first.
    pub coefficients: Vec<CoefficientEntry>,
    pub intercept: f64,
}

impl TrainingReport {
    /// One-line summary stored alongside the registry entry. AUC keeps two
    /// decimals so rows written by earlier trainers stay comparable.
    pub fn summary(&self) -> String {
        match &self.auc {
            AucScore::Defined { value } => format!("LR baseline AUC {:.2}", value),
            AucScore::Undefined { .. } => "LR baseline AUC undefined".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub model: FittedModel,
    pub report: TrainingReport,
}

/// Fits the logistic Gatekeeper on a seeded train split and scores the
/// held-out rows. Identical (dataset, config) produce identical coefficients.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn train(
        &self,
        dataset: &Dataset,
        schema: &FeatureSchema,
    ) -> Result<TrainingRun, TrainingError> {
        let (train, test) = dataset.split(self.config.test_fraction, self.config.seed)?;

        if let [only] = train.classes().as_slice() {
            return Err(TrainingError::SingleClass { label: *only });
        }

        let weights = self.sample_weights(&train);
        let scaler = self
            .config
            .standardize
            .then(|| FeatureScaler::fit(train.features(), train.width()));
        let rows: Vec<Vec<f64>> = match &scaler {
            Some(s) => train.features().iter().map(|r| s.transform(r)).collect(),
            None => train.features().to_vec(),
        };

        info!(
            "Training on {} samples ({} positive), holding out {}",
            train.len(),
            train.positives(),
            test.len()
        );
        let outcome = fit_logistic(&rows, train.labels(), &weights, &self.config.solver)?;
        if !outcome.converged {
            warn!(
                "Logistic solver stopped after {} iterations without converging (objective {:.6})",
                outcome.iterations, outcome.objective
            );
        }

        let mut model = FittedModel::new(outcome.coefficients, outcome.intercept);
        if let Some(s) = scaler {
            model = model.with_scaler(s);
        }

        let probabilities: Vec<f64> = test
            .features()
            .iter()
            .map(|r| model.predict_proba(r))
            .collect();
        let auc = roc_auc(test.labels(), &probabilities);
        match &auc {
            AucScore::Defined { value } => info!("AUC: {:.4}", value),
            AucScore::Undefined { reason } => warn!("AUC undefined: {}", reason),
        }
        let confusion =
            ConfusionMatrix::at_threshold(test.labels(), &probabilities, self.config.eval_threshold);
        info!("Held-out @{}: {}", self.config.eval_threshold, confusion);

        let (raw_coefficients, raw_intercept) = model.raw_parameters();
        let mut coefficients: Vec<CoefficientEntry> = schema
            .features
            .iter()
            .zip(raw_coefficients)
            .map(|(def, coefficient)| CoefficientEntry {
                feature: def.name.clone(),
                coefficient,
            })
            .collect();
        coefficients.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));

        info!("Feature Importance:");
        for entry in &coefficients {
            info!("  {}: {:.4}", entry.feature, entry.coefficient);
        }

        let report = TrainingReport {
            schema_version: schema.version.clone(),
            seed: self.config.seed,
            test_fraction: self.config.test_fraction,
            train_rows: train.len(),
            test_rows: test.len(),
            train_positives: train.positives(),
            test_positives: test.positives(),
            class_weighting: self.config.class_weighting,
            standardized: model.scaler.is_some(),
            auc,
            confusion,
            log_loss: log_loss(test.labels(), &probabilities),
            iterations: outcome.iterations,
            converged: outcome.converged,
            coefficients,
            intercept: raw_intercept,
        };

        Ok(TrainingRun { model, report })
    }

    fn sample_weights(&self, train: &Dataset) -> Vec<f64> {
        match self.config.class_weighting {
            ClassWeighting::None => vec![1.0; train.len()],
            ClassWeighting::Balanced => {
                let n = train.len() as f64;
                let w_pos = n / (2.0 * train.positives() as f64);
                let w_neg = n / (2.0 * train.negatives() as f64);
                info!(
                    "Balanced class weights: positive={:.4} negative={:.4}",
                    w_pos, w_neg
                );
                train
                    .labels()
                    .iter()
                    .map(|&l| if l == 1 { w_pos } else { w_neg })
                    .collect()
            }
        }
    }
}
