//! Trainer settings parsed from environment variables.

use super::EnvSource;
use crate::application::ml::solver::SolverSettings;
use crate::application::ml::trainer::{ClassWeighting, TrainerConfig};
use anyhow::{Context, Result};
use std::str::FromStr;

/// Training environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingEnvConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub class_weighting: ClassWeighting,
    pub standardize: bool,
    pub l2_penalty: f64,
    pub max_iter: usize,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        let trainer = TrainerConfig::default();
        Self {
            seed: trainer.seed,
            test_fraction: trainer.test_fraction,
            class_weighting: trainer.class_weighting,
            standardize: trainer.standardize,
            l2_penalty: trainer.solver.l2_penalty,
            max_iter: trainer.solver.max_iter,
        }
    }
}

impl TrainingEnvConfig {
    pub(crate) fn from_source(source: &EnvSource) -> Result<Self> {
        let defaults = Self::default();

        let class_weighting = match source.get("GATEKEEPER_CLASS_WEIGHT") {
            Some(raw) => ClassWeighting::from_str(&raw)?,
            None => defaults.class_weighting,
        };

        let test_fraction = source.parse_f64("GATEKEEPER_TEST_FRACTION", defaults.test_fraction)?;
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            anyhow::bail!(
                "GATEKEEPER_TEST_FRACTION must be strictly between 0 and 1, got {}",
                test_fraction
            );
        }

        let l2_penalty = source.parse_f64("GATEKEEPER_L2", defaults.l2_penalty)?;
        if !(l2_penalty.is_finite() && l2_penalty >= 0.0) {
            anyhow::bail!("GATEKEEPER_L2 must be a non-negative number, got {}", l2_penalty);
        }

        Ok(Self {
            seed: source
                .parse_u64("GATEKEEPER_SEED", defaults.seed)
                .context("Invalid training seed")?,
            test_fraction,
            class_weighting,
            standardize: source.parse_bool("GATEKEEPER_STANDARDIZE", defaults.standardize),
            l2_penalty,
            max_iter: source.parse_usize("GATEKEEPER_MAX_ITER", defaults.max_iter)?,
        })
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            seed: self.seed,
            test_fraction: self.test_fraction,
            class_weighting: self.class_weighting,
            standardize: self.standardize,
            solver: SolverSettings {
                l2_penalty: self.l2_penalty,
                max_iter: self.max_iter,
                ..SolverSettings::default()
            },
            ..TrainerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_defaults() {
        let config = TrainingEnvConfig::from_source(&EnvSource::empty()).unwrap();
        assert_eq!(config, TrainingEnvConfig::default());
        assert_eq!(config.seed, 42);
        assert!((config.test_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.class_weighting, ClassWeighting::None);
        assert!(!config.standardize);
    }

    #[test]
    fn test_training_config_overrides() {
        let source = EnvSource::from_pairs(&[
            ("GATEKEEPER_SEED", "7"),
            ("GATEKEEPER_TEST_FRACTION", "0.25"),
            ("GATEKEEPER_CLASS_WEIGHT", "balanced"),
            ("GATEKEEPER_STANDARDIZE", "true"),
            ("GATEKEEPER_L2", "0.5"),
        ]);
        let config = TrainingEnvConfig::from_source(&source).unwrap();
        let trainer = config.trainer_config();
        assert_eq!(trainer.seed, 7);
        assert!((trainer.test_fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(trainer.class_weighting, ClassWeighting::Balanced);
        assert!(trainer.standardize);
        assert!((trainer.solver.l2_penalty - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_range_test_fraction_rejected() {
        for raw in ["0", "1", "1.5", "-0.1"] {
            let source = EnvSource::from_pairs(&[("GATEKEEPER_TEST_FRACTION", raw)]);
            assert!(TrainingEnvConfig::from_source(&source).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_bad_seed_is_an_error() {
        let source = EnvSource::from_pairs(&[("GATEKEEPER_SEED", "forty-two")]);
        assert!(TrainingEnvConfig::from_source(&source).is_err());
    }
}
