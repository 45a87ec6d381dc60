use crate::domain::errors::{DatasetError, TrainingError};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Ordered indicator values for one candidate signal. Positional: index `i`
/// belongs to the schema's `i`-th feature.
pub type FeatureVector = Vec<f64>;

/// A feature vector with its binary outcome (1 = approve, 0 = reject).
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub features: FeatureVector,
    pub label: u8,
}

/// Row-major labeled feature table with a fixed width.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    width: usize,
    features: Vec<FeatureVector>,
    labels: Vec<u8>,
}

impl Dataset {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            features: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn from_examples(width: usize, examples: Vec<LabeledExample>) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(width);
        for example in examples {
            dataset.push(example)?;
        }
        Ok(dataset)
    }

    pub fn push(&mut self, example: LabeledExample) -> Result<(), DatasetError> {
        if example.features.len() != self.width {
            return Err(DatasetError::FeatureCount {
                expected: self.width,
                found: example.features.len(),
            });
        }
        self.features.push(example.features);
        self.labels.push(u8::from(example.label != 0));
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }

    /// Present label classes, sorted.
    pub fn classes(&self) -> Vec<u8> {
        let mut classes = Vec::with_capacity(2);
        if self.negatives() > 0 {
            classes.push(0);
        }
        if self.positives() > 0 {
            classes.push(1);
        }
        classes
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            width: self.width,
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Seeded shuffle split into (train, held-out).
    ///
    /// The held-out size is `ceil(n * test_fraction)`, clamped so that both
    /// partitions keep at least one row.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self), TrainingError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(TrainingError::InvalidTestFraction(test_fraction));
        }
        let n = self.len();
        if n < 2 {
            return Err(TrainingError::NotEnoughRows {
                required: 2,
                available: n,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
        let (test_idx, train_idx) = indices.split_at(n_test);
        Ok((self.select(train_idx), self.select(test_idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(n: usize) -> Dataset {
        let examples = (0..n)
            .map(|i| LabeledExample {
                features: vec![i as f64, (i * 2) as f64],
                label: (i % 2) as u8,
            })
            .collect();
        Dataset::from_examples(2, examples).unwrap()
    }

    #[test]
    fn test_push_rejects_wrong_width() {
        let mut ds = Dataset::new(3);
        let res = ds.push(LabeledExample {
            features: vec![1.0, 2.0],
            label: 1,
        });
        assert!(matches!(
            res,
            Err(DatasetError::FeatureCount {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_split_sizes() {
        let ds = toy(100);
        let (train, test) = ds.split(0.2, 42).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        // ceil(11 * 0.2) = 3
        let (train, test) = toy(11).split(0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let ds = toy(50);
        let (a_train, a_test) = ds.split(0.2, 7).unwrap();
        let (b_train, b_test) = ds.split(0.2, 7).unwrap();
        assert_eq!(a_train, b_train);
        assert_eq!(a_test, b_test);

        let mut ids: Vec<i64> = a_train
            .features()
            .iter()
            .chain(a_test.features().iter())
            .map(|f| f[0] as i64)
            .collect();
        ids.sort();
        assert_eq!(ids, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_split_keeps_both_partitions_non_empty() {
        let (train, test) = toy(2).split(0.9, 1).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        assert!(matches!(
            toy(10).split(1.0, 1),
            Err(TrainingError::InvalidTestFraction(_))
        ));
        assert!(toy(1).split(0.2, 1).is_err());
    }
}
