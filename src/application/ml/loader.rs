use crate::domain::errors::DatasetError;
use crate::domain::ml::{Dataset, FeatureSchema, LabeledExample, SyntheticRange};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_SYNTHETIC_ROWS: usize = 100;
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;

/// Where the rows of a dataset came from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Synthetic { rows: usize, seed: u64 },
}

impl DataSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, DataSource::Synthetic { .. })
    }

    /// Value stamped into the artifact's `data_source` metadata.
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::File(_) => "file",
            DataSource::Synthetic { .. } => "synthetic",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Synthetic { rows, seed } => {
                write!(f, "synthetic ({} rows, seed {})", rows, seed)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub source: DataSource,
}

/// Settings for the stand-in dataset used when the export file is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFallback {
    pub rows: usize,
    pub seed: u64,
}

impl Default for SyntheticFallback {
    fn default() -> Self {
        Self {
            rows: DEFAULT_SYNTHETIC_ROWS,
            seed: DEFAULT_SYNTHETIC_SEED,
        }
    }
}

/// Reads labeled feature tables laid out according to a [`FeatureSchema`].
///
/// The CSV is not self-describing: column `i` is the schema's `i`-th feature
/// and the last column is the label.
pub struct FeatureFrameLoader {
    schema: FeatureSchema,
}

impl FeatureFrameLoader {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn load(&self, path: &Path) -> Result<Dataset, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::NotFound {
                path: path.display().to_string(),
            });
        }
        let file = File::open(path).map_err(|e| DatasetError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let dataset = self.load_from_reader(BufReader::new(file), &path.display().to_string())?;
        info!(
            "Loaded dataset with {} samples from {:?} ({} positive)",
            dataset.len(),
            path,
            dataset.positives()
        );
        Ok(dataset)
    }

    pub fn load_from_reader<R: Read>(&self, reader: R, origin: &str) -> Result<Dataset, DatasetError> {
        let expected = self.schema.column_count();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(self.schema.has_headers)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut dataset = Dataset::new(self.schema.feature_count());
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| DatasetError::Io {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(idx as u64 + 1);

            if record.len() != expected {
                return Err(DatasetError::ColumnCount {
                    line,
                    expected,
                    found: record.len(),
                });
            }

            let mut features = Vec::with_capacity(self.schema.feature_count());
            for (def, raw) in self.schema.features.iter().zip(record.iter()) {
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DatasetError::InvalidNumber {
                        line,
                        column: def.name.clone(),
                        value: raw.to_string(),
                    })?;
                features.push(value);
            }

            let raw_label = &record[expected - 1];
            let label = parse_label(raw_label).ok_or_else(|| DatasetError::InvalidLabel {
                line,
                value: raw_label.to_string(),
            })?;

            dataset.push(LabeledExample { features, label })?;
        }

        if dataset.is_empty() {
            return Err(DatasetError::Empty);
        }
        Ok(dataset)
    }

    /// Deterministic stand-in rows drawn from each feature's synthetic range,
    /// with uniformly random labels.
    pub fn synthesize(&self, rows: usize, seed: u64) -> Result<Dataset, DatasetError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut examples = Vec::with_capacity(rows);

        for _ in 0..rows {
            let features = self
                .schema
                .features
                .iter()
                .map(|def| match def.synthetic {
                    SyntheticRange::Uniform { low, high } => rng.random_range(low..high),
                    SyntheticRange::Binary => f64::from(rng.random_range(0..2u8)),
                })
                .collect();
            let label = rng.random_range(0..2u8);
            examples.push(LabeledExample { features, label });
        }
        Dataset::from_examples(self.schema.feature_count(), examples)
    }

    /// Loads `path`, substituting a synthetic dataset when the file does not
    /// exist and a fallback is given. Any other failure is returned as is.
    pub fn load_or_synthesize(
        &self,
        path: &Path,
        fallback: Option<SyntheticFallback>,
    ) -> Result<LoadedDataset, DatasetError> {
        match self.load(path) {
            Ok(dataset) => Ok(LoadedDataset {
                dataset,
                source: DataSource::File(path.to_path_buf()),
            }),
            Err(DatasetError::NotFound { path: missing }) => match fallback {
                Some(SyntheticFallback { rows, seed }) => {
                    warn!(
                        "Dataset not found at {}. Falling back to synthetic dataset ({} rows, seed {}).",
                        missing, rows, seed
                    );
                    Ok(LoadedDataset {
                        dataset: self.synthesize(rows, seed)?,
                        source: DataSource::Synthetic { rows, seed },
                    })
                }
                None => Err(DatasetError::NotFound { path: missing }),
            },
            Err(e) => Err(e),
        }
    }
}

fn parse_label(raw: &str) -> Option<u8> {
    match raw.to_ascii_lowercase().as_str() {
        "0" | "false" => Some(0),
        "1" | "true" => Some(1),
        other => match other.parse::<f64>().ok()? {
            v if v == 0.0 => Some(0),
            v if v == 1.0 => Some(1),
            _ => None,
        },
    }
}
