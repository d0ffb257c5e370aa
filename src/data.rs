use crate::errors::GasvmError;
use log::{debug, info};
use rand::seq::index::sample;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Header names recognised as the label column (case-insensitive).
const LABEL_HEADERS: [&str; 3] = ["label", "class", "y"];

/// Labelled observations, one row per sample.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Vec<f64>,           // Row-major feature matrix
    pub y: Vec<u8>,            // Binary labels (0 or 1)
    pub features: Vec<String>, // Feature names from the header row
    pub row_ids: Vec<usize>,   // Row index of each sample in the source file
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    pub fn new() -> Data {
        Data {
            X: Vec::new(),
            y: Vec::new(),
            features: Vec::new(),
            row_ids: Vec::new(),
            feature_len: 0,
            sample_len: 0,
        }
    }

    /// Build a dataset from in-memory rows, checking shape and labels.
    pub fn from_rows(rows: Vec<Vec<f64>>, y: Vec<u8>) -> Result<Data, GasvmError> {
        if rows.len() != y.len() {
            return Err(GasvmError::data(format!(
                "{} rows but {} labels",
                rows.len(),
                y.len()
            )));
        }
        let feature_len = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != feature_len) {
            return Err(GasvmError::data(format!(
                "row {} has {} features, expected {}",
                bad,
                rows[bad].len(),
                feature_len
            )));
        }
        if let Some(bad) = y.iter().position(|&label| label > 1) {
            return Err(GasvmError::data(format!(
                "row {} has label {}, only 0 and 1 are supported",
                bad, y[bad]
            )));
        }

        let sample_len = rows.len();
        Ok(Data {
            X: rows.into_iter().flatten().collect(),
            y,
            features: (0..feature_len).map(|j| format!("feature{}", j)).collect(),
            row_ids: (0..sample_len).collect(),
            feature_len,
            sample_len,
        })
    }

    /// Load a delimited text file with a header row.
    ///
    /// Tab-separated for `.tsv`/`.txt`, comma-separated otherwise. The label column is the
    /// one named `label`, `class` or `y`, or the first column when none matches.
    pub fn load_data(path: &str) -> Result<Data, GasvmError> {
        info!("Loading dataset {}...", path);
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let delimiter = match extension.as_str() {
            "tsv" | "txt" => b'\t',
            _ => b',',
        };

        let file = File::open(path).map_err(|e| GasvmError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers = reader
            .headers()
            .map_err(|e| GasvmError::data(format!("{}: {}", path, e)))?
            .clone();
        if headers.len() < 2 {
            return Err(GasvmError::data(format!(
                "{}: expected a label column and at least one feature column",
                path
            )));
        }
        let label_column = headers
            .iter()
            .position(|h| LABEL_HEADERS.contains(&h.to_ascii_lowercase().as_str()))
            .unwrap_or(0);

        let mut data = Data::new();
        data.features = headers
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != label_column)
            .map(|(_, h)| h.to_string())
            .collect();
        data.feature_len = data.features.len();

        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| GasvmError::data(format!("{}: {}", path, e)))?;
            // header is line 1
            let line = i + 2;
            for (j, cell) in record.iter().enumerate() {
                let value: f64 = cell.parse().map_err(|_| {
                    GasvmError::data(format!(
                        "{}:{}: cannot parse '{}' in column '{}'",
                        path, line, cell, &headers[j]
                    ))
                })?;
                if j == label_column {
                    data.y.push(parse_label(value).ok_or_else(|| {
                        GasvmError::data(format!(
                            "{}:{}: label {} is not 0 or 1",
                            path, line, cell
                        ))
                    })?);
                } else {
                    data.X.push(value);
                }
            }
            data.row_ids.push(i);
            data.sample_len += 1;
        }

        if data.sample_len == 0 {
            return Err(GasvmError::data(format!("{}: no observation found", path)));
        }

        info!(
            "{} observations and {} features loaded ({} positive)",
            data.sample_len,
            data.feature_len,
            data.class_counts()[1]
        );
        Ok(data)
    }

    /// Check if another dataset can be scored by a model trained on this one
    pub fn check_compatibility(&self, other: &Data) -> bool {
        self.feature_len == other.feature_len
    }

    #[inline]
    pub fn row(&self, sample: usize) -> &[f64] {
        &self.X[sample * self.feature_len..(sample + 1) * self.feature_len]
    }

    /// filter Data for some samples (represented by a slice of indices)
    pub fn subset(&self, samples: &[usize]) -> Data {
        let mut X = Vec::with_capacity(samples.len() * self.feature_len);
        for &sample in samples {
            X.extend_from_slice(self.row(sample));
        }

        Data {
            X,
            y: samples.iter().map(|&i| self.y[i]).collect(),
            features: self.features.clone(),
            row_ids: samples.iter().map(|&i| self.row_ids[i]).collect(),
            feature_len: self.feature_len,
            sample_len: samples.len(),
        }
    }

    /// Number of observations labelled 0 and 1
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.y.iter().filter(|&&label| label == 1).count();
        [self.sample_len - positives, positives]
    }

    pub fn has_both_classes(&self) -> bool {
        let counts = self.class_counts();
        counts[0] > 0 && counts[1] > 0
    }

    /// Random training/validation partition: the first `floor(n × rate)` shuffled rows train.
    pub fn random_split(
        &self,
        training_rate: f64,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Data, Data), GasvmError> {
        let (training_len, validation_len) = split_sizes(self.sample_len, training_rate);
        if training_len == 0 || validation_len == 0 {
            return Err(GasvmError::data(format!(
                "splitting {} observations at rate {} leaves an empty partition ({} training / {} validation)",
                self.sample_len, training_rate, training_len, validation_len
            )));
        }

        let mut indices: Vec<usize> = (0..self.sample_len).collect();
        indices.shuffle(rng);
        let (training, validation) = indices.split_at_mut(training_len);
        training.sort_unstable();
        validation.sort_unstable();

        debug!(
            "Split {} observations into {} training / {} validation",
            self.sample_len, training_len, validation_len
        );
        Ok((self.subset(training), self.subset(validation)))
    }

    /// Draw `downsample_size(n, rate, maximum)` observations without replacement, kept in row order.
    pub fn downsample(&self, rate: f64, maximum: usize, rng: &mut ChaCha8Rng) -> Data {
        let target = downsample_size(self.sample_len, rate, maximum);
        let mut kept = sample(rng, self.sample_len, target).into_vec();
        kept.sort_unstable();
        self.subset(&kept)
    }

    /// SHA-256 of the feature values and labels, as lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.sample_len as u64).to_le_bytes());
        hasher.update((self.feature_len as u64).to_le_bytes());
        for value in &self.X {
            hasher.update(value.to_le_bytes());
        }
        hasher.update(&self.y);
        format!("{:x}", hasher.finalize())
    }
}

fn parse_label(value: f64) -> Option<u8> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Training and validation sizes for a split of `sample_len` rows at `training_rate`.
pub fn split_sizes(sample_len: usize, training_rate: f64) -> (usize, usize) {
    // 1e-9 absorbs representation error, e.g. 20 × 0.7
    let training_len = ((sample_len as f64 * training_rate + 1e-9).floor() as usize).min(sample_len);
    (training_len, sample_len - training_len)
}

/// Size of an rmv training side after downsampling.
pub fn downsample_size(sample_len: usize, rate: f64, maximum: usize) -> usize {
    let by_rate = ((sample_len as f64 * rate + 1e-9).floor() as usize).min(sample_len);
    by_rate.min(maximum)
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.class_counts();
        writeln!(
            f,
            "Features: {}   Samples: {}   Class 0: {}   Class 1: {}",
            self.feature_len, self.sample_len, counts[0], counts[1]
        )?;
        for i in (0..self.sample_len).take(10) {
            let row: String = self
                .row(i)
                .iter()
                .take(12)
                .map(|v| format!("{:.2}", v))
                .collect::<Vec<_>>()
                .join("\t");
            let ellipsis = if self.feature_len > 12 { "\t..." } else { "" };
            writeln!(f, "#{:<6} y={}  {}{}", self.row_ids[i], self.y[i], row, ellipsis)?;
        }
        if self.sample_len > 10 {
            writeln!(f, "...")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
