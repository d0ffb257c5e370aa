use crate::data::Data;
use crate::errors::GasvmError;
use crate::fitness::ConfusionMatrix;
use crate::ga::GenerationStats;
use crate::individual::Individual;
use crate::param::{Param, ScenarioKind};
use crate::utils::mean_and_std;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//-----------------------------------------------------------------------------
// Report structures
//-----------------------------------------------------------------------------

/// Provenance of a dataset used by the experiment
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DatasetSummary {
    /// Path the dataset was read from, empty for in-memory data
    pub source: String,
    pub sample_len: usize,
    pub feature_len: usize,
    /// Observations labelled 0 and 1
    pub class_counts: [usize; 2],
    /// SHA-256 of the values and labels
    pub digest: String,
}

impl DatasetSummary {
    pub fn of(data: &Data, source: &str) -> DatasetSummary {
        DatasetSummary {
            source: source.to_string(),
            sample_len: data.sample_len,
            feature_len: data.feature_len,
            class_counts: data.class_counts(),
            digest: data.digest(),
        }
    }
}

/// Outcome of one restart
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunResult {
    /// Restart index
    pub restart: usize,
    pub population_size: usize,
    pub initial_fillup: usize,
    /// Seed of the run's random stream
    pub seed: u64,

    /// Size of the training pool the GA selected from
    pub training_size: usize,
    pub validation_size: usize,
    /// Source rows of the training pool, in pool order
    pub training_rows: Vec<usize>,
    /// Source rows kept by the champion
    pub selected_rows: Vec<usize>,

    /// Best individual of the run, over the training pool
    pub champion: Individual,
    pub best_fitness: f64,
    pub best_fillup: usize,
    /// Best fitness of each generation
    pub trace: Vec<f64>,
    pub generations: Vec<GenerationStats>,

    /// Champion's predictions on the validation set, None for a degenerate champion
    pub confusion: Option<ConfusionMatrix>,
    pub support_vectors: usize,

    /// Champion scored on the independent validation dataset, when one was given
    pub independent_fitness: Option<f64>,
    /// rmv only: fitness of an SVM trained on the whole downsampled training side
    pub baseline_fitness: Option<f64>,
}

/// A restart that ended with an error instead of a champion
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FailedRun {
    pub restart: usize,
    pub population_size: usize,
    pub initial_fillup: usize,
    pub seed: u64,
    pub error: String,
}

/// Best fitness statistics across the restarts of one (population size, fill-up) configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConfigurationSummary {
    pub population_size: usize,
    pub initial_fillup: usize,
    pub restarts: usize,
    pub mean_best_fitness: f64,
    pub std_best_fitness: f64,
    pub max_best_fitness: f64,
    pub mean_baseline_fitness: Option<f64>,
}

/// Complete experiment data and results
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e., destination stem, scenario and timestamp
    pub id: String,
    /// Timestamp of the experiment
    pub timestamp: String,
    /// gasvm version and git hash used
    pub version: String,
    pub scenario: ScenarioKind,
    /// Parameters used
    pub parameters: Param,

    /// Dataset the training pools were drawn from
    pub dataset: DatasetSummary,
    /// If provided, the external validation dataset
    pub validation: Option<DatasetSummary>,

    /// One entry per run, ordered by restart index, then population size, then initial fill-up
    pub runs: Vec<RunResult>,
    /// Restarts that failed while their siblings completed, in job order
    #[serde(default)]
    pub failures: Vec<FailedRun>,
    /// One entry per configuration, in order of first appearance in `runs`
    pub summaries: Vec<ConfigurationSummary>,

    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    /// Aggregate runs per (population size, initial fill-up)
    pub fn summarize(runs: &[RunResult]) -> Vec<ConfigurationSummary> {
        let mut configurations: Vec<(usize, usize)> = Vec::new();
        for run in runs {
            let key = (run.population_size, run.initial_fillup);
            if !configurations.contains(&key) {
                configurations.push(key);
            }
        }

        configurations
            .into_iter()
            .map(|(population_size, initial_fillup)| {
                let matching: Vec<&RunResult> = runs
                    .iter()
                    .filter(|r| r.population_size == population_size && r.initial_fillup == initial_fillup)
                    .collect();
                let fits: Vec<f64> = matching.iter().map(|r| r.best_fitness).collect();
                let baselines: Vec<f64> = matching.iter().filter_map(|r| r.baseline_fitness).collect();
                let (mean, std) = mean_and_std(&fits);
                ConfigurationSummary {
                    population_size,
                    initial_fillup,
                    restarts: matching.len(),
                    mean_best_fitness: mean,
                    std_best_fitness: std,
                    max_best_fitness: fits.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    mean_baseline_fitness: if baselines.is_empty() {
                        None
                    } else {
                        Some(mean_and_std(&baselines).0)
                    },
                }
            })
            .collect()
    }

    /// Run with the highest best fitness, first in run order on ties
    pub fn best_run(&self) -> Option<&RunResult> {
        self.runs.iter().fold(None, |best: Option<&RunResult>, run| match best {
            Some(b) if b.best_fitness >= run.best_fitness => Some(b),
            _ => Some(run),
        })
    }

    pub fn display_results(&self) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "\n=============== Experiment {} ===============\n\n",
            self.id
        ));
        text.push_str(&format!("gasvm version: v{}\n", self.version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Scenario: {}\n", self.scenario));
        text.push_str(&format!(
            "Dataset: {} ({} observations, {} features, sha256 {})\n",
            self.dataset.source,
            self.dataset.sample_len,
            self.dataset.feature_len,
            &self.dataset.digest[..12.min(self.dataset.digest.len())]
        ));
        if let Some(validation) = &self.validation {
            text.push_str(&format!(
                "Validation dataset: {} ({} observations)\n",
                validation.source, validation.sample_len
            ));
        }
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!("Runs: {}\n", self.runs.len()));
        for failure in &self.failures {
            text.push_str(&format!(
                "\x1b[1;91mFailed\x1b[0m restart #{} (population {}, fillup {}): {}\n",
                failure.restart, failure.population_size, failure.initial_fillup, failure.error
            ));
        }
        text.push('\n');

        for summary in &self.summaries {
            text.push_str(&format!(
                "\x1b[1;93mpopulation {} | fillup {}\x1b[0m | {} restarts | best fitness {:.4} ± {:.4} (max {:.4})",
                summary.population_size,
                summary.initial_fillup,
                summary.restarts,
                summary.mean_best_fitness,
                summary.std_best_fitness,
                summary.max_best_fitness
            ));
            if let Some(baseline) = summary.mean_baseline_fitness {
                text.push_str(&format!(" | baseline {:.4}", baseline));
            }
            text.push('\n');
        }

        if let Some(best) = self.best_run() {
            text.push_str(&format!(
                "\nBest run: restart #{} (population {}, fillup {}) fitness {:.4} with {}/{} observations\n",
                best.restart,
                best.population_size,
                best.initial_fillup,
                best.best_fitness,
                best.best_fillup,
                best.training_size
            ));
            if let Some(confusion) = best.confusion {
                text.push_str(&format!(
                    "Validation: accuracy {:.3} | sensitivity {:.3} | specificity {:.3} | dice {:.3} | TP {} TN {} FP {} FN {}\n",
                    confusion.accuracy(),
                    confusion.sensitivity(),
                    confusion.specificity(),
                    confusion.dice(),
                    confusion.true_positive,
                    confusion.true_negative,
                    confusion.false_positive,
                    confusion.false_negative
                ));
            }
            if let Some(independent) = best.independent_fitness {
                text.push_str(&format!("Independent validation fitness: {:.4}\n", independent));
            }
        }

        text
    }

    //-----------------------------------------------------------------------------
    // Saving and loading
    //-----------------------------------------------------------------------------

    /// Saves the experiment, choosing the format from the file extension.
    ///
    /// `json` is pretty-printed JSON, `yaml`/`yml` is YAML and `bin`/`bincode` is bincode.
    /// Other extensions fall back to JSON.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<(), GasvmError> {
        let path = path.as_ref();
        let bytes = match extension_of(path).as_str() {
            "json" => self.to_json()?,
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| GasvmError::Report(e.to_string()))?
                .into_bytes(),
            "bin" | "bincode" => bincode::serialize(self).map_err(|e| GasvmError::Report(e.to_string()))?,
            other => {
                warn!("Unknown report extension '{}'. Saving experiment as JSON.", other);
                self.to_json()?
            }
        };
        std::fs::write(path, bytes).map_err(|e| GasvmError::io(path, e))?;
        info!("Experiment saved to {}", path.display());
        Ok(())
    }

    fn to_json(&self) -> Result<Vec<u8>, GasvmError> {
        serde_json::to_vec_pretty(self).map_err(|e| GasvmError::Report(e.to_string()))
    }

    /// Loads an experiment written by [`Experiment::save_auto`].
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self, GasvmError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| GasvmError::io(path, e))?;
        match extension_of(path).as_str() {
            "yaml" | "yml" => serde_yaml::from_slice(&bytes).map_err(|e| GasvmError::Report(e.to_string())),
            "bin" | "bincode" => bincode::deserialize(&bytes).map_err(|e| GasvmError::Report(e.to_string())),
            _ => serde_json::from_slice(&bytes).map_err(|e| GasvmError::Report(e.to_string())),
        }
    }

    /// Write one CSV per run with its per-generation statistics.
    ///
    /// Files are named `<stem>_restart<r>_pop<p>_fillup<f>.csv` inside `directory`.
    pub fn save_traces_csv(&self, directory: &Path, stem: &str) -> Result<Vec<PathBuf>, GasvmError> {
        let mut written = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let path = directory.join(format!(
                "{}_restart{}_pop{}_fillup{}.csv",
                stem, run.restart, run.population_size, run.initial_fillup
            ));
            let mut writer = csv::Writer::from_path(&path)
                .map_err(|e| GasvmError::Report(format!("{}: {}", path.display(), e)))?;
            for stats in &run.generations {
                writer
                    .serialize(stats)
                    .map_err(|e| GasvmError::Report(format!("{}: {}", path.display(), e)))?;
            }
            writer.flush().map_err(|e| GasvmError::io(&path, e))?;
            written.push(path);
        }
        info!("{} generation traces written to {}", written.len(), directory.display());
        Ok(written)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
