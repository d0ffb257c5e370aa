use crate::errors::GasvmError;
use crate::param::{self, Param, ScenarioKind};
use clap::Parser;

/// Command-line options. Every option overrides the value read from `--Param`.
#[derive(Debug, Clone, Default, Parser)]
#[command(author, version, about = "Genetic selection of SVM training subsets")]
pub struct Cli {
    /// Parameter file (YAML, or TOML with a .toml extension)
    #[arg(long = "Param", value_name = "FILE")]
    pub param: Option<String>,

    /// base, tss or rmv
    #[arg(long = "Scenario")]
    pub scenario: Option<ScenarioKind>,
    /// Labelled dataset to select training observations from
    #[arg(long = "Source", value_name = "FILE")]
    pub source: Option<String>,
    /// Report path; the extension picks the format (json, yaml, bin)
    #[arg(long = "Destination", value_name = "FILE")]
    pub destination: Option<String>,
    /// External validation dataset
    #[arg(long = "Validation", value_name = "FILE")]
    pub validation: Option<String>,

    #[arg(long = "TrainingSetSplitRate")]
    pub training_set_split_rate: Option<f64>,
    /// rmv only
    #[arg(long = "DownsampleTrainingRate")]
    pub downsample_training_rate: Option<f64>,
    /// rmv only
    #[arg(long = "MaximumSubsetSize")]
    pub maximum_subset_size: Option<usize>,

    #[arg(long = "MutationRate")]
    pub mutation_rate: Option<f64>,
    #[arg(long = "BitSwapRate")]
    pub bit_swap_rate: Option<f64>,
    #[arg(long = "PreservationRate")]
    pub preservation_rate: Option<f64>,
    #[arg(long = "GenerationsNumber")]
    pub generations_number: Option<usize>,
    #[arg(long = "NumberOfRestarts")]
    pub number_of_restarts: Option<usize>,
    #[arg(long = "Seed")]
    pub seed: Option<u64>,
    #[arg(long = "NumberOfCores")]
    pub number_of_cores: Option<usize>,
    #[arg(long = "MinimalFillup")]
    pub minimal_fillup: Option<usize>,
    #[arg(long = "MaximalFillup")]
    pub maximal_fillup: Option<usize>,
    #[arg(long = "SvmIterations")]
    pub svm_iterations: Option<usize>,
    #[arg(long = "SvmTolerance")]
    pub svm_tolerance: Option<f64>,
    /// Comma-separated list, e.g. 10,20,50
    #[arg(long = "PopulationSizes", value_delimiter = ',', num_args = 1..)]
    pub population_sizes: Option<Vec<usize>>,
    /// Comma-separated list, e.g. 4,8
    #[arg(long = "InitialFillups", value_delimiter = ',', num_args = 1..)]
    pub initial_fillups: Option<Vec<usize>>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "LogLevel")]
    pub log_level: Option<String>,
    /// Write one CSV of generation statistics per run next to the report
    #[arg(long = "SaveTraces")]
    pub save_traces: bool,
}

impl Cli {
    /// Merge the parameter file (or defaults) with the command line, then validate.
    pub fn into_param(self) -> Result<Param, GasvmError> {
        let mut param = match &self.param {
            Some(path) => param::load(path)?,
            None => Param::default(),
        };
        self.apply(&mut param);
        param::validate(&mut param)?;
        Ok(param)
    }

    fn apply(self, param: &mut Param) {
        if let Some(v) = self.scenario {
            param.general.scenario = v;
        }
        if let Some(v) = self.seed {
            param.general.seed = v;
        }
        if let Some(v) = self.number_of_cores {
            param.general.thread_number = v;
        }
        if let Some(v) = self.log_level {
            param.general.log_level = v;
        }
        if self.save_traces {
            param.general.save_traces = true;
        }

        if let Some(v) = self.source {
            param.data.source = v;
        }
        if let Some(v) = self.destination {
            param.data.destination = v;
        }
        if let Some(v) = self.validation {
            param.data.validation = v;
        }
        if let Some(v) = self.training_set_split_rate {
            param.data.training_set_split_rate = v;
        }
        if let Some(v) = self.downsample_training_rate {
            param.data.downsample_training_rate = v;
        }
        if let Some(v) = self.maximum_subset_size {
            param.data.maximum_subset_size = v;
        }

        if let Some(v) = self.population_sizes {
            param.ga.population_sizes = v;
        }
        if let Some(v) = self.initial_fillups {
            param.ga.initial_fillups = v;
        }
        if let Some(v) = self.generations_number {
            param.ga.generations_number = v;
        }
        if let Some(v) = self.number_of_restarts {
            param.ga.number_of_restarts = v;
        }
        if let Some(v) = self.mutation_rate {
            param.ga.mutation_rate = v;
        }
        if let Some(v) = self.bit_swap_rate {
            param.ga.bit_swap_rate = v;
        }
        if let Some(v) = self.preservation_rate {
            param.ga.preservation_rate = v;
        }
        if let Some(v) = self.minimal_fillup {
            param.ga.minimal_fillup = v;
        }
        if let Some(v) = self.maximal_fillup {
            param.ga.maximal_fillup = v;
        }

        if let Some(v) = self.svm_iterations {
            param.svm.iterations = v;
        }
        if let Some(v) = self.svm_tolerance {
            param.svm.tolerance = v;
        }
    }
}
