use crate::errors::GasvmError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum FitFunction {
    accuracy,
    dice,
    g_mean,
    sensitivity,
    specificity,
    ppv,
    npv,
}

/// How the dataset is partitioned before the restarts are launched
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// One fixed split, sweep over population sizes × initial fill-ups
    Base,
    /// Like base, with an optional external validation dataset
    Tss,
    /// A new split and downsample for every restart
    Rmv,
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(ScenarioKind::Base),
            "tss" => Ok(ScenarioKind::Tss),
            "rmv" => Ok(ScenarioKind::Rmv),
            other => Err(format!("unknown scenario '{}' (expected base, tss or rmv)", other)),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioKind::Base => "base",
            ScenarioKind::Tss => "tss",
            ScenarioKind::Rmv => "rmv",
        };
        write!(f, "{}", name)
    }
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub svm: Svm,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "scenario_default", alias = "Scenario")]
    pub scenario: ScenarioKind,
    #[serde(default = "seed_default", alias = "Seed")]
    pub seed: u64,
    #[serde(default = "one_default", alias = "NumberOfCores")]
    pub thread_number: usize,
    #[serde(default = "fit_default")]
    pub fit: FitFunction,
    #[serde(default = "empty_string")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "false_default")]
    pub save_traces: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string", alias = "Source")]
    pub source: String,
    #[serde(default = "empty_string", alias = "Destination")]
    pub destination: String,
    #[serde(default = "empty_string", alias = "Validation")]
    pub validation: String,
    #[serde(default = "training_set_split_rate_default", alias = "TrainingSetSplitRate")]
    pub training_set_split_rate: f64,
    #[serde(default = "downsample_training_rate_default", alias = "DownsampleTrainingRate")]
    pub downsample_training_rate: f64,
    #[serde(default = "unbounded_default", alias = "MaximumSubsetSize")]
    pub maximum_subset_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "population_sizes_default", alias = "PopulationSizes")]
    pub population_sizes: Vec<usize>,
    #[serde(default = "initial_fillups_default", alias = "InitialFillups")]
    pub initial_fillups: Vec<usize>,
    #[serde(default = "generations_number_default", alias = "GenerationsNumber")]
    pub generations_number: usize,
    #[serde(default = "number_of_restarts_default", alias = "NumberOfRestarts")]
    pub number_of_restarts: usize,
    #[serde(default = "mutation_rate_default", alias = "MutationRate")]
    pub mutation_rate: f64,
    #[serde(default = "bit_swap_rate_default", alias = "BitSwapRate")]
    pub bit_swap_rate: f64,
    #[serde(default = "preservation_rate_default", alias = "PreservationRate")]
    pub preservation_rate: f64,
    #[serde(default = "one_default", alias = "MinimalFillup")]
    pub minimal_fillup: usize,
    #[serde(default = "unbounded_default", alias = "MaximalFillup")]
    pub maximal_fillup: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Svm {
    /// Validated and recorded with the report; the SMO solver keeps its own iteration ceiling
    #[serde(default = "svm_iterations_default", alias = "SvmIterations")]
    pub iterations: usize,
    #[serde(default = "svm_tolerance_default", alias = "SvmTolerance")]
    pub tolerance: f64,
    #[serde(default = "svm_cost_default")]
    pub cost: f64,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Svm {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read a parameter file (TOML for `.toml`, YAML otherwise) without validating it.
pub fn load(param_file: &str) -> Result<Param, GasvmError> {
    let content = std::fs::read_to_string(param_file).map_err(|e| GasvmError::io(param_file, e))?;
    let is_toml = Path::new(param_file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        toml::from_str(&content)
            .map_err(|e| GasvmError::configuration(format!("{}: {}", param_file, e)))
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| GasvmError::configuration(format!("{}: {}", param_file, e)))
    }
}

pub fn get(param_file: &str) -> Result<Param, GasvmError> {
    let mut config = load(param_file)?;
    validate(&mut config)?;
    Ok(config)
}

/// Reject configurations that cannot run, before any dataset is opened.
pub fn validate(param: &mut Param) -> Result<(), GasvmError> {
    if param.general.log_base.len() > 0 {
        param.general.display_colorful = false;
    }

    if param.data.source.is_empty() {
        return Err(GasvmError::configuration("Source is required"));
    }
    if param.data.destination.is_empty() {
        return Err(GasvmError::configuration("Destination is required"));
    }
    if param.general.thread_number == 0 {
        return Err(GasvmError::configuration("NumberOfCores must be at least 1"));
    }

    let ga = &param.ga;
    if ga.population_sizes.is_empty() {
        return Err(GasvmError::configuration("PopulationSizes cannot be empty"));
    }
    if ga.initial_fillups.is_empty() {
        return Err(GasvmError::configuration("InitialFillups cannot be empty"));
    }
    if ga.population_sizes.contains(&0) {
        return Err(GasvmError::configuration("PopulationSizes must be positive"));
    }
    if ga.generations_number == 0 {
        return Err(GasvmError::configuration("GenerationsNumber must be at least 1"));
    }
    if ga.number_of_restarts == 0 {
        return Err(GasvmError::configuration("NumberOfRestarts must be at least 1"));
    }
    if ga.minimal_fillup == 0 {
        return Err(GasvmError::configuration("MinimalFillup must be at least 1"));
    }
    if ga.minimal_fillup > ga.maximal_fillup {
        return Err(GasvmError::configuration(format!(
            "MinimalFillup ({}) is greater than MaximalFillup ({})",
            ga.minimal_fillup, ga.maximal_fillup
        )));
    }
    if let Some(fillup) = ga
        .initial_fillups
        .iter()
        .find(|&&f| f < ga.minimal_fillup || f > ga.maximal_fillup)
    {
        return Err(GasvmError::configuration(format!(
            "InitialFillup {} is outside [{}, {}]",
            fillup, ga.minimal_fillup, ga.maximal_fillup
        )));
    }

    for (name, rate) in [
        ("MutationRate", ga.mutation_rate),
        ("BitSwapRate", ga.bit_swap_rate),
        ("PreservationRate", ga.preservation_rate),
    ] {
        check_rate(name, rate, true)?;
    }
    check_rate("TrainingSetSplitRate", param.data.training_set_split_rate, false)?;

    if param.svm.iterations == 0 {
        return Err(GasvmError::configuration("SvmIterations must be at least 1"));
    }
    if !(param.svm.tolerance > 0.0) {
        return Err(GasvmError::configuration("SvmTolerance must be positive"));
    }
    if !(param.svm.cost > 0.0) {
        return Err(GasvmError::configuration("svm cost must be positive"));
    }

    match param.general.scenario {
        ScenarioKind::Rmv => {
            check_rate("DownsampleTrainingRate", param.data.downsample_training_rate, false)?;
            if param.data.maximum_subset_size == 0 {
                return Err(GasvmError::configuration("MaximumSubsetSize must be at least 1"));
            }
            if ga.population_sizes.len() > 1 || ga.initial_fillups.len() > 1 {
                warn!(
                    "rmv runs a single configuration: only PopulationSizes[0]={} and InitialFillups[0]={} are used",
                    ga.population_sizes[0], ga.initial_fillups[0]
                );
            }
        }
        ScenarioKind::Base | ScenarioKind::Tss => {
            if param.data.downsample_training_rate != downsample_training_rate_default()
                || param.data.maximum_subset_size != unbounded_default()
            {
                warn!("DownsampleTrainingRate and MaximumSubsetSize only apply to the rmv scenario");
            }
        }
    }

    if param.general.scenario == ScenarioKind::Base && !param.data.validation.is_empty() {
        warn!("Validation dataset is only used for an independent score of each champion in the base scenario");
    }

    Ok(())
}

/// Rates live in [0, 1]; split-like rates must also be non-zero.
fn check_rate(name: &str, rate: f64, zero_allowed: bool) -> Result<(), GasvmError> {
    let lower_ok = if zero_allowed { rate >= 0.0 } else { rate > 0.0 };
    if lower_ok && rate <= 1.0 {
        Ok(())
    } else {
        Err(GasvmError::configuration(format!(
            "{} must be in {}0, 1], got {}",
            name,
            if zero_allowed { "[" } else { "(" },
            rate
        )))
    }
}

// Default values

fn scenario_default() -> ScenarioKind {
    ScenarioKind::Base
}
fn seed_default() -> u64 {
    0
}
fn empty_string() -> String {
    "".to_string()
}
fn fit_default() -> FitFunction {
    FitFunction::accuracy
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn one_default() -> usize {
    1
}
fn unbounded_default() -> usize {
    usize::MAX
}
fn true_default() -> bool {
    true
}
fn false_default() -> bool {
    false
}
fn training_set_split_rate_default() -> f64 {
    0.7
}
fn downsample_training_rate_default() -> f64 {
    0.5
}
fn population_sizes_default() -> Vec<usize> {
    vec![10]
}
fn initial_fillups_default() -> Vec<usize> {
    vec![4]
}
fn generations_number_default() -> usize {
    50
}
fn number_of_restarts_default() -> usize {
    30
}
fn mutation_rate_default() -> f64 {
    0.1
}
fn bit_swap_rate_default() -> f64 {
    0.1
}
fn preservation_rate_default() -> f64 {
    0.3
}
fn svm_iterations_default() -> usize {
    100
}
fn svm_tolerance_default() -> f64 {
    1e-6
}
fn svm_cost_default() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_params() -> Param {
        let mut param = Param::default();
        param.data.source = "observations.csv".to_string();
        param.data.destination = "report.json".to_string();
        param
    }

    fn write_temp_param(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("gasvm_param_{}_{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_defaults() {
        let param = Param::default();
        assert_eq!(param.general.scenario, ScenarioKind::Base);
        assert_eq!(param.general.seed, 0);
        assert_eq!(param.general.thread_number, 1);
        assert_eq!(param.data.training_set_split_rate, 0.7);
        assert_eq!(param.ga.mutation_rate, 0.1);
        assert_eq!(param.ga.bit_swap_rate, 0.1);
        assert_eq!(param.ga.preservation_rate, 0.3);
        assert_eq!(param.ga.generations_number, 50);
        assert_eq!(param.ga.number_of_restarts, 30);
        assert_eq!(param.ga.population_sizes, vec![10]);
        assert_eq!(param.ga.initial_fillups, vec![4]);
        assert_eq!(param.ga.minimal_fillup, 1);
        assert_eq!(param.ga.maximal_fillup, usize::MAX);
        assert_eq!(param.svm.iterations, 100);
        assert_eq!(param.svm.tolerance, 1e-6);
    }

    #[test]
    fn test_validate_requires_source_and_destination() {
        let mut param = Param::default();
        param.data.destination = "report.json".to_string();
        let err = validate(&mut param).unwrap_err();
        assert!(matches!(err, GasvmError::Configuration(ref m) if m.contains("Source")), "got {}", err);

        let mut param = Param::default();
        param.data.source = "observations.csv".to_string();
        let err = validate(&mut param).unwrap_err();
        assert!(matches!(err, GasvmError::Configuration(ref m) if m.contains("Destination")), "got {}", err);

        assert!(validate(&mut create_test_params()).is_ok());
    }

    #[test]
    fn test_validate_fillup_rules() {
        let mut param = create_test_params();
        param.ga.minimal_fillup = 5;
        param.ga.maximal_fillup = 3;
        assert!(validate(&mut param).is_err(), "minimal > maximal must be rejected");

        let mut param = create_test_params();
        param.ga.minimal_fillup = 2;
        param.ga.maximal_fillup = 6;
        param.ga.initial_fillups = vec![4, 7];
        assert!(validate(&mut param).is_err(), "initial fill-up above maximal must be rejected");

        let mut param = create_test_params();
        param.ga.initial_fillups = vec![];
        assert!(validate(&mut param).is_err());

        let mut param = create_test_params();
        param.ga.population_sizes = vec![];
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_validate_rates_and_counts() {
        let mut param = create_test_params();
        param.ga.mutation_rate = 1.5;
        assert!(validate(&mut param).is_err());

        let mut param = create_test_params();
        param.ga.mutation_rate = 0.0;
        assert!(validate(&mut param).is_ok(), "a zero mutation rate is allowed");

        let mut param = create_test_params();
        param.data.training_set_split_rate = 0.0;
        assert!(validate(&mut param).is_err());

        let mut param = create_test_params();
        param.general.thread_number = 0;
        assert!(validate(&mut param).is_err());

        let mut param = create_test_params();
        param.general.scenario = ScenarioKind::Rmv;
        param.data.maximum_subset_size = 0;
        assert!(validate(&mut param).is_err());
    }

    #[test]
    fn test_log_file_disables_colors() {
        let mut param = create_test_params();
        param.general.log_base = "gasvm".to_string();
        validate(&mut param).unwrap();
        assert!(!param.general.display_colorful);
    }

    #[test]
    fn test_get_yaml_accepts_option_names() {
        let path = write_temp_param(
            "options.yaml",
            "general:\n  Scenario: rmv\n  Seed: 42\n  NumberOfCores: 2\n\
             data:\n  Source: in.csv\n  Destination: out.json\n  MaximumSubsetSize: 50\n\
             ga:\n  PopulationSizes: [10, 20]\n  InitialFillups: [4]\n  GenerationsNumber: 5\n",
        );
        let param = get(&path).unwrap();
        assert_eq!(param.general.scenario, ScenarioKind::Rmv);
        assert_eq!(param.general.seed, 42);
        assert_eq!(param.general.thread_number, 2);
        assert_eq!(param.data.maximum_subset_size, 50);
        assert_eq!(param.ga.population_sizes, vec![10, 20]);
        assert_eq!(param.ga.generations_number, 5);
        assert_eq!(param.ga.mutation_rate, 0.1, "missing keys keep their defaults");
    }

    #[test]
    fn test_get_toml() {
        let path = write_temp_param(
            "options.toml",
            "[general]\nscenario = \"tss\"\nfit = \"g_mean\"\n\n[data]\nsource = \"in.csv\"\ndestination = \"out.json\"\n",
        );
        let param = get(&path).unwrap();
        assert_eq!(param.general.scenario, ScenarioKind::Tss);
        assert_eq!(param.general.fit, FitFunction::g_mean);
    }

    #[test]
    fn test_scenario_from_str() {
        assert_eq!("RMV".parse::<ScenarioKind>(), Ok(ScenarioKind::Rmv));
        assert_eq!("base".parse::<ScenarioKind>(), Ok(ScenarioKind::Base));
        assert!("cv".parse::<ScenarioKind>().is_err());
        assert_eq!(ScenarioKind::Tss.to_string(), "tss");
    }
}
