#![allow(non_snake_case)]

pub mod cli;
pub mod data;
pub mod errors;
pub mod experiment;
pub mod fitness;
pub mod ga;
pub mod individual;
pub mod param;
pub mod population;
pub mod restart;
pub mod scenario;
pub mod svm;
pub mod utils;

use crate::experiment::{DatasetSummary, Experiment};
use chrono::Local;
use data::Data;
use errors::GasvmError;
use log::debug;
use param::Param;
use std::path::Path;

pub fn version() -> String {
    format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GASVM_GIT_SHA").unwrap_or("unknown")
    )
}

/// Validate `param`, load its datasets and run its scenario.
///
/// Configuration problems are reported before any file is opened.
pub fn run(param: &Param) -> Result<Experiment, GasvmError> {
    let mut param = param.clone();
    param::validate(&mut param)?;

    let data = Data::load_data(&param.data.source)?;
    let validation = if !param.data.validation.is_empty() {
        debug!("Loading validation data...");
        Some(Data::load_data(&param.data.validation)?)
    } else {
        None
    };

    run_on_data(&data, validation.as_ref(), &param)
}

/// Run the configured scenario on datasets already in memory.
pub fn run_on_data(data: &Data, validation: Option<&Data>, param: &Param) -> Result<Experiment, GasvmError> {
    let start = std::time::Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);

    let scenario::ScenarioRuns { runs, failures } = scenario::run_scenario(data, validation, param)?;
    let summaries = Experiment::summarize(&runs);

    let stem = Path::new(&param.data.destination)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("experiment");

    Ok(Experiment {
        id: format!("{}_{}_{}", stem, param.general.scenario, timestamp),
        timestamp,
        version: version(),
        scenario: param.general.scenario,
        parameters: param.clone(),
        dataset: DatasetSummary::of(data, &param.data.source),
        validation: validation.map(|v| DatasetSummary::of(v, &param.data.validation)),
        runs,
        failures,
        summaries,
        execution_time: start.elapsed().as_secs_f64(),
    })
}
