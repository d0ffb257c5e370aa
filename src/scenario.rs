use crate::cinfo;
use crate::data::{downsample_size, split_sizes, Data};
use crate::errors::GasvmError;
use crate::experiment::{FailedRun, RunResult};
use crate::fitness::FitnessEvaluator;
use crate::ga::{ga, GaOutcome};
use crate::individual::{FillupBounds, Individual};
use crate::param::{Param, ScenarioKind};
use crate::restart::{plan_jobs, run_restarts, RestartJob};
use crate::utils::seeded;
use log::{debug, info, warn};

/// Training pool and validation set searched by a run
pub struct Partition {
    pub training: Data,
    pub validation: Data,
}

/// Completed and failed restarts of one scenario, each in job order
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRuns {
    pub runs: Vec<RunResult>,
    pub failures: Vec<FailedRun>,
}

/// Partition the data as the scenario requires, then run every restart.
///
/// All size checks happen before the first run is dispatched, so an unusable
/// configuration fails without any GA iteration.
pub fn run_scenario(
    data: &Data,
    external_validation: Option<&Data>,
    param: &Param,
) -> Result<ScenarioRuns, GasvmError> {
    check_dataset(data, external_validation)?;
    if param.ga.population_sizes.is_empty() || param.ga.initial_fillups.is_empty() {
        return Err(GasvmError::configuration(
            "PopulationSizes and InitialFillups need at least one value",
        ));
    }

    match param.general.scenario {
        ScenarioKind::Base => {
            let partition = fixed_partition(data, param)?;
            check_pool(partition.training.sample_len, &param.ga.initial_fillups, param)?;
            run_sweep(&partition, external_validation, param)
        }
        ScenarioKind::Tss => {
            let partition = match external_validation {
                Some(validation) => {
                    info!(
                        "Selecting among all {} observations, validating on the external dataset ({} observations)",
                        data.sample_len, validation.sample_len
                    );
                    Partition {
                        training: data.clone(),
                        validation: validation.clone(),
                    }
                }
                None => fixed_partition(data, param)?,
            };
            check_pool(partition.training.sample_len, &param.ga.initial_fillups, param)?;
            run_sweep(&partition, None, param)
        }
        ScenarioKind::Rmv => {
            let (training_len, validation_len) = split_sizes(data.sample_len, param.data.training_set_split_rate);
            if training_len == 0 || validation_len == 0 {
                return Err(GasvmError::data(format!(
                    "splitting {} observations at rate {} leaves an empty partition",
                    data.sample_len, param.data.training_set_split_rate
                )));
            }
            let pool_len = downsample_size(
                training_len,
                param.data.downsample_training_rate,
                param.data.maximum_subset_size,
            );
            if pool_len == 0 {
                return Err(GasvmError::data(format!(
                    "downsampling {} training observations at rate {} leaves none",
                    training_len, param.data.downsample_training_rate
                )));
            }
            check_pool(pool_len, &param.ga.initial_fillups[..1], param)?;
            run_resampled(data, external_validation, param)
        }
    }
}

fn check_dataset(data: &Data, external_validation: Option<&Data>) -> Result<(), GasvmError> {
    if data.sample_len == 0 {
        return Err(GasvmError::data("the dataset has no observation"));
    }
    if let Some(validation) = external_validation {
        if !data.check_compatibility(validation) {
            return Err(GasvmError::data(format!(
                "validation dataset has {} features, the source dataset has {}",
                validation.feature_len, data.feature_len
            )));
        }
        if validation.sample_len == 0 {
            return Err(GasvmError::data("the validation dataset has no observation"));
        }
    }
    Ok(())
}

/// The fill-up bounds and every initial fill-up must fit a pool of `pool_len` observations
fn check_pool(pool_len: usize, initial_fillups: &[usize], param: &Param) -> Result<(), GasvmError> {
    let bounds = FillupBounds::for_pool(param.ga.minimal_fillup, param.ga.maximal_fillup, pool_len)?;
    if let Some(fillup) = initial_fillups.iter().find(|&&f| !bounds.contains(f)) {
        return Err(GasvmError::configuration(format!(
            "InitialFillup {} does not fit a training pool of {} observations (bounds [{}, {}])",
            fillup, pool_len, bounds.minimal, bounds.maximal
        )));
    }
    Ok(())
}

/// Single split drawn from the global seed, shared by every run
fn fixed_partition(data: &Data, param: &Param) -> Result<Partition, GasvmError> {
    let mut rng = seeded(param.general.seed);
    let (training, validation) = data.random_split(param.data.training_set_split_rate, &mut rng)?;
    info!(
        "Split into {} training / {} validation observations",
        training.sample_len, validation.sample_len
    );
    Ok(Partition { training, validation })
}

/// Keep the completed restarts and record the failed ones.
///
/// The run fails only when no restart completed, with the first error in job order.
fn gather(jobs: &[RestartJob], outcomes: Vec<Result<RunResult, GasvmError>>) -> Result<ScenarioRuns, GasvmError> {
    let mut runs = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut first_error = None;

    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(run) => runs.push(run),
            Err(e) => {
                failures.push(FailedRun {
                    restart: job.restart,
                    population_size: job.population_size,
                    initial_fillup: job.initial_fillup,
                    seed: job.seed,
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if runs.is_empty() => Err(e),
        _ => {
            if !failures.is_empty() {
                warn!("{} of {} restarts failed", failures.len(), jobs.len());
            }
            Ok(ScenarioRuns { runs, failures })
        }
    }
}

/// base and tss: every population size × initial fill-up, `NumberOfRestarts` times, on one partition
fn run_sweep(
    partition: &Partition,
    independent: Option<&Data>,
    param: &Param,
) -> Result<ScenarioRuns, GasvmError> {
    let jobs = plan_jobs(
        param.general.seed,
        param.ga.number_of_restarts,
        &param.ga.population_sizes,
        &param.ga.initial_fillups,
    );
    let evaluator = FitnessEvaluator::new(
        &partition.training,
        &partition.validation,
        &param.svm,
        param.general.fit,
    );
    info!(
        "Launching {} runs ({} restarts × {} population sizes × {} initial fill-ups)",
        jobs.len(),
        param.ga.number_of_restarts,
        param.ga.population_sizes.len(),
        param.ga.initial_fillups.len()
    );

    let outcomes = run_restarts(&jobs, param.general.thread_number, |job| {
        let mut rng = seeded(job.seed);
        let outcome = ga(&evaluator, job.population_size, job.initial_fillup, param, &mut rng)?;
        Ok(build_result(job, &evaluator, outcome, independent, None, param))
    })?;
    gather(&jobs, outcomes)
}

/// rmv: a fresh split and downsample per restart, one configuration
fn run_resampled(
    data: &Data,
    independent: Option<&Data>,
    param: &Param,
) -> Result<ScenarioRuns, GasvmError> {
    let jobs = plan_jobs(
        param.general.seed,
        param.ga.number_of_restarts,
        &param.ga.population_sizes[..1],
        &param.ga.initial_fillups[..1],
    );
    info!(
        "Launching {} resampled runs (population {}, fillup {})",
        jobs.len(),
        param.ga.population_sizes[0],
        param.ga.initial_fillups[0]
    );

    let outcomes = run_restarts(&jobs, param.general.thread_number, |job| {
        let mut rng = seeded(job.seed);
        let partition = resample(data, param, &mut rng)?;
        let evaluator = FitnessEvaluator::new(
            &partition.training,
            &partition.validation,
            &param.svm,
            param.general.fit,
        );
        let outcome = ga(&evaluator, job.population_size, job.initial_fillup, param, &mut rng)?;
        let baseline = evaluator.evaluate(&Individual::full(partition.training.sample_len));
        Ok(build_result(job, &evaluator, outcome, independent, Some(baseline), param))
    })?;
    gather(&jobs, outcomes)
}

/// Split by `TrainingSetSplitRate`, then downsample the training side
pub fn resample(data: &Data, param: &Param, rng: &mut rand_chacha::ChaCha8Rng) -> Result<Partition, GasvmError> {
    let (training, validation) = data.random_split(param.data.training_set_split_rate, rng)?;
    let training = training.downsample(
        param.data.downsample_training_rate,
        param.data.maximum_subset_size,
        rng,
    );
    debug!(
        "Resampled {} training / {} validation observations",
        training.sample_len, validation.sample_len
    );
    Ok(Partition { training, validation })
}

fn build_result(
    job: &RestartJob,
    evaluator: &FitnessEvaluator,
    outcome: GaOutcome,
    independent: Option<&Data>,
    baseline_fitness: Option<f64>,
    param: &Param,
) -> RunResult {
    let assessment = evaluator.assess(&outcome.champion);
    let independent_fitness = independent.map(|v| evaluator.with_validation(v).evaluate(&outcome.champion));
    let selected_rows = outcome
        .champion
        .selected()
        .iter()
        .map(|&i| evaluator.training.row_ids[i])
        .collect();

    cinfo!(
        param.general.display_colorful,
        "\x1b[1;93mRestart #{} completed\x1b[0m | population {} | fillup {} | best fitness {:.4} | champion fillup {}{}",
        job.restart + 1,
        job.population_size,
        job.initial_fillup,
        outcome.best_fitness,
        outcome.champion.fillup(),
        baseline_fitness
            .map(|b| format!(" | baseline {:.4}", b))
            .unwrap_or_default()
    );

    RunResult {
        restart: job.restart,
        population_size: job.population_size,
        initial_fillup: job.initial_fillup,
        seed: job.seed,
        training_size: evaluator.training.sample_len,
        validation_size: evaluator.validation.sample_len,
        training_rows: evaluator.training.row_ids.clone(),
        selected_rows,
        best_fitness: outcome.best_fitness,
        best_fillup: outcome.champion.fillup(),
        champion: outcome.champion,
        trace: outcome.trace,
        generations: outcome.generations,
        confusion: assessment.confusion,
        support_vectors: assessment.support_vectors,
        independent_fitness,
        baseline_fitness,
    }
}
