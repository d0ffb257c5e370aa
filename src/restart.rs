use crate::errors::GasvmError;
use crate::utils::derive_seed;
use log::{debug, error};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// One independent GA run to schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartJob {
    pub restart: usize,
    pub population_size: usize,
    pub initial_fillup: usize,
    /// Seed of the run's own stream, `derive_seed(global, restart)`
    pub seed: u64,
}

/// Every (restart, population size, initial fill-up) combination, ordered by restart index first.
///
/// Jobs sharing a restart index share a seed, so each configuration of a sweep starts from
/// the same random stream.
pub fn plan_jobs(
    seed: u64,
    number_of_restarts: usize,
    population_sizes: &[usize],
    initial_fillups: &[usize],
) -> Vec<RestartJob> {
    let mut jobs = Vec::with_capacity(number_of_restarts * population_sizes.len() * initial_fillups.len());
    for restart in 0..number_of_restarts {
        let restart_seed = derive_seed(seed, restart as u64);
        for &population_size in population_sizes {
            for &initial_fillup in initial_fillups {
                jobs.push(RestartJob {
                    restart,
                    population_size,
                    initial_fillup,
                    seed: restart_seed,
                });
            }
        }
    }
    jobs
}

/// Execute `run` for every job on a pool of `thread_number` workers.
///
/// Outcomes come back in job order whatever the completion order, one per job. A failing
/// job does not stop its siblings and is only logged here. The outer error is reserved for
/// resources: the pool cannot be built or a worker panicked.
pub fn run_restarts<T, F>(
    jobs: &[RestartJob],
    thread_number: usize,
    run: F,
) -> Result<Vec<Result<T, GasvmError>>, GasvmError>
where
    T: Send,
    F: Fn(&RestartJob) -> Result<T, GasvmError> + Send + Sync,
{
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_number)
        .build()
        .map_err(|e| GasvmError::Resource(format!("cannot start {} worker threads: {}", thread_number, e)))?;
    debug!("Dispatching {} runs on {} threads", jobs.len(), thread_number);

    let outcomes: Vec<Result<T, GasvmError>> = catch_unwind(AssertUnwindSafe(|| {
        thread_pool.install(|| {
            jobs.par_iter()
                .map(|job| run(job))
                .collect::<Vec<Result<T, GasvmError>>>()
        })
    }))
    .map_err(|_| {
        error!("A restart worker crashed");
        GasvmError::Resource("a restart worker crashed".to_string())
    })?;

    for (job, outcome) in jobs.iter().zip(&outcomes) {
        if let Err(e) = outcome {
            error!(
                "Restart {} (population {}, fill-up {}) failed: {}",
                job.restart, job.population_size, job.initial_fillup, e
            );
        }
    }

    Ok(outcomes)
}
