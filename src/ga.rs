use crate::errors::GasvmError;
use crate::fitness::FitnessEvaluator;
use crate::individual::{FillupBounds, Individual};
use crate::param::Param;
use crate::population::{elite_count, Population};
use log::debug;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Summary of one evaluated generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    /// Best fitness in this generation's population
    pub best_fitness: f64,
    pub mean_fitness: f64,
    /// Best fitness seen so far in the run
    pub champion_fitness: f64,
    pub champion_fillup: usize,
}

/// Result of one GA run
#[derive(Clone, Debug, PartialEq)]
pub struct GaOutcome {
    /// Best individual seen across all generations
    pub champion: Individual,
    pub best_fitness: f64,
    /// Best fitness of each generation, one entry per generation
    pub trace: Vec<f64>,
    pub generations: Vec<GenerationStats>,
    /// Number of fitness evaluations performed
    pub evaluations: usize,
}

//-----------------------------------------------------------------------------
// Genetic Algorithm core functions
//-----------------------------------------------------------------------------

/// Run the genetic algorithm on the training pool of `evaluator`
///
/// # Arguments
///
/// * `evaluator` - Scores individuals against the validation set.
/// * `population_size` - Number of individuals per generation.
/// * `initial_fillup` - Number of observations selected by each initial individual.
/// * `param` - Rates, generation count and fill-up bounds.
/// * `rng` - The run's random stream; every stochastic step draws from it in a fixed order.
///
/// # Returns
///
/// The champion with its fitness and the per-generation trace, or a configuration error when
/// the fill-up bounds or the initial fill-up do not fit the training pool.
pub fn ga(
    evaluator: &FitnessEvaluator,
    population_size: usize,
    initial_fillup: usize,
    param: &Param,
    rng: &mut ChaCha8Rng,
) -> Result<GaOutcome, GasvmError> {
    let time = Instant::now();
    let pool_size = evaluator.pool_size();
    let bounds = FillupBounds::for_pool(param.ga.minimal_fillup, param.ga.maximal_fillup, pool_size)?;
    if !bounds.contains(initial_fillup) {
        return Err(GasvmError::configuration(format!(
            "initial fill-up {} is outside [{}, {}] for a training pool of {} observations",
            initial_fillup, bounds.minimal, bounds.maximal, pool_size
        )));
    }
    if population_size == 0 {
        return Err(GasvmError::configuration("population size must be positive"));
    }

    let mut pop = Population::initial(population_size, pool_size, initial_fillup, rng)?;
    let mut champion: Option<Individual> = None;
    let mut trace = Vec::with_capacity(param.ga.generations_number);
    let mut generations = Vec::with_capacity(param.ga.generations_number);
    let mut evaluations = 0;

    for generation in 0..param.ga.generations_number {
        evaluations += pop.evaluate(evaluator);
        pop = pop.sort();

        let best = &pop.individuals[0];
        if champion.as_ref().map_or(true, |c| best.fit() > c.fit()) {
            champion = Some(best.clone());
        }
        trace.push(best.fit());

        let stats = GenerationStats {
            generation,
            best_fitness: best.fit(),
            mean_fitness: pop.mean_fitness(),
            champion_fitness: champion.as_ref().map_or(best.fit(), |c| c.fit()),
            champion_fillup: champion.as_ref().map_or(0, |c| c.fillup()),
        };
        debug!("{}", display_generation(&stats));
        generations.push(stats);

        if generation + 1 < param.ga.generations_number {
            pop = evolve(pop, &bounds, param, rng);
        }
    }

    let champion = champion.ok_or_else(|| GasvmError::configuration("GenerationsNumber must be at least 1"))?;
    debug!(
        "Genetic algorithm computed {} generations ({} evaluations) in {:.2?}",
        trace.len(),
        evaluations,
        time.elapsed()
    );

    Ok(GaOutcome {
        best_fitness: champion.fit(),
        champion,
        trace,
        generations,
        evaluations,
    })
}

/// Build the next generation: elites unchanged, then children until the size is restored
///
/// # Arguments
///
/// * `pop` - The evaluated current generation, ranked by [`Population::sort`].
/// * `bounds` - Fill-up bounds every child must respect.
/// * `param` - Preservation, mutation and bit-swap rates.
/// * `rng` - Random number generator.
///
/// # Returns
///
/// A population of the same size, elites first and keeping their cached fitness.
pub fn evolve(pop: Population, bounds: &FillupBounds, param: &Param, rng: &mut ChaCha8Rng) -> Population {
    let size = pop.individuals.len();
    let children_to_create = size - elite_count(size, param.ga.preservation_rate);

    let mut children = Population::new();
    for _ in 0..children_to_create {
        let (first, second) = select_parents(&pop, rng);
        let mut child = Individual::crossover(first, second, bounds, rng);
        child.mutate(param.ga.mutation_rate, bounds, rng);
        child.bit_swap(param.ga.bit_swap_rate, rng);
        child.fitness = None;
        children.individuals.push(child);
    }

    let (mut new_pop, _) = pop.select(param.ga.preservation_rate);
    new_pop.add(children);
    new_pop
}

/// Two independent roulette draws over the whole current generation
fn select_parents<'a>(pop: &'a Population, rng: &mut ChaCha8Rng) -> (&'a Individual, &'a Individual) {
    let first = pop.roulette(rng);
    let second = pop.roulette(rng);
    (first, second)
}

pub fn display_generation(stats: &GenerationStats) -> String {
    format!(
        "#{:<4} | best {:.4} | mean {:.4} | champion {:.4} (fillup {})",
        stats.generation, stats.best_fitness, stats.mean_fitness, stats.champion_fitness, stats.champion_fillup
    )
}
