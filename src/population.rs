use crate::errors::GasvmError;
use crate::fitness::FitnessEvaluator;
use crate::individual::Individual;
use crate::utils::uniform_index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

/// Number of elites kept from a population of `size`: `ceil(rate × size)`, at most `size`.
pub fn elite_count(size: usize, preservation_rate: f64) -> usize {
    // 1e-9 keeps 0.3 × 10 at 3 despite its binary representation
    let n = (preservation_rate * size as f64 - 1e-9).ceil().max(0.0) as usize;
    n.min(size)
}

impl Population {
    pub fn new() -> Population {
        Population {
            individuals: Vec::new(),
        }
    }

    /// `size` individuals of `pool_size` bits, each with exactly `fillup` bits set
    pub fn initial(size: usize, pool_size: usize, fillup: usize, rng: &mut ChaCha8Rng) -> Result<Population, GasvmError> {
        let individuals = (0..size)
            .map(|_| Individual::initialize(pool_size, fillup, rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Population { individuals })
    }

    pub fn add(&mut self, population: Population) {
        self.individuals.extend(population.individuals);
    }

    /// Compute the fitness of every individual without a cached value, in parallel.
    /// Returns how many individuals were evaluated.
    pub fn evaluate(&mut self, evaluator: &FitnessEvaluator) -> usize {
        self.individuals
            .par_iter_mut()
            .filter(|i| i.fitness.is_none())
            .map(|i| {
                i.fitness = Some(evaluator.evaluate(i));
            })
            .count()
    }

    /// Stable sort by descending fitness: equal fitness keeps population order.
    pub fn sort(mut self) -> Self {
        self.individuals
            .sort_by(|i, j| j.fit().partial_cmp(&i.fit()).unwrap_or(Ordering::Equal));
        self
    }

    /// Fitness never increases along the population
    pub fn is_ranked(&self) -> bool {
        self.individuals.windows(2).all(|w| w[0].fit() >= w[1].fit())
    }

    /// Split a population already ranked by [`Population::sort`] into
    /// `elite_count(size, rate)` elites and the rest, in place.
    pub fn select(mut self, preservation_rate: f64) -> (Population, Population) {
        debug_assert!(self.is_ranked(), "select expects a ranked population");
        let n = elite_count(self.individuals.len(), preservation_rate);
        let rest = self.individuals.split_off(n);
        (self, Population { individuals: rest })
    }

    /// Highest fitness, first in population order on ties
    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .fold(None, |best: Option<&Individual>, i| match best {
                Some(b) if b.fit() >= i.fit() => Some(b),
                _ => Some(i),
            })
    }

    pub fn mean_fitness(&self) -> f64 {
        let evaluated: Vec<f64> = self.individuals.iter().filter_map(|i| i.fitness).collect();
        if evaluated.is_empty() {
            0.0
        } else {
            evaluated.iter().sum::<f64>() / evaluated.len() as f64
        }
    }

    /// Roulette-wheel parent choice, proportional to fitness.
    /// Uniform when no individual has a positive fitness.
    pub fn roulette(&self, rng: &mut ChaCha8Rng) -> &Individual {
        debug_assert!(!self.individuals.is_empty());
        let weight = |i: &Individual| i.fitness.unwrap_or(0.0).max(0.0);
        let total: f64 = self.individuals.iter().map(weight).sum();
        if !(total > 0.0) {
            return &self.individuals[uniform_index(rng, self.individuals.len())];
        }

        let mut target = rng.gen::<f64>() * total;
        for individual in &self.individuals {
            let w = weight(individual);
            if target < w {
                return individual;
            }
            target -= w;
        }
        // rounding left target just above the last weight
        self.individuals
            .iter()
            .rev()
            .find(|i| weight(*i) > 0.0)
            .unwrap_or(&self.individuals[self.individuals.len() - 1])
    }
}
