use crate::errors::GasvmError;
use crate::utils::uniform_index;
use rand::seq::index::sample;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const WORD_BITS: usize = 64;

/// Allowed number of selected observations for every individual of a run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillupBounds {
    pub minimal: usize,
    pub maximal: usize,
}

impl FillupBounds {
    /// Bounds for a training pool of `pool_size` observations; `maximal` is clamped to the pool.
    pub fn for_pool(minimal: usize, maximal: usize, pool_size: usize) -> Result<FillupBounds, GasvmError> {
        let maximal = maximal.min(pool_size);
        if minimal > maximal {
            return Err(GasvmError::configuration(format!(
                "MinimalFillup {} cannot be reached with a training pool of {} observations and MaximalFillup {}",
                minimal, pool_size, maximal
            )));
        }
        Ok(FillupBounds { minimal, maximal })
    }

    #[inline]
    pub fn contains(&self, fillup: usize) -> bool {
        self.minimal <= fillup && fillup <= self.maximal
    }
}

/// Candidate training subset: bit `i` set means observation `i` of the pool is kept.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// Packed selection bits, 64 observations per word; bits past `len` stay clear
    pub bits: Vec<u64>,
    /// Size of the training pool
    pub len: usize,
    /// Cached fitness, cleared whenever the selection changes
    pub fitness: Option<f64>,
}

impl Individual {
    pub fn empty(len: usize) -> Individual {
        Individual {
            bits: vec![0; len.div_ceil(WORD_BITS)],
            len,
            fitness: None,
        }
    }

    /// Every observation of the pool selected
    pub fn full(len: usize) -> Individual {
        let mut individual = Individual::empty(len);
        for (w, word) in individual.bits.iter_mut().enumerate() {
            let remaining = len - w * WORD_BITS;
            *word = if remaining >= WORD_BITS {
                u64::MAX
            } else {
                (1u64 << remaining) - 1
            };
        }
        individual
    }

    pub fn from_indices(len: usize, indices: &[usize]) -> Individual {
        let mut individual = Individual::empty(len);
        for &i in indices {
            individual.set(i, true);
        }
        individual
    }

    /// Individual with exactly `fillup` observations drawn uniformly without replacement.
    pub fn initialize(pool_size: usize, fillup: usize, rng: &mut ChaCha8Rng) -> Result<Individual, GasvmError> {
        if fillup > pool_size {
            return Err(GasvmError::configuration(format!(
                "initial fill-up {} exceeds the training pool size {}",
                fillup, pool_size
            )));
        }
        let chosen = sample(rng, pool_size, fillup);
        let mut individual = Individual::empty(pool_size);
        for i in chosen.iter() {
            individual.set(i, true);
        }
        Ok(individual)
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        self.bits[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        debug_assert!(i < self.len);
        let mask = 1u64 << (i % WORD_BITS);
        if value {
            self.bits[i / WORD_BITS] |= mask;
        } else {
            self.bits[i / WORD_BITS] &= !mask;
        }
    }

    #[inline]
    pub fn flip(&mut self, i: usize) {
        debug_assert!(i < self.len);
        self.bits[i / WORD_BITS] ^= 1u64 << (i % WORD_BITS);
    }

    /// Number of selected observations
    pub fn fillup(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indices of the selected observations, ascending
    pub fn selected(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.fillup());
        for (w, &word) in self.bits.iter().enumerate() {
            let mut word = word;
            while word != 0 {
                indices.push(w * WORD_BITS + word.trailing_zeros() as usize);
                word &= word - 1;
            }
        }
        indices
    }

    fn unselected(&self) -> Vec<usize> {
        (0..self.len).filter(|&i| !self.get(i)).collect()
    }

    /// Fitness used for ranking; unevaluated individuals rank last.
    #[inline]
    pub fn fit(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }

    /// Flip every bit with probability `rate`, then repair the fill-up into `bounds`.
    pub fn mutate(&mut self, rate: f64, bounds: &FillupBounds, rng: &mut ChaCha8Rng) {
        let mut changed = false;
        if rate > 0.0 {
            for i in 0..self.len {
                if rng.gen::<f64>() < rate {
                    self.flip(i);
                    changed = true;
                }
            }
        }
        changed |= self.repair(bounds, rng);
        if changed {
            self.fitness = None;
        }
    }

    /// Move the fill-up to the nearest bound by flipping randomly chosen bits.
    /// Returns whether any bit changed.
    pub fn repair(&mut self, bounds: &FillupBounds, rng: &mut ChaCha8Rng) -> bool {
        let fillup = self.fillup();
        if fillup > bounds.maximal {
            let ones = self.selected();
            for k in sample(rng, ones.len(), fillup - bounds.maximal).iter() {
                self.set(ones[k], false);
            }
            true
        } else if fillup < bounds.minimal {
            let zeros = self.unselected();
            let missing = (bounds.minimal - fillup).min(zeros.len());
            for k in sample(rng, zeros.len(), missing).iter() {
                self.set(zeros[k], true);
            }
            true
        } else {
            false
        }
    }

    /// With probability `rate`, exchange one selected and one unselected observation.
    pub fn bit_swap(&mut self, rate: f64, rng: &mut ChaCha8Rng) {
        if rng.gen::<f64>() >= rate {
            return;
        }
        let ones = self.selected();
        if ones.is_empty() || ones.len() == self.len {
            return;
        }
        let zeros = self.unselected();
        let leaving = ones[uniform_index(rng, ones.len())];
        let joining = zeros[uniform_index(rng, zeros.len())];
        self.set(leaving, false);
        self.set(joining, true);
        self.fitness = None;
    }

    /// Single-point crossover: positions before the cut come from `first`, the rest from `second`.
    /// Falls back to a copy of `first` when the child's fill-up leaves `bounds`.
    pub fn crossover(
        first: &Individual,
        second: &Individual,
        bounds: &FillupBounds,
        rng: &mut ChaCha8Rng,
    ) -> Individual {
        debug_assert_eq!(first.len, second.len);
        let mut child = Individual::empty(first.len);
        if first.len < 2 {
            child.bits.copy_from_slice(&first.bits);
            return child;
        }

        let cut = 1 + uniform_index(rng, first.len - 1);
        for (w, word) in child.bits.iter_mut().enumerate() {
            let low = w * WORD_BITS;
            *word = if low + WORD_BITS <= cut {
                first.bits[w]
            } else if low >= cut {
                second.bits[w]
            } else {
                let mask = (1u64 << (cut - low)) - 1;
                (first.bits[w] & mask) | (second.bits[w] & !mask)
            };
        }

        if !bounds.contains(child.fillup()) {
            child.bits.copy_from_slice(&first.bits);
        }
        child
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selected = self.selected();
        let shown: Vec<String> = selected.iter().take(20).map(|i| i.to_string()).collect();
        write!(
            f,
            "fillup {}/{} fitness {} [{}{}]",
            selected.len(),
            self.len,
            self.fitness.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string()),
            shown.join(","),
            if selected.len() > 20 { ",..." } else { "" }
        )
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
