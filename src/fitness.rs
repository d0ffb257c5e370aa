use crate::data::Data;
use crate::individual::Individual;
use crate::param::{FitFunction, Svm};
use crate::svm;
use log::debug;
use serde::{Deserialize, Serialize};

/// Fitness of an individual whose subset cannot train a classifier (empty or single-class).
/// Every fit function lies in [0, 1], so this is the minimum.
pub const DEGENERATE_FITNESS: f64 = 0.0;

//-----------------------------------------------------------------------------
// Confusion matrix and derived metrics
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ConfusionMatrix {
    pub fn from_classes(predicted: &[u8], truth: &[u8]) -> ConfusionMatrix {
        debug_assert_eq!(predicted.len(), truth.len());
        let mut matrix = ConfusionMatrix::default();
        for (&p, &t) in predicted.iter().zip(truth) {
            match (p, t) {
                (1, 1) => matrix.true_positive += 1,
                (0, 0) => matrix.true_negative += 1,
                (1, _) => matrix.false_positive += 1,
                _ => matrix.false_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn ppv(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn npv(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_negative)
    }

    pub fn fdr(&self) -> f64 {
        ratio(self.false_positive, self.true_positive + self.false_positive)
    }

    /// Dice coefficient of the positive class, i.e. F1 score
    pub fn dice(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }

    pub fn g_mean(&self) -> f64 {
        (self.sensitivity() * self.specificity()).sqrt()
    }

    pub fn metric(&self, fit: &FitFunction) -> f64 {
        match fit {
            FitFunction::accuracy => self.accuracy(),
            FitFunction::dice => self.dice(),
            FitFunction::g_mean => self.g_mean(),
            FitFunction::sensitivity => self.sensitivity(),
            FitFunction::specificity => self.specificity(),
            FitFunction::ppv => self.ppv(),
            FitFunction::npv => self.npv(),
        }
    }
}

//-----------------------------------------------------------------------------
// Fitness evaluation
//-----------------------------------------------------------------------------

/// Outcome of training on an individual's subset and scoring on the validation set
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub fitness: f64,
    /// None when the subset was degenerate
    pub confusion: Option<ConfusionMatrix>,
    pub support_vectors: usize,
}

/// Scores individuals over a fixed training pool and validation set.
///
/// Holds only shared references, so one evaluator is used by all the threads evaluating a population.
pub struct FitnessEvaluator<'a> {
    pub training: &'a Data,
    pub validation: &'a Data,
    pub svm: &'a Svm,
    pub fit: FitFunction,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(training: &'a Data, validation: &'a Data, svm: &'a Svm, fit: FitFunction) -> Self {
        FitnessEvaluator {
            training,
            validation,
            svm,
            fit,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.training.sample_len
    }

    pub fn evaluate(&self, individual: &Individual) -> f64 {
        self.assess(individual).fitness
    }

    /// Train on the rows selected by `individual`, predict the validation set and score it.
    pub fn assess(&self, individual: &Individual) -> Assessment {
        let subset = self.training.subset(&individual.selected());
        let outcome = svm::train(&subset, self.svm)
            .and_then(|model| Ok((model.predict(self.validation)?, model.support_vectors)));
        match outcome {
            Ok((predictions, support_vectors)) => {
                let confusion = ConfusionMatrix::from_classes(&predictions, &self.validation.y);
                Assessment {
                    fitness: confusion.metric(&self.fit),
                    confusion: Some(confusion),
                    support_vectors,
                }
            }
            Err(e) => {
                debug!("Degenerate subset of {} observations: {}", subset.sample_len, e);
                Assessment {
                    fitness: DEGENERATE_FITNESS,
                    confusion: None,
                    support_vectors: 0,
                }
            }
        }
    }

    /// Same training pool and model settings, scored against another validation set
    pub fn with_validation<'b>(&self, validation: &'b Data) -> FitnessEvaluator<'b>
    where
        'a: 'b,
    {
        FitnessEvaluator {
            training: self.training,
            validation,
            svm: self.svm,
            fit: self.fit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_svm() -> Svm {
        Svm {
            iterations: 100,
            tolerance: 1e-6,
            cost: 1.0,
        }
    }

    fn create_test_data() -> (Data, Data) {
        let training = Data::from_rows(
            vec![
                vec![-2.0, -1.0],
                vec![-1.0, -2.0],
                vec![-3.0, -2.0],
                vec![2.0, 1.0],
                vec![1.0, 2.0],
                vec![3.0, 2.0],
            ],
            vec![0, 0, 0, 1, 1, 1],
        )
        .unwrap();
        let validation = Data::from_rows(
            vec![vec![-2.5, -2.5], vec![-1.0, -1.0], vec![1.0, 1.0], vec![2.5, 2.5]],
            vec![0, 0, 1, 1],
        )
        .unwrap();
        (training, validation)
    }

    #[test]
    fn test_confusion_matrix_counts_and_metrics() {
        let matrix = ConfusionMatrix::from_classes(&[1, 1, 0, 0, 1, 0], &[1, 0, 0, 1, 1, 0]);
        assert_eq!(
            matrix,
            ConfusionMatrix {
                true_positive: 2,
                true_negative: 2,
                false_positive: 1,
                false_negative: 1
            }
        );
        assert!((matrix.accuracy() - 4.0 / 6.0).abs() < 1e-12);
        assert!((matrix.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.specificity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.dice() - 4.0 / 6.0).abs() < 1e-12);
        assert!((matrix.fdr() - 1.0 / 3.0).abs() < 1e-12);
        assert!((matrix.g_mean() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_with_empty_denominators_are_zero() {
        let all_negative = ConfusionMatrix::from_classes(&[0, 0], &[0, 0]);
        assert_eq!(all_negative.sensitivity(), 0.0);
        assert_eq!(all_negative.ppv(), 0.0);
        assert_eq!(all_negative.dice(), 0.0);
        assert_eq!(all_negative.specificity(), 1.0);
        assert_eq!(ConfusionMatrix::default().accuracy(), 0.0);
    }

    #[test]
    fn test_evaluate_full_pool_scores_perfectly() {
        let (training, validation) = create_test_data();
        let svm = create_test_svm();
        let evaluator = FitnessEvaluator::new(&training, &validation, &svm, FitFunction::accuracy);

        let all = Individual::from_indices(6, &[0, 1, 2, 3, 4, 5]);
        let assessment = evaluator.assess(&all);
        assert_eq!(assessment.fitness, 1.0);
        assert_eq!(assessment.confusion.map(|c| c.total()), Some(4));
    }

    #[test]
    fn test_degenerate_subsets_get_minimum_fitness() {
        let (training, validation) = create_test_data();
        let svm = create_test_svm();
        let evaluator = FitnessEvaluator::new(&training, &validation, &svm, FitFunction::accuracy);

        let single_class = Individual::from_indices(6, &[3, 4]);
        assert_eq!(evaluator.evaluate(&single_class), DEGENERATE_FITNESS);
        let empty = Individual::empty(6);
        let assessment = evaluator.assess(&empty);
        assert_eq!(assessment.fitness, DEGENERATE_FITNESS);
        assert!(assessment.confusion.is_none());
    }

    #[test]
    fn test_fit_function_selects_metric() {
        let (training, validation) = create_test_data();
        let svm = create_test_svm();
        let individual = Individual::from_indices(6, &[0, 3]);

        for fit in [FitFunction::accuracy, FitFunction::dice, FitFunction::g_mean, FitFunction::npv] {
            let evaluator = FitnessEvaluator::new(&training, &validation, &svm, fit);
            let assessment = evaluator.assess(&individual);
            let expected = assessment.confusion.unwrap().metric(&fit);
            assert_eq!(assessment.fitness, expected, "fitness should follow {:?}", fit);
            assert!((0.0..=1.0).contains(&assessment.fitness));
        }
    }

    #[test]
    fn test_with_validation_rescores_on_other_data() {
        let (training, validation) = create_test_data();
        let svm = create_test_svm();
        let evaluator = FitnessEvaluator::new(&training, &validation, &svm, FitFunction::accuracy);
        let flipped = Data::from_rows(vec![vec![-2.5, -2.5], vec![2.5, 2.5]], vec![1, 0]).unwrap();

        let all = Individual::from_indices(6, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(evaluator.with_validation(&flipped).evaluate(&all), 0.0);
    }
}
