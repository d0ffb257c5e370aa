use crate::data::Data;
use crate::param::Svm;
use linfa::prelude::*;
use linfa_svm::Svm as Classifier;
use ndarray::{Array1, Array2, ArrayView1};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SvmError {
    #[error("cannot train on an empty subset")]
    Empty,
    #[error("every training observation has label {0}")]
    SingleClass(u8),
    #[error("SVM solver failed: {0}")]
    Solver(String),
}

/// Linear-kernel two-class SVM, `class 1 ⇔ Σ αᵢ⟨xᵢ, x⟩ - ρ >= 0`
pub struct LinearSvm {
    model: Classifier<f64, bool>,
    /// Training observations with a non-zero dual coefficient
    pub support_vectors: usize,
}

fn records(data: &Data) -> Result<Array2<f64>, SvmError> {
    Array2::from_shape_vec((data.sample_len, data.feature_len), data.X.clone())
        .map_err(|e| SvmError::Solver(e.to_string()))
}

/// Train a C-SVM with a linear kernel using linfa's SMO solver.
///
/// Both classes share the cost `svm.cost` and the solver stops once its KKT gap is below
/// `svm.tolerance`. The SMO solver owns its iteration ceiling, so `svm.iterations` is not
/// forwarded. Rows are fed in subset order, so the same subset always yields the same model.
pub fn train(data: &Data, svm: &Svm) -> Result<LinearSvm, SvmError> {
    if data.sample_len == 0 {
        return Err(SvmError::Empty);
    }
    if !data.has_both_classes() {
        return Err(SvmError::SingleClass(data.y[0]));
    }

    let targets: Array1<bool> = data.y.iter().map(|&label| label == 1).collect();
    let dataset = Dataset::new(records(data)?, targets);

    let model = Classifier::<f64, bool>::params()
        .linear_kernel()
        .pos_neg_weights(svm.cost, svm.cost)
        .eps(svm.tolerance)
        .fit(&dataset)
        .map_err(|e| SvmError::Solver(e.to_string()))?;

    Ok(LinearSvm {
        support_vectors: model.nsupport(),
        model,
    })
}

impl LinearSvm {
    #[inline]
    pub fn decision(&self, row: &[f64]) -> f64 {
        self.model.weighted_sum(&ArrayView1::from(row)) - self.model.rho
    }

    pub fn predict(&self, data: &Data) -> Result<Vec<u8>, SvmError> {
        let predicted: Array1<bool> = self.model.predict(&records(data)?);
        Ok(predicted.iter().map(|&positive| positive as u8).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_svm_params() -> Svm {
        Svm {
            iterations: 200,
            tolerance: 1e-6,
            cost: 1.0,
        }
    }

    fn create_separable_data() -> Data {
        Data::from_rows(
            vec![
                vec![-2.0, -1.0],
                vec![-1.0, -2.0],
                vec![-3.0, -2.0],
                vec![-1.5, -1.5],
                vec![2.0, 1.0],
                vec![1.0, 2.0],
                vec![3.0, 2.0],
                vec![1.5, 1.5],
            ],
            vec![0, 0, 0, 0, 1, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_train_separates_linearly_separable_data() {
        let data = create_separable_data();
        let model = train(&data, &create_test_svm_params()).unwrap();
        assert_eq!(model.predict(&data).unwrap(), data.y, "separable data should be fitted perfectly");
        assert!(model.support_vectors > 0 && model.support_vectors <= data.sample_len);
    }

    #[test]
    fn test_train_is_deterministic() {
        let data = create_separable_data();
        let a = train(&data, &create_test_svm_params()).unwrap();
        let b = train(&data, &create_test_svm_params()).unwrap();
        assert_eq!(a.model.alpha, b.model.alpha);
        assert_eq!(a.model.rho, b.model.rho);
        assert_eq!(a.support_vectors, b.support_vectors);
    }

    #[test]
    fn test_train_rejects_degenerate_subsets() {
        let data = create_separable_data();
        let params = create_test_svm_params();

        assert_eq!(train(&data.subset(&[]), &params).err(), Some(SvmError::Empty));
        assert_eq!(train(&data.subset(&[4, 5]), &params).err(), Some(SvmError::SingleClass(1)));
    }

    #[test]
    fn test_cost_is_applied_to_both_classes() {
        // Overlapping classes: a tiny cost bounds every α, so more rows end up as support vectors
        let data = Data::from_rows(
            vec![vec![-1.0], vec![-0.2], vec![0.3], vec![1.0], vec![0.2], vec![-0.3]],
            vec![0, 0, 0, 1, 1, 1],
        )
        .unwrap();
        let mut params = create_test_svm_params();
        params.cost = 1e-3;
        let soft = train(&data, &params).unwrap();
        assert_eq!(soft.support_vectors, data.sample_len);
        assert!(soft.model.alpha.iter().all(|a| a.abs() <= 1e-3 + 1e-9));
    }

    #[test]
    fn test_decision_agrees_with_predict() {
        let data = create_separable_data();
        let model = train(&data, &create_test_svm_params()).unwrap();
        let other = Data::from_rows(vec![vec![10.0, 10.0], vec![-10.0, -10.0], vec![0.5, 0.7]], vec![1, 0, 1]).unwrap();
        let predictions = model.predict(&other).unwrap();
        assert_eq!(predictions.len(), 3);
        assert_eq!(&predictions[..2], &[1, 0]);
        for (i, &label) in predictions.iter().enumerate() {
            assert_eq!(label == 1, model.decision(other.row(i)) >= 0.0);
        }
    }
}
