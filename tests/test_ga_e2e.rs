/// End-to-End Integration Test for the training subset search
///
/// This test validates the complete workflow:
/// 1. Writing and loading a delimited dataset
/// 2. Running the base and rmv scenarios through `run`
/// 3. Checking reproducibility across repeats and thread counts
/// 4. Testing report serialization/deserialization
///
/// Run with: cargo test --test test_ga_e2e -- --nocapture
use gasvm::errors::GasvmError;
use gasvm::experiment::Experiment;
use gasvm::param::{Param, ScenarioKind};
use gasvm::run;
use std::fs;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("gasvm_e2e_{}_{}", std::process::id(), name))
}

/// 20 observations, 10 per label, two overlapping features
fn write_dataset(name: &str) -> PathBuf {
    let path = temp_path(name);
    let mut content = String::from("label,f1,f2\n");
    for k in 0..10 {
        let t = k as f64 / 10.0;
        content.push_str(&format!("1,{:.3},{:.3}\n", 1.0 - 1.5 * t, 0.4 + t));
        content.push_str(&format!("0,{:.3},{:.3}\n", -1.0 + 1.4 * t, 0.9 - t));
    }
    fs::write(&path, content).unwrap();
    path
}

fn create_params(source: &PathBuf) -> Param {
    let mut param = Param::default();

    param.general.scenario = ScenarioKind::Base;
    param.general.seed = 42;
    param.general.thread_number = 2;
    param.general.log_level = "info".to_string();
    param.general.display_colorful = false;

    param.data.source = source.to_string_lossy().into_owned();
    param.data.destination = temp_path("report.json").to_string_lossy().into_owned();
    param.data.training_set_split_rate = 0.7;

    param.ga.population_sizes = vec![10];
    param.ga.initial_fillups = vec![4];
    param.ga.generations_number = 5;
    param.ga.number_of_restarts = 3;

    param.svm.iterations = 50;
    param
}

#[test]
fn test_base_scenario_end_to_end() {
    let source = write_dataset("base.csv");
    let param = create_params(&source);

    let experiment = run(&param).expect("base scenario should succeed");

    assert_eq!(experiment.scenario, ScenarioKind::Base);
    assert_eq!(experiment.dataset.sample_len, 20);
    assert_eq!(experiment.dataset.feature_len, 2);
    assert_eq!(experiment.dataset.class_counts, [10, 10]);
    assert_eq!(experiment.runs.len(), 3);
    assert_eq!(experiment.summaries.len(), 1);

    for run in &experiment.runs {
        assert_eq!(run.training_size, 14);
        assert_eq!(run.validation_size, 6);
        assert_eq!(run.trace.len(), 5, "one best fitness per generation");
        assert!((1..=14).contains(&run.best_fillup));
        assert_eq!(run.selected_rows.len(), run.best_fillup);
        assert!((0.0..=1.0).contains(&run.best_fitness));
        assert!(
            run.trace.windows(2).all(|w| w[1] >= w[0] - 1e-12),
            "elitism keeps the best fitness from decreasing"
        );
    }

    let summary = &experiment.summaries[0];
    assert_eq!(summary.restarts, 3);
    assert!(summary.max_best_fitness >= summary.mean_best_fitness);

    fs::remove_file(source).ok();
}

#[test]
fn test_repeated_runs_are_identical() {
    let source = write_dataset("repeat.csv");
    let param = create_params(&source);

    let first = run(&param).unwrap();
    let second = run(&param).unwrap();
    assert_eq!(first.runs, second.runs);
    assert_eq!(first.dataset.digest, second.dataset.digest);

    fs::remove_file(source).ok();
}

#[test]
fn test_thread_count_does_not_change_results() {
    let source = write_dataset("threads.csv");
    let mut param = create_params(&source);

    param.general.thread_number = 1;
    let sequential = run(&param).unwrap();
    param.general.thread_number = 4;
    let parallel = run(&param).unwrap();

    assert_eq!(sequential.runs, parallel.runs);

    fs::remove_file(source).ok();
}

#[test]
fn test_rmv_scenario_reports_baseline() {
    let source = write_dataset("rmv.csv");
    let mut param = create_params(&source);
    param.general.scenario = ScenarioKind::Rmv;
    param.data.downsample_training_rate = 0.5;
    param.ga.initial_fillups = vec![3];

    let experiment = run(&param).unwrap();
    assert_eq!(experiment.runs.len(), 3);
    for run in &experiment.runs {
        assert_eq!(run.training_size, 7);
        assert_eq!(run.validation_size, 6);
        assert!(run.baseline_fitness.is_some());
        assert!(run.training_rows.windows(2).all(|w| w[0] < w[1]));
    }

    fs::remove_file(source).ok();
}

#[test]
fn test_missing_source_fails_before_loading() {
    let mut param = Param::default();
    param.data.destination = "unused.json".to_string();

    let result = run(&param);
    assert!(matches!(result, Err(GasvmError::Configuration(_))));
}

#[test]
fn test_unreadable_source_is_an_io_error() {
    let mut param = create_params(&temp_path("does_not_exist.csv"));
    param.data.destination = "unused.json".to_string();

    let result = run(&param);
    assert!(matches!(result, Err(GasvmError::Io { .. })));
}

#[test]
fn test_report_save_and_reload() {
    let source = write_dataset("report.csv");
    let param = create_params(&source);
    let experiment = run(&param).unwrap();

    for extension in ["json", "yaml", "bin"] {
        let path = temp_path(&format!("report.{}", extension));
        experiment.save_auto(&path).unwrap();
        let loaded = Experiment::load_auto(&path).unwrap();

        assert_eq!(loaded.id, experiment.id);
        assert_eq!(loaded.runs.len(), experiment.runs.len());
        assert_eq!(loaded.runs[0].selected_rows, experiment.runs[0].selected_rows);
        assert_eq!(loaded.runs[0].trace, experiment.runs[0].trace);
        fs::remove_file(path).ok();
    }

    fs::remove_file(source).ok();
}
