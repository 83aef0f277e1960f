//! End-to-end runs over a small synthetic stroke file.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use stroke_pipeline::config::PipelineConfig;
use stroke_pipeline::io::read_parquet;
use stroke_pipeline::pipeline::{run, OutputLayout};

const ROWS: usize = 300;

fn write_input(path: &Path) {
    let mut csv = String::from(
        "id,gender,age,hypertension,heart_disease,ever_married,work_type,Residence_type,avg_glucose_level,bmi,smoking_status,stroke\n",
    );
    for i in 0..ROWS {
        let age = (i * 37 % 80) as f64 + 1.0;
        let glucose = if i % 5 == 0 {
            200.0 + (i % 13) as f64 * 3.0
        } else {
            80.0 + (i % 17) as f64 * 2.0
        };
        let bmi = if i % 23 == 0 {
            "N/A".to_string()
        } else {
            format!("{:.1}", 17.0 + (i % 19) as f64)
        };
        let smoking = if i % 6 == 0 {
            "Unknown"
        } else {
            ["never smoked", "formerly smoked", "smokes"][(i / 2) % 3]
        };
        let work = if age < 12.0 {
            "children"
        } else {
            ["Private", "Self-employed", "Govt_job"][i % 3]
        };
        let stroke = u8::from((age > 60.0 && i % 3 != 0) || i % 29 == 0);
        writeln!(
            csv,
            "{},{},{:.1},{},{},{},{},{},{:.2},{},{},{}",
            i,
            ["Male", "Female"][i % 2],
            age,
            u8::from(i % 7 == 0),
            u8::from(i % 11 == 0),
            if age > 25.0 { "Yes" } else { "No" },
            work,
            ["Urban", "Rural"][(i / 2) % 2],
            glucose,
            bmi,
            smoking,
            stroke
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}

fn config(dir: &TempDir) -> PipelineConfig {
    let input = dir.path().join("stroke.csv");
    write_input(&input);
    let mut config = PipelineConfig {
        input,
        output_dir: dir.path().join("out"),
        ..PipelineConfig::default()
    };
    config.sbrl.iterations = 500;
    config.sbrl.chains = 2;
    config
}

#[tokio::test]
async fn runs_every_stage() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let summary = run(&config, false).await.unwrap();

    assert_eq!(summary.input_rows, ROWS);
    let missing = |column: &str| {
        summary
            .missingness
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.missing)
    };
    assert_eq!(missing("bmi"), Some(14));
    assert_eq!(missing("smoking_status"), Some(50));
    assert_eq!(missing("age"), Some(0));

    assert_eq!(summary.imputation.dropped_missing_bmi, 14);
    assert_eq!(
        summary.imputation.smoking_filled_never + summary.imputation.smoking_filled_unknown,
        50
    );
    assert_eq!(summary.modelling_rows, ROWS - 14);
    assert_eq!(
        summary.resample.minority_before + summary.resample.majority + summary.test_rows,
        summary.modelling_rows
    );
    assert_eq!(
        summary.train_rows,
        summary.resample.minority_before + summary.resample.majority + summary.resample.synthesized
    );

    assert!((0.0..=1.0).contains(&summary.evaluation.auc));
    assert_eq!(summary.evaluation.confusion.total(), summary.test_rows);
    assert_eq!(summary.rules.rules.last().map(|r| r.condition.as_str()), Some("default"));
    assert!(summary.causal.is_some());

    let layout = OutputLayout::new(&config.output_dir);
    for path in [
        layout.raw(),
        layout.silver(),
        layout.gold_train(),
        layout.gold_test(),
        layout.debug_csv(),
        layout.sbrl_dir().join("train.tab"),
        layout.sbrl_dir().join("train.label"),
        layout.sbrl_dir().join("test.tab"),
        layout.sbrl_dir().join("test.label"),
        layout.missingness(),
        layout.roc(),
        layout.rule_list(),
        layout.pag(),
        layout.report(),
    ] {
        assert!(path.exists(), "{:?} was not written", path);
    }

    let report = fs::read_to_string(layout.report()).unwrap();
    assert!(report.contains("## Causal structure"));
    assert!(fs::read_to_string(layout.pag()).unwrap().starts_with("digraph pag {"));
}

#[tokio::test]
async fn silver_stage_resolves_missing_values() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    run(&config, true).await.unwrap();

    let silver = read_parquet(OutputLayout::new(&config.output_dir).silver())
        .await
        .unwrap();
    assert_eq!(silver.height(), ROWS - 14);
    for column in ["smoking_status", "bmi_group", "age_group", "glucose_group"] {
        assert_eq!(silver.column(column).unwrap().null_count(), 0, "{}", column);
    }
}

#[tokio::test]
async fn transaction_files_cover_every_record() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let summary = run(&config, true).await.unwrap();

    let labels = fs::read_to_string(OutputLayout::new(&config.output_dir).sbrl_dir().join("train.label")).unwrap();
    let lines: Vec<&str> = labels.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("{label=0}"));
    for line in lines {
        assert_eq!(line.split_whitespace().count(), summary.train_rows + 1);
    }
}

#[tokio::test]
async fn same_seed_reproduces_buckets_and_rules() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = run(&config(&first_dir), true).await.unwrap();
    let second = run(&config(&second_dir), true).await.unwrap();

    assert_eq!(first.buckets, second.buckets);
    assert_eq!(first.glucose.quartiles, second.glucose.quartiles);
    assert_eq!(first.train_rows, second.train_rows);
    assert_eq!(
        first.evaluation.auc.to_bits(),
        second.evaluation.auc.to_bits()
    );
    let conditions = |s: &stroke_pipeline::report::RunSummary| -> Vec<String> {
        s.rules.rules.iter().map(|r| r.condition.clone()).collect()
    };
    assert_eq!(conditions(&first), conditions(&second));
}
