//! Medallion stages: raw → silver → gold, then model training, causal
//! discovery and the report. Every table stage leaves a Parquet snapshot
//! under the output directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use polars::prelude::*;

use crate::causal::{self, Dataset};
use crate::config::PipelineConfig;
use crate::discretize::{discretize, finite_values, level_counts, GlucoseBucketer};
use crate::error::Result;
use crate::evaluate::{decision_tree_baseline, evaluate, BaselineMetrics, Evaluation};
use crate::impute::{impute, ImputationSummary};
use crate::io::{read_csv, read_parquet, write_csv, write_json, write_parquet, write_records, write_text};
use crate::missingness::{missingness, ColumnMissingness};
use crate::records::{StrokeRecord, AGE_GROUP, AVG_GLUCOSE_LEVEL, BMI_GROUP, GLUCOSE_GROUP, STROKE};
use crate::report::{self, CausalSummary, RunSummary};
use crate::sbrl::{RuleList, RuleListSummary};
use crate::smote::{oversample, ResampleSummary};
use crate::table::{split, CategoricalTable};
use crate::transactions;

pub static STROKE_FILE_NAME: &str = "stroke.parquet";

/// Where each stage writes under the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn raw(&self) -> PathBuf {
        self.root.join("raw").join(STROKE_FILE_NAME)
    }

    pub fn silver(&self) -> PathBuf {
        self.root.join("silver").join(STROKE_FILE_NAME)
    }

    pub fn gold_train(&self) -> PathBuf {
        self.root.join("gold").join("train.parquet")
    }

    pub fn gold_test(&self) -> PathBuf {
        self.root.join("gold").join("test.parquet")
    }

    pub fn debug_csv(&self) -> PathBuf {
        self.root.join("gold").join("debug.csv")
    }

    pub fn sbrl_dir(&self) -> PathBuf {
        self.root.join("sbrl")
    }

    pub fn missingness(&self) -> PathBuf {
        self.root.join("missingness.csv")
    }

    pub fn roc(&self) -> PathBuf {
        self.root.join("roc.csv")
    }

    pub fn rule_list(&self) -> PathBuf {
        self.root.join("rule_list.json")
    }

    pub fn pag(&self) -> PathBuf {
        self.root.join("pag.dot")
    }

    pub fn report(&self) -> PathBuf {
        self.root.join("report.md")
    }
}


pub struct RawOutput {
    pub rows: usize,
    pub missingness: Vec<ColumnMissingness>,
}

/// Load the source file, make the 0/1 columns categorical and snapshot it.
pub async fn process_raw(input: &Path, layout: &OutputLayout) -> Result<RawOutput> {
    let df = read_csv(input).await?;
    let mut df = df
        .lazy()
        .with_columns(
            StrokeRecord::binary_coded()
                .iter()
                .map(|name| {
                    col(name)
                        .cast(DataType::Utf8)
                        .cast(DataType::Categorical(None))
                })
                .collect::<Vec<_>>(),
        )
        .collect()?;
    info!("loaded {} records from {:?}", df.height(), input);

    let missing = missingness(&df);
    for m in missing.iter().filter(|m| m.missing > 0) {
        info!("{}: {} missing ({:.2}%)", m.column, m.missing, m.percent);
    }
    write_records(layout.missingness(), &missing)?;
    write_parquet(layout.raw(), &mut df).await?;

    Ok(RawOutput {
        rows: df.height(),
        missingness: missing,
    })
}

pub struct SilverOutput {
    pub glucose: GlucoseBucketer,
    /// Level counts of each derived bucket column, before imputation.
    pub buckets: BTreeMap<String, BTreeMap<String, usize>>,
    pub imputation: ImputationSummary,
    pub rows: usize,
}

/// Discretize, then resolve missing values.
pub async fn process_silver(config: &PipelineConfig, layout: &OutputLayout) -> Result<SilverOutput> {
    let df = read_parquet(layout.raw()).await?;

    let glucose = GlucoseBucketer::fit(
        &finite_values(&df, AVG_GLUCOSE_LEVEL)?,
        &config.mixture,
        config.seed,
    )?;
    let mixture = &glucose.mixture;
    info!(
        "glucose mixture: means {:.2} / {:.2}, weights {:.3} / {:.3}, {} iterations",
        mixture.means[0], mixture.means[1], mixture.weights[0], mixture.weights[1], mixture.iterations
    );

    let df = discretize(df, glucose.clone())?;
    let mut buckets = BTreeMap::new();
    for column in [AGE_GROUP, BMI_GROUP, GLUCOSE_GROUP] {
        let counts = level_counts(&df, column)?;
        debug!("{}: {:?}", column, counts);
        buckets.insert(column.to_string(), counts);
    }

    let (mut df, imputation) = impute(df)?;
    info!(
        "smoking status: {} set to never smoked, {} set to unknown; {} records dropped for missing BMI",
        imputation.smoking_filled_never,
        imputation.smoking_filled_unknown,
        imputation.dropped_missing_bmi
    );
    write_parquet(layout.silver(), &mut df).await?;

    Ok(SilverOutput {
        glucose,
        buckets,
        imputation,
        rows: df.height(),
    })
}

pub struct GoldOutput {
    /// Every modelling record, before the split.
    pub table: CategoricalTable,
    /// Resampled training partition.
    pub train: CategoricalTable,
    pub test: CategoricalTable,
    pub resample: ResampleSummary,
}

/// Encode, split, oversample the training partition and export it.
pub async fn process_gold(config: &PipelineConfig, layout: &OutputLayout) -> Result<GoldOutput> {
    let df = read_parquet(layout.silver()).await?;
    let table = CategoricalTable::from_frame(&df, &StrokeRecord::feature_columns(), STROKE)?;
    let (train, test) = split(&table, config.test_fraction, config.seed)?;
    let (train, resample) = oversample(&train, &config.smote, config.seed)?;
    info!(
        "train {} records ({} synthesized), test {} records",
        train.len(),
        resample.synthesized,
        test.len()
    );

    let mut train_df = train.to_frame(STROKE)?;
    let mut test_df = test.to_frame(STROKE)?;
    write_csv(layout.debug_csv(), &mut train_df).await?;
    write_parquet(layout.gold_train(), &mut train_df).await?;
    write_parquet(layout.gold_test(), &mut test_df).await?;

    let sbrl_dir = layout.sbrl_dir();
    transactions::export(&train, &sbrl_dir, "train")?;
    transactions::export(&test, &sbrl_dir, "test")?;

    Ok(GoldOutput {
        table,
        train,
        test,
        resample,
    })
}

pub struct TrainOutput {
    pub rules: RuleListSummary,
    pub evaluation: Evaluation,
    pub baseline: BaselineMetrics,
}

/// Fit the rule list and the tree baseline, score the test partition.
pub async fn train_dataset(
    config: &PipelineConfig,
    layout: &OutputLayout,
    train: &CategoricalTable,
    test: &CategoricalTable,
) -> Result<TrainOutput> {
    let list = RuleList::fit(train, &config.sbrl, config.seed)?;
    for line in list.describe(&train.features) {
        info!("{}", line);
    }

    let scores = list.predict_proba(test);
    let evaluation = evaluate(&test.labels, &scores)?;
    info!(
        "rule list: AUC {:.4}, threshold {:.4}, accuracy {:.4}",
        evaluation.auc, evaluation.threshold, evaluation.accuracy
    );
    write_records(layout.roc(), &evaluation.roc)?;

    let rules = list.summary(&train.features);
    write_json(layout.rule_list(), &rules)?;

    let baseline = decision_tree_baseline(train, test, &config.tree)?;
    info!(
        "decision tree: accuracy {:.4}, AUC {:.4}",
        baseline.accuracy, baseline.auc
    );

    Ok(TrainOutput {
        rules,
        evaluation,
        baseline,
    })
}

/// Run FCI over every modelling record and write the PAG.
pub async fn learn_structure(
    config: &PipelineConfig,
    layout: &OutputLayout,
    table: &CategoricalTable,
) -> Result<CausalSummary> {
    let data = Dataset::from_table(table, STROKE);
    let result = causal::learn(&data, &config.fci)?;
    write_text(layout.pag(), &result.pag.to_dot())?;

    let edges: Vec<String> = result.pag.edges().iter().map(ToString::to_string).collect();
    for edge in &edges {
        debug!("{}", edge);
    }
    Ok(CausalSummary {
        edges,
        tests: result.tests,
        skeleton_edges: result.skeleton_edges,
        removed_by_pds: result.removed_by_pds,
    })
}

/// Every stage in order, then the report.
pub async fn run(config: &PipelineConfig, skip_causal: bool) -> Result<RunSummary> {
    config.validate()?;
    let layout = OutputLayout::new(&config.output_dir);

    let raw = process_raw(&config.input, &layout).await?;
    let silver = process_silver(config, &layout).await?;
    let gold = process_gold(config, &layout).await?;
    let trained = train_dataset(config, &layout, &gold.train, &gold.test).await?;
    let causal = if skip_causal {
        info!("causal discovery skipped");
        None
    } else {
        Some(learn_structure(config, &layout, &gold.table).await?)
    };

    let summary = RunSummary {
        input_rows: raw.rows,
        missingness: raw.missingness,
        glucose: silver.glucose,
        buckets: silver.buckets,
        imputation: silver.imputation,
        modelling_rows: silver.rows,
        train_rows: gold.train.len(),
        test_rows: gold.test.len(),
        resample: gold.resample,
        rules: trained.rules,
        evaluation: trained.evaluation,
        baseline: trained.baseline,
        causal,
    };
    write_text(layout.report(), &report::render(&summary)?)?;
    info!("report written to {:?}", layout.report());
    Ok(summary)
}
