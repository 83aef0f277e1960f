//! Markdown run report.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::discretize::GlucoseBucketer;
use crate::error::Result;
use crate::evaluate::{BaselineMetrics, Evaluation};
use crate::impute::ImputationSummary;
use crate::missingness::ColumnMissingness;
use crate::sbrl::RuleListSummary;
use crate::smote::ResampleSummary;

#[derive(Debug, Clone)]
pub struct CausalSummary {
    pub edges: Vec<String>,
    pub tests: usize,
    pub skeleton_edges: usize,
    pub removed_by_pds: usize,
}

/// Everything the stages report back, in stage order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub input_rows: usize,
    pub missingness: Vec<ColumnMissingness>,
    pub glucose: GlucoseBucketer,
    pub buckets: BTreeMap<String, BTreeMap<String, usize>>,
    pub imputation: ImputationSummary,
    pub modelling_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub resample: ResampleSummary,
    pub rules: RuleListSummary,
    pub evaluation: Evaluation,
    pub baseline: BaselineMetrics,
    pub causal: Option<CausalSummary>,
}

pub fn render(summary: &RunSummary) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, summary)?;
    Ok(out)
}

fn write_report(out: &mut String, s: &RunSummary) -> std::fmt::Result {
    writeln!(out, "# Stroke dataset report\n")?;
    writeln!(out, "Input records: {}\n", s.input_rows)?;

    writeln!(out, "## Missing values\n")?;
    writeln!(out, "| column | missing | percent |")?;
    writeln!(out, "|---|---:|---:|")?;
    for m in &s.missingness {
        writeln!(out, "| {} | {} | {:.2} |", m.column, m.missing, m.percent)?;
    }

    writeln!(out, "\n## Buckets\n")?;
    let mixture = &s.glucose.mixture;
    writeln!(
        out,
        "Glucose mixture ({} EM iterations, converged: {}):\n",
        mixture.iterations, mixture.converged
    )?;
    writeln!(out, "| component | weight | mean | sd | Q1 | Q3 |")?;
    writeln!(out, "|---|---:|---:|---:|---:|---:|")?;
    for (k, name) in ["normal", "high"].iter().enumerate() {
        writeln!(
            out,
            "| {} | {:.3} | {:.2} | {:.2} | {:.2} | {:.2} |",
            name,
            mixture.weights[k],
            mixture.means[k],
            mixture.variances[k].sqrt(),
            s.glucose.quartiles[k].0,
            s.glucose.quartiles[k].1
        )?;
    }
    for (column, counts) in &s.buckets {
        writeln!(out, "\n`{}`:\n", column)?;
        writeln!(out, "| level | records |")?;
        writeln!(out, "|---|---:|")?;
        for (level, count) in counts {
            writeln!(out, "| {} | {} |", level, count)?;
        }
    }

    writeln!(out, "\n## Imputation\n")?;
    writeln!(
        out,
        "- smoking status set to `never smoked` (children): {}",
        s.imputation.smoking_filled_never
    )?;
    writeln!(
        out,
        "- smoking status set to `unknown`: {}",
        s.imputation.smoking_filled_unknown
    )?;
    writeln!(
        out,
        "- records dropped for missing BMI: {}",
        s.imputation.dropped_missing_bmi
    )?;
    writeln!(out, "- modelling records: {}", s.modelling_rows)?;

    writeln!(out, "\n## Split and resampling\n")?;
    writeln!(out, "- train records: {}", s.train_rows)?;
    writeln!(out, "- test records: {}", s.test_rows)?;
    writeln!(
        out,
        "- SMOTE: {} positives and {} negatives in train, {} synthesized",
        s.resample.minority_before, s.resample.majority, s.resample.synthesized
    )?;

    writeln!(out, "\n## Rule list\n")?;
    writeln!(out, "Log posterior: {:.3}\n", s.rules.log_posterior)?;
    writeln!(out, "| rule | P(stroke) | captured | positives |")?;
    writeln!(out, "|---|---:|---:|---:|")?;
    for rule in &s.rules.rules {
        writeln!(
            out,
            "| {} | {:.3} | {} | {} |",
            rule.condition, rule.probability, rule.captured, rule.positives
        )?;
    }

    let e = &s.evaluation;
    writeln!(out, "\n## Evaluation\n")?;
    writeln!(out, "- AUC: {:.4}", e.auc)?;
    writeln!(out, "- optimal threshold: {:.4}", e.threshold)?;
    writeln!(out, "- accuracy at threshold: {:.4}", e.accuracy)?;
    writeln!(out, "- sensitivity: {:.4}", e.confusion.sensitivity())?;
    writeln!(out, "- specificity: {:.4}\n", e.confusion.specificity())?;
    writeln!(out, "| | predicted 1 | predicted 0 |")?;
    writeln!(out, "|---|---:|---:|")?;
    writeln!(
        out,
        "| actual 1 | {} | {} |",
        e.confusion.true_positive, e.confusion.false_negative
    )?;
    writeln!(
        out,
        "| actual 0 | {} | {} |",
        e.confusion.false_positive, e.confusion.true_negative
    )?;
    writeln!(
        out,
        "\nDecision tree baseline: accuracy {:.4}, AUC {:.4}",
        s.baseline.accuracy, s.baseline.auc
    )?;

    writeln!(out, "\n## Causal structure\n")?;
    match &s.causal {
        Some(causal) => {
            writeln!(
                out,
                "{} independence tests. The skeleton kept {} edges; possible-D-SEP removed {} more.\n",
                causal.tests, causal.skeleton_edges, causal.removed_by_pds
            )?;
            for edge in &causal.edges {
                writeln!(out, "- `{}`", edge)?;
            }
        }
        None => writeln!(out, "Skipped.")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::Confusion;
    use crate::mixture::GaussianMixture;
    use crate::sbrl::RuleSummary;

    fn summary() -> RunSummary {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            "bmi_group".to_string(),
            vec![("normal".to_string(), 3), ("obese".to_string(), 1)]
                .into_iter()
                .collect(),
        );
        RunSummary {
            input_rows: 5,
            missingness: vec![ColumnMissingness {
                column: "bmi".into(),
                missing: 1,
                percent: 20.0,
            }],
            glucose: GlucoseBucketer {
                mixture: GaussianMixture {
                    weights: [0.8, 0.2],
                    means: [90.0, 210.0],
                    variances: [400.0, 900.0],
                    log_likelihood: -10.0,
                    iterations: 12,
                    converged: true,
                },
                quartiles: [(80.0, 100.0), (190.0, 230.0)],
            },
            buckets,
            imputation: ImputationSummary {
                smoking_filled_never: 1,
                smoking_filled_unknown: 2,
                dropped_missing_bmi: 1,
            },
            modelling_rows: 4,
            train_rows: 3,
            test_rows: 1,
            resample: ResampleSummary {
                minority_before: 1,
                majority: 2,
                synthesized: 1,
            },
            rules: RuleListSummary {
                rules: vec![RuleSummary {
                    condition: "age_group=elderly".into(),
                    probability: 0.4,
                    captured: 2,
                    positives: 1,
                }],
                log_posterior: -3.5,
            },
            evaluation: Evaluation {
                auc: 0.75,
                threshold: 0.4,
                accuracy: 0.5,
                confusion: Confusion {
                    true_positive: 1,
                    false_positive: 1,
                    true_negative: 0,
                    false_negative: 0,
                },
                roc: Vec::new(),
            },
            baseline: BaselineMetrics {
                accuracy: 0.5,
                auc: 0.5,
            },
            causal: None,
        }
    }

    #[test]
    fn renders_every_section() {
        let text = render(&summary()).unwrap();
        for heading in [
            "## Missing values",
            "## Buckets",
            "## Imputation",
            "## Split and resampling",
            "## Rule list",
            "## Evaluation",
            "## Causal structure",
        ] {
            assert!(text.contains(heading), "missing {}", heading);
        }
        assert!(text.contains("| bmi | 1 | 20.00 |"));
        assert!(text.contains("| age_group=elderly | 0.400 | 2 | 1 |"));
        assert!(text.contains("| high | 0.200 | 210.00 | 30.00 | 190.00 | 230.00 |"));
        assert!(text.contains("Skipped."));
    }

    #[test]
    fn lists_pag_edges() {
        let mut s = summary();
        s.causal = Some(CausalSummary {
            edges: vec!["age_group o-> stroke".into()],
            tests: 10,
            skeleton_edges: 2,
            removed_by_pds: 1,
        });
        let text = render(&s).unwrap();
        assert!(text.contains("- `age_group o-> stroke`"));
        assert!(text.contains("The skeleton kept 2 edges; possible-D-SEP removed 1 more."));
        assert!(!text.contains("Skipped."));
    }
}
