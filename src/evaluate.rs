use serde::Serialize;
use smartcore::metrics::accuracy;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};

use crate::config::TreeConfig;
use crate::error::{PipelineError, Result};
use crate::table::CategoricalTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    /// Scores at or above this value are called positive.
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
    pub true_positives: usize,
    pub false_positives: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl Confusion {
    pub fn at(labels: &[u8], scores: &[f64], threshold: f64) -> Self {
        let mut confusion = Confusion {
            true_positive: 0,
            false_positive: 0,
            true_negative: 0,
            false_negative: 0,
        };
        for (label, score) in labels.iter().zip(scores) {
            match (*label == 1, *score >= threshold) {
                (true, true) => confusion.true_positive += 1,
                (false, true) => confusion.false_positive += 1,
                (false, false) => confusion.true_negative += 1,
                (true, false) => confusion.false_negative += 1,
            }
        }
        confusion
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub auc: f64,
    pub threshold: f64,
    pub accuracy: f64,
    pub confusion: Confusion,
    #[serde(skip)]
    pub roc: Vec<RocPoint>,
}

/// ROC points from (0, 0) to (1, 1), one per distinct score, descending.
pub fn roc_curve(labels: &[u8], scores: &[f64]) -> Result<Vec<RocPoint>> {
    if labels.len() != scores.len() {
        return Err(PipelineError::Config(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    let positives = labels.iter().filter(|l| **l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::Empty(
            "ROC needs both positive and negative labels".into(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
        true_positives: 0,
        false_positives: 0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            fpr: fp as f64 / negatives as f64,
            tpr: tp as f64 / positives as f64,
            true_positives: tp,
            false_positives: fp,
        });
    }
    Ok(points)
}

/// Trapezoidal area under a ROC curve.
pub fn auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}

/// Point maximising Youden's J = TPR − FPR; the first such point wins.
///
/// J is compared as `tp * negatives - fp * positives` so equal rates tie
/// exactly. The last point of a curve carries the class totals.
pub fn optimal_threshold(points: &[RocPoint]) -> Option<RocPoint> {
    let last = points.last()?;
    let positives = last.true_positives as i128;
    let negatives = last.false_positives as i128;
    let youden =
        |p: &RocPoint| p.true_positives as i128 * negatives - p.false_positives as i128 * positives;

    let mut best: Option<RocPoint> = None;
    for point in points.iter().filter(|p| p.threshold.is_finite()) {
        let better = match &best {
            Some(b) => youden(point) > youden(b),
            None => true,
        };
        if better {
            best = Some(*point);
        }
    }
    best
}

pub fn evaluate(labels: &[u8], scores: &[f64]) -> Result<Evaluation> {
    let roc = roc_curve(labels, scores)?;
    let best = optimal_threshold(&roc)
        .ok_or_else(|| PipelineError::Empty("no finite ROC threshold".into()))?;
    let confusion = Confusion::at(labels, scores, best.threshold);

    let y_true: Vec<i32> = labels.iter().map(|l| i32::from(*l)).collect();
    let y_pred: Vec<i32> = scores
        .iter()
        .map(|s| i32::from(*s >= best.threshold))
        .collect();

    Ok(Evaluation {
        auc: auc(&roc),
        threshold: best.threshold,
        accuracy: accuracy(&y_true, &y_pred),
        confusion,
        roc,
    })
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BaselineMetrics {
    pub accuracy: f64,
    pub auc: f64,
}

/// Depth-limited decision tree on one-hot features, scored on `test`.
pub fn decision_tree_baseline(
    train: &CategoricalTable,
    test: &CategoricalTable,
    config: &TreeConfig,
) -> Result<BaselineMetrics> {
    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::Empty(
            "decision tree needs non-empty train and test sets".into(),
        ));
    }
    let positives = train.positives();
    if positives == 0 || positives == train.len() {
        return Err(PipelineError::Config(
            "decision tree training labels hold a single class".into(),
        ));
    }
    let x_train = train.one_hot();
    let y_train = train.labels_i32();
    let tree = DecisionTreeClassifier::fit(
        &x_train,
        &y_train,
        DecisionTreeClassifierParameters::default().with_max_depth(config.max_depth),
    )?;

    let y_test = test.labels_i32();
    let predictions = tree.predict(&test.one_hot())?;
    let scores: Vec<f64> = predictions.iter().map(|p| f64::from(*p)).collect();

    Ok(BaselineMetrics {
        accuracy: accuracy(&y_test, &predictions),
        auc: auc(&roc_curve(&test.labels, &scores)?),
    })
}
