//! Scalable Bayesian Rule Lists.
//!
//! A rule list is an ordered sequence of antecedents followed by a default
//! rule; a record is scored by the first antecedent it satisfies. The
//! posterior combines
//!
//! - a Beta–binomial marginal likelihood for the records each rule captures,
//! - a truncated Poisson(λ) prior on the list length,
//! - a truncated Poisson(η) prior on each antecedent's cardinality, with a
//!   uniform choice among the unused antecedents of that cardinality.
//!
//! The list is searched with Metropolis–Hastings (insert, remove and swap
//! moves) over several seeded chains; the highest-posterior list seen wins.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::SbrlConfig;
use crate::error::{PipelineError, Result};
use crate::rules::{mine, Antecedent, Bitmap};
use crate::special::{ln_beta, ln_gamma};
use crate::table::{CategoricalTable, Feature};

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub antecedent: Antecedent,
    pub captured: usize,
    pub positives: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleList {
    pub rules: Vec<Rule>,
    pub default_captured: usize,
    pub default_positives: usize,
    pub default_probability: f64,
    pub log_posterior: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub condition: String,
    pub probability: f64,
    pub captured: usize,
    pub positives: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleListSummary {
    pub rules: Vec<RuleSummary>,
    pub log_posterior: f64,
}

fn ln_poisson(k: usize, rate: f64) -> f64 {
    k as f64 * rate.ln() - rate - ln_gamma(k as f64 + 1.0)
}

fn log_sum_exp(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Insert,
    Remove,
    Swap,
}

fn available_moves(len: usize, total: usize) -> Vec<Move> {
    let mut moves = Vec::with_capacity(3);
    if len < total {
        moves.push(Move::Insert);
    }
    if len > 0 {
        moves.push(Move::Remove);
    }
    if len > 1 {
        moves.push(Move::Swap);
    }
    moves
}

/// Log posterior of rule lists over a fixed candidate set.
struct Posterior<'a> {
    candidates: &'a [Antecedent],
    positives: Bitmap,
    n: usize,
    alpha: [f64; 2],
    eta: f64,
    /// Number of candidates per cardinality (index 0 unused).
    cardinality_counts: Vec<usize>,
    length_prior: Vec<f64>,
}

impl<'a> Posterior<'a> {
    fn new(candidates: &'a [Antecedent], table: &CategoricalTable, config: &SbrlConfig) -> Self {
        let max_card = candidates.iter().map(|a| a.cardinality()).max().unwrap_or(0);
        let mut cardinality_counts = vec![0; max_card + 1];
        for antecedent in candidates {
            cardinality_counts[antecedent.cardinality()] += 1;
        }

        let raw: Vec<f64> = (0..=candidates.len())
            .map(|m| ln_poisson(m, config.lambda))
            .collect();
        let norm = log_sum_exp(raw.iter().copied());
        let length_prior = raw.iter().map(|v| v - norm).collect();

        let mut positives = Bitmap::zeros(table.len());
        for (i, label) in table.labels.iter().enumerate() {
            if *label == 1 {
                positives.set(i);
            }
        }

        Self {
            candidates,
            positives,
            n: table.len(),
            alpha: config.alpha,
            eta: config.eta,
            cardinality_counts,
            length_prior,
        }
    }

    fn log_prior(&self, list: &[usize]) -> f64 {
        let mut lp = self.length_prior[list.len()];
        let mut remaining = self.cardinality_counts.clone();
        for &idx in list {
            let card = self.candidates[idx].cardinality();
            let norm = log_sum_exp(
                remaining
                    .iter()
                    .enumerate()
                    .skip(1)
                    .filter(|(_, count)| **count > 0)
                    .map(|(c, _)| ln_poisson(c, self.eta)),
            );
            lp += ln_poisson(card, self.eta) - norm - (remaining[card] as f64).ln();
            remaining[card] -= 1;
        }
        lp
    }

    fn ln_marginal(&self, captured: usize, positives: usize) -> f64 {
        let [a0, a1] = self.alpha;
        let negatives = captured - positives;
        ln_beta(positives as f64 + a1, negatives as f64 + a0) - ln_beta(a1, a0)
    }

    /// (captured, positives) per rule, default rule last.
    fn captures(&self, list: &[usize]) -> Vec<(usize, usize)> {
        let mut remaining = Bitmap::ones(self.n);
        let mut out = Vec::with_capacity(list.len() + 1);
        for &idx in list {
            let support = &self.candidates[idx].support;
            let captured = remaining.and(support);
            out.push((captured.count(), captured.count_and(&self.positives)));
            remaining = remaining.and_not(support);
        }
        out.push((remaining.count(), remaining.count_and(&self.positives)));
        out
    }

    fn log_likelihood(&self, list: &[usize]) -> f64 {
        self.captures(list)
            .into_iter()
            .map(|(captured, positives)| self.ln_marginal(captured, positives))
            .sum()
    }

    fn log_posterior(&self, list: &[usize]) -> f64 {
        self.log_likelihood(list) + self.log_prior(list)
    }

    fn run_chain(&self, iterations: usize, rng: &mut StdRng) -> (Vec<usize>, f64) {
        let total = self.candidates.len();
        let mut current: Vec<usize> = Vec::new();
        let mut in_list = vec![false; total];
        let mut current_lp = self.log_posterior(&current);
        let mut best = (current.clone(), current_lp);

        for _ in 0..iterations {
            let len = current.len();
            let moves = available_moves(len, total);
            if moves.is_empty() {
                break;
            }
            let chosen = moves[rng.gen_range(0..moves.len())];
            let forward_move = (moves.len() as f64).recip();

            let mut proposal = current.clone();
            let (log_forward, log_reverse, toggled) = match chosen {
                Move::Insert => {
                    let pick = rng.gen_range(0..total - len);
                    let rule = (0..total)
                        .filter(|i| !in_list[*i])
                        .nth(pick)
                        .unwrap_or_default();
                    let position = rng.gen_range(0..=len);
                    proposal.insert(position, rule);
                    let reverse_move = (available_moves(len + 1, total).len() as f64).recip();
                    (
                        forward_move.ln() - ((total - len) as f64).ln() - ((len + 1) as f64).ln(),
                        reverse_move.ln() - ((len + 1) as f64).ln(),
                        Some(rule),
                    )
                }
                Move::Remove => {
                    let position = rng.gen_range(0..len);
                    let rule = proposal.remove(position);
                    let reverse_move = (available_moves(len - 1, total).len() as f64).recip();
                    (
                        forward_move.ln() - (len as f64).ln(),
                        reverse_move.ln() - ((total - len + 1) as f64).ln() - (len as f64).ln(),
                        Some(rule),
                    )
                }
                Move::Swap => {
                    let i = rng.gen_range(0..len);
                    let mut j = rng.gen_range(0..len - 1);
                    if j >= i {
                        j += 1;
                    }
                    proposal.swap(i, j);
                    (0.0, 0.0, None)
                }
            };

            let proposal_lp = self.log_posterior(&proposal);
            let log_accept = proposal_lp - current_lp + log_reverse - log_forward;
            if log_accept >= 0.0 || rng.gen::<f64>().ln() < log_accept {
                if let Some(rule) = toggled {
                    in_list[rule] = !in_list[rule];
                }
                current = proposal;
                current_lp = proposal_lp;
                if current_lp > best.1 {
                    best = (current.clone(), current_lp);
                }
            }
        }
        best
    }
}

impl RuleList {
    pub fn fit(table: &CategoricalTable, config: &SbrlConfig, seed: u64) -> Result<Self> {
        if table.is_empty() {
            return Err(PipelineError::Empty("rule list training set is empty".into()));
        }
        let positives = table.positives();
        if positives == 0 || positives == table.len() {
            return Err(PipelineError::Empty(
                "rule list training labels contain a single class".into(),
            ));
        }

        let candidates = mine(table, config.min_support, config.max_cardinality);
        info!(
            "mined {} candidate antecedents (support >= {}, cardinality <= {})",
            candidates.len(),
            config.min_support,
            config.max_cardinality
        );
        let posterior = Posterior::new(&candidates, table, config);

        let mut best: (Vec<usize>, f64) = (Vec::new(), posterior.log_posterior(&[]));
        for chain in 0..config.chains {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(chain as u64));
            let (list, lp) = posterior.run_chain(config.iterations, &mut rng);
            debug!("chain {}: {} rules, log posterior {:.3}", chain, list.len(), lp);
            if lp > best.1 {
                best = (list, lp);
            }
        }

        let (list, log_posterior) = best;
        let captures = posterior.captures(&list);
        let [a0, a1] = config.alpha;
        let mean = |captured: usize, positives: usize| {
            (positives as f64 + a1) / (captured as f64 + a0 + a1)
        };

        let rules = list
            .iter()
            .zip(&captures)
            .map(|(&idx, &(captured, positives))| Rule {
                antecedent: candidates[idx].clone(),
                captured,
                positives,
                probability: mean(captured, positives),
            })
            .collect();
        let (default_captured, default_positives) = captures[captures.len() - 1];

        Ok(Self {
            rules,
            default_captured,
            default_positives,
            default_probability: mean(default_captured, default_positives),
            log_posterior,
        })
    }

    pub fn predict_row(&self, row: &[u32]) -> f64 {
        self.rules
            .iter()
            .find(|rule| rule.antecedent.matches(row))
            .map(|rule| rule.probability)
            .unwrap_or(self.default_probability)
    }

    pub fn predict_proba(&self, table: &CategoricalTable) -> Vec<f64> {
        table.rows.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn summary(&self, features: &[Feature]) -> RuleListSummary {
        let mut rules: Vec<RuleSummary> = self
            .rules
            .iter()
            .map(|rule| RuleSummary {
                condition: rule.antecedent.describe(features),
                probability: rule.probability,
                captured: rule.captured,
                positives: rule.positives,
            })
            .collect();
        rules.push(RuleSummary {
            condition: "default".to_string(),
            probability: self.default_probability,
            captured: self.default_captured,
            positives: self.default_positives,
        });
        RuleListSummary {
            rules,
            log_posterior: self.log_posterior,
        }
    }

    /// `IF ... THEN`, `ELSE IF ... THEN`, `ELSE` lines.
    pub fn describe(&self, features: &[Feature]) -> Vec<String> {
        let mut lines: Vec<String> = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                format!(
                    "{} ({}) THEN P(stroke) = {:.3} [{} / {}]",
                    if i == 0 { "IF" } else { "ELSE IF" },
                    rule.antecedent.describe(features),
                    rule.probability,
                    rule.positives,
                    rule.captured
                )
            })
            .collect();
        lines.push(format!(
            "{}P(stroke) = {:.3} [{} / {}]",
            if self.rules.is_empty() { "" } else { "ELSE " },
            self.default_probability,
            self.default_positives,
            self.default_captured
        ));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `risk=high` is almost always positive, everything else rarely.
    fn table() -> CategoricalTable {
        let features = vec![
            Feature {
                name: "risk".into(),
                levels: vec!["high".into(), "low".into()],
            },
            Feature {
                name: "noise".into(),
                levels: vec!["a".into(), "b".into()],
            },
        ];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..200u32 {
            let high = i % 4 == 0;
            rows.push(vec![if high { 0 } else { 1 }, i % 2]);
            let positive = if high { i % 25 != 0 } else { i % 30 == 1 };
            labels.push(u8::from(positive));
        }
        CategoricalTable {
            features,
            rows,
            labels,
        }
    }

    fn config() -> SbrlConfig {
        SbrlConfig {
            min_support: 0.05,
            max_cardinality: 2,
            lambda: 1.0,
            eta: 1.0,
            alpha: [1.0, 1.0],
            chains: 2,
            iterations: 500,
        }
    }

    #[test]
    fn posterior_prefers_separating_rule() {
        let t = table();
        let candidates = mine(&t, 0.05, 1);
        let posterior = Posterior::new(&candidates, &t, &config());
        let high = candidates
            .iter()
            .position(|a| a.describe(&t.features) == "risk=high")
            .unwrap();
        let noise = candidates
            .iter()
            .position(|a| a.describe(&t.features) == "noise=a")
            .unwrap();
        assert!(posterior.log_posterior(&[high]) > posterior.log_posterior(&[]));
        assert!(posterior.log_posterior(&[high]) > posterior.log_posterior(&[noise]));
    }

    #[test]
    fn prior_penalises_length() {
        let t = table();
        let candidates = mine(&t, 0.05, 2);
        let posterior = Posterior::new(&candidates, &t, &config());
        assert!(posterior.log_prior(&[0]) > posterior.log_prior(&[0, 1, 2]));
    }

    #[test]
    fn fit_finds_high_risk_rule() {
        let t = table();
        let model = RuleList::fit(&t, &config(), 7).unwrap();
        assert!(!model.rules.is_empty());
        let high_row = [0u32, 0];
        let low_row = [1u32, 1];
        assert!(model.predict_row(&high_row) > 0.8);
        assert!(model.predict_row(&low_row) < 0.2);
        let total: usize = model.rules.iter().map(|r| r.captured).sum::<usize>() + model.default_captured;
        assert_eq!(total, t.len());
    }

    #[test]
    fn fit_is_seed_deterministic() {
        let t = table();
        let a = RuleList::fit(&t, &config(), 3).unwrap();
        let b = RuleList::fit(&t, &config(), 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_is_rejected() {
        let mut t = table();
        t.labels.iter_mut().for_each(|l| *l = 0);
        assert!(RuleList::fit(&t, &config(), 0).is_err());
    }

    #[test]
    fn describe_ends_with_default() {
        let t = table();
        let model = RuleList::fit(&t, &config(), 1).unwrap();
        let lines = model.describe(&t.features);
        assert_eq!(lines.len(), model.rules.len() + 1);
        assert!(lines[0].starts_with("IF") || model.rules.is_empty());
        assert!(lines.last().unwrap().contains("P(stroke)"));
        let summary = model.summary(&t.features);
        assert_eq!(summary.rules.last().unwrap().condition, "default");
    }
}
