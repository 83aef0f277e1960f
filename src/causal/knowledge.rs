use std::collections::BTreeSet;

use super::pag::{Mark, Pag};
use crate::config::KnowledgeConfig;
use crate::error::{PipelineError, Result};

/// Background knowledge resolved against variable indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Knowledge {
    /// Unordered pairs stored as `(min, max)`.
    forbidden: BTreeSet<(usize, usize)>,
    /// Directed `cause → effect` pairs.
    required: BTreeSet<(usize, usize)>,
    tiers: Vec<Option<usize>>,
}

fn unordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl Knowledge {
    pub fn resolve(config: &KnowledgeConfig, names: &[String]) -> Result<Self> {
        let index = |name: &str| -> Result<usize> {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| PipelineError::UnknownVariable(name.to_string()))
        };

        let mut knowledge = Knowledge {
            tiers: vec![None; names.len()],
            ..Knowledge::default()
        };
        for (a, b) in &config.forbidden {
            knowledge.forbidden.insert(unordered(index(a)?, index(b)?));
        }
        for (a, b) in &config.required {
            let pair = (index(a)?, index(b)?);
            if knowledge.forbidden.contains(&unordered(pair.0, pair.1)) {
                return Err(PipelineError::Config(format!(
                    "edge {} - {} is both required and forbidden",
                    a, b
                )));
            }
            knowledge.required.insert(pair);
        }
        for (tier, members) in config.tiers.iter().enumerate() {
            for name in members {
                let i = index(name)?;
                if knowledge.tiers[i].is_some() {
                    return Err(PipelineError::Config(format!(
                        "{} is listed in more than one tier",
                        name
                    )));
                }
                knowledge.tiers[i] = Some(tier);
            }
        }
        for &(a, b) in &knowledge.required {
            if let (Some(ta), Some(tb)) = (knowledge.tiers[a], knowledge.tiers[b]) {
                if ta > tb {
                    return Err(PipelineError::Config(format!(
                        "required edge {} -> {} points into an earlier tier",
                        names[a], names[b]
                    )));
                }
            }
        }
        Ok(knowledge)
    }

    pub fn is_forbidden(&self, a: usize, b: usize) -> bool {
        self.forbidden.contains(&unordered(a, b))
    }

    /// Required in either direction.
    pub fn is_required(&self, a: usize, b: usize) -> bool {
        self.required.contains(&(a, b)) || self.required.contains(&(b, a))
    }

    pub fn tier(&self, v: usize) -> Option<usize> {
        self.tiers.get(v).copied().flatten()
    }

    /// Arrowheads into later tiers, then required edges as `a → b`.
    pub fn orient(&self, pag: &mut Pag) {
        for a in 0..pag.len() {
            for b in pag.adjacent(a) {
                if let (Some(ta), Some(tb)) = (self.tier(a), self.tier(b)) {
                    if ta < tb {
                        pag.set_mark(a, b, Mark::Arrow);
                    }
                }
            }
        }
        for &(a, b) in &self.required {
            pag.set_mark(a, b, Mark::Arrow);
            pag.set_mark(b, a, Mark::Tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["age".into(), "bmi".into(), "stroke".into()]
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn resolves_names() {
        let config = KnowledgeConfig {
            forbidden: vec![pair("stroke", "age")],
            required: vec![pair("age", "bmi")],
            tiers: vec![vec!["age".into()], vec!["stroke".into()]],
        };
        let knowledge = Knowledge::resolve(&config, &names()).unwrap();
        assert!(knowledge.is_forbidden(0, 2));
        assert!(knowledge.is_forbidden(2, 0));
        assert!(knowledge.is_required(1, 0));
        assert_eq!(knowledge.tier(2), Some(1));
        assert_eq!(knowledge.tier(1), None);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let config = KnowledgeConfig {
            forbidden: vec![pair("age", "glucose")],
            required: Vec::new(),
            tiers: Vec::new(),
        };
        let err = Knowledge::resolve(&config, &names()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownVariable(ref v) if v == "glucose"));
    }

    #[test]
    fn contradictions_are_errors() {
        let both = KnowledgeConfig {
            forbidden: vec![pair("age", "bmi")],
            required: vec![pair("bmi", "age")],
            tiers: Vec::new(),
        };
        assert!(Knowledge::resolve(&both, &names()).is_err());

        let backwards = KnowledgeConfig {
            forbidden: Vec::new(),
            required: vec![pair("stroke", "age")],
            tiers: vec![vec!["age".into()], vec!["stroke".into()]],
        };
        assert!(Knowledge::resolve(&backwards, &names()).is_err());
    }

    #[test]
    fn orients_tiers_and_required_edges() {
        let config = KnowledgeConfig {
            forbidden: Vec::new(),
            required: vec![pair("bmi", "stroke")],
            tiers: vec![vec!["age".into()], vec!["stroke".into()]],
        };
        let knowledge = Knowledge::resolve(&config, &names()).unwrap();
        let mut pag = Pag::empty(names());
        pag.add_edge(0, 2);
        pag.add_edge(1, 2);
        knowledge.orient(&mut pag);
        assert_eq!(pag.edge("age", "stroke").unwrap().to_string(), "age o-> stroke");
        assert_eq!(pag.edge("bmi", "stroke").unwrap().to_string(), "bmi --> stroke");
    }
}
