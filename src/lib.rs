//! Stroke dataset analysis: cleaning, discretization, a Bayesian rule list
//! classifier and FCI causal discovery, run as raw → silver → gold stages.

pub mod causal;
pub mod cli;
pub mod config;
pub mod discretize;
pub mod error;
pub mod evaluate;
pub mod impute;
pub mod io;
pub mod missingness;
pub mod mixture;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod rules;
pub mod sbrl;
pub mod smote;
pub mod special;
pub mod table;
pub mod transactions;
