//! Run configuration.
//!
//! Every field has a default so a JSON file only needs the keys it changes.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::records::{AGE_GROUP, GENDER, STROKE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub test_fraction: f32,
    pub mixture: MixtureConfig,
    pub smote: SmoteConfig,
    pub sbrl: SbrlConfig,
    pub tree: TreeConfig,
    pub fci: FciConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/healthcare-dataset-stroke-data.csv"),
            output_dir: PathBuf::from("data/output"),
            seed: 42,
            test_fraction: 0.3,
            mixture: MixtureConfig::default(),
            smote: SmoteConfig::default(),
            sbrl: SbrlConfig::default(),
            tree: TreeConfig::default(),
            fci: FciConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixtureConfig {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoteConfig {
    pub k_neighbors: usize,
    /// Target minority/majority ratio after resampling.
    pub ratio: f64,
}

impl Default for SmoteConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SbrlConfig {
    pub min_support: f64,
    pub max_cardinality: usize,
    /// Expected rule-list length.
    pub lambda: f64,
    /// Expected antecedent cardinality.
    pub eta: f64,
    /// Beta prior pseudo-counts for the negative and positive class.
    pub alpha: [f64; 2],
    pub chains: usize,
    pub iterations: usize,
}

impl Default for SbrlConfig {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            max_cardinality: 2,
            lambda: 5.0,
            eta: 1.0,
            alpha: [1.0, 1.0],
            chains: 3,
            iterations: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: u16,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FciConfig {
    /// Significance level of the independence tests.
    pub alpha: f64,
    /// Largest conditioning set tried during the skeleton search.
    pub max_depth: Option<usize>,
    /// Largest conditioning set drawn from Possible-D-SEP.
    pub max_pds_depth: Option<usize>,
    pub knowledge: KnowledgeConfig,
}

impl Default for FciConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            max_depth: Some(3),
            max_pds_depth: Some(2),
            knowledge: KnowledgeConfig::default(),
        }
    }
}

/// Edge constraints handed to the causal learner, by column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub forbidden: Vec<(String, String)>,
    pub required: Vec<(String, String)>,
    pub tiers: Vec<Vec<String>>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            forbidden: Vec::new(),
            required: Vec::new(),
            tiers: vec![
                vec![GENDER.to_string(), AGE_GROUP.to_string()],
                vec![STROKE.to_string()],
            ],
        }
    }
}

impl PipelineConfig {
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) || self.test_fraction == 0.0 {
            return Err(PipelineError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.smote.k_neighbors == 0 {
            return Err(PipelineError::Config("smote.k_neighbors must be positive".into()));
        }
        if self.smote.ratio <= 0.0 || self.smote.ratio > 1.0 {
            return Err(PipelineError::Config(format!(
                "smote.ratio must be in (0, 1], got {}",
                self.smote.ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.sbrl.min_support) {
            return Err(PipelineError::Config(format!(
                "sbrl.min_support must be in [0, 1], got {}",
                self.sbrl.min_support
            )));
        }
        if self.sbrl.max_cardinality == 0 || self.sbrl.chains == 0 {
            return Err(PipelineError::Config(
                "sbrl.max_cardinality and sbrl.chains must be positive".into(),
            ));
        }
        if self.sbrl.lambda <= 0.0 || self.sbrl.eta <= 0.0 {
            return Err(PipelineError::Config("sbrl.lambda and sbrl.eta must be positive".into()));
        }
        if self.sbrl.alpha.iter().any(|a| *a <= 0.0) {
            return Err(PipelineError::Config("sbrl.alpha must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.fci.alpha) || self.fci.alpha == 0.0 {
            return Err(PipelineError::Config(format!(
                "fci.alpha must be in (0, 1), got {}",
                self.fci.alpha
            )));
        }
        Ok(())
    }
}
