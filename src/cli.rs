use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::config::PipelineConfig;
use crate::error::Result;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct PipelineArgs {
    #[clap(short, long, parse(from_os_str), help = "Input CSV path")]
    pub input: Option<PathBuf>,
    #[clap(short, long, parse(from_os_str), help = "Output directory")]
    pub output: Option<PathBuf>,
    #[clap(short, long, parse(from_os_str), help = "JSON configuration file")]
    pub config: Option<PathBuf>,
    #[clap(short, long, help = "Seed for every random step")]
    pub seed: Option<u64>,
    #[clap(long, help = "Skip causal discovery")]
    pub skip_causal: bool,
    #[clap(short, long, parse(from_occurrences), help = "Verbose level")]
    pub verbose: usize,
}

impl PipelineArgs {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Configuration file (or defaults) with command-line overrides on top.
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(input) = &self.input {
            config.input = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence() {
        let args = PipelineArgs::try_parse_from([
            "stroke-pipeline",
            "-i",
            "stroke.csv",
            "--output",
            "out",
            "--seed",
            "7",
            "-vv",
            "--skip-causal",
        ])
        .unwrap();
        assert_eq!(args.log_level(), LevelFilter::Trace);
        assert!(args.skip_causal);
        let config = args.resolve().unwrap();
        assert_eq!(config.input, PathBuf::from("stroke.csv"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn defaults_without_flags() {
        let args = PipelineArgs::try_parse_from(["stroke-pipeline"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::Info);
        let config = args.resolve().unwrap();
        assert_eq!(config.seed, PipelineConfig::default().seed);
    }
}
