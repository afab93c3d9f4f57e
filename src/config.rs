use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{SolverError, SolverResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Dfs,
    Pns,
    Dfpn,
    Pdfpn,
    PnsPdfpn,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub algorithm: Algorithm,
    pub compute_nimber: bool,
    pub capacity: usize,
    pub input_database: Option<PathBuf>,
    pub output_database: PathBuf,
    pub stats_path: PathBuf,
    pub verbose: bool,
    pub seed: u64,
    pub workers: usize,
    pub threads: usize,
    pub iterations: usize,
    pub updates: usize,
    pub grouping: usize,
    pub no_sharing: bool,
    pub state_level: u8,
    pub epsilon: f32,
    pub branching_depth: usize,
    pub depth_estimator: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Dfpn,
            compute_nimber: false,
            capacity: 100_000,
            input_database: None,
            output_database: PathBuf::from("database.spr"),
            stats_path: PathBuf::from("stats.csv"),
            verbose: false,
            seed: 0,
            workers: 1,
            threads: 0,
            iterations: 100,
            updates: 100,
            grouping: 1,
            no_sharing: false,
            state_level: 0,
            epsilon: 1.0,
            branching_depth: 0,
            depth_estimator: false,
        }
    }
}

impl SolverConfig {
    pub fn load(path: &Path) -> SolverResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| SolverError::io(path, e))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SolverError::InvalidInput(format!("{}: {e}", path.display())))
    }

    #[must_use]
    pub fn estimator(&self) -> crate::solver::Estimator {
        if self.depth_estimator {
            crate::solver::Estimator::Depth
        } else {
            crate::solver::Estimator::Uniform
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_cli_surface() {
        let config = SolverConfig::default();
        assert_eq!(config.algorithm, Algorithm::Dfpn);
        assert_eq!(config.capacity, 100_000);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.state_level, 0);
        assert!(!config.no_sharing);
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let parsed: SolverConfig =
            serde_yaml::from_str("algorithm: pns-pdfpn\nworkers: 8\ngrouping: 2\n").unwrap();
        assert_eq!(parsed.algorithm, Algorithm::PnsPdfpn);
        assert_eq!(parsed.workers, 8);
        assert_eq!(parsed.grouping, 2);
        assert_eq!(parsed.updates, 100);
    }
}
