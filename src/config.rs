//! Engine configuration. The scheduling algorithm is fixed for the whole
//! process at construction time, never chosen per call.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Claim once from the plain `seed` tier.
    SingleTier,
    /// Try `seed_high`, `seed`, `seed_low` in that order.
    PriorityTier,
    /// Lock the test, bulk-download the whole `seed` tier, rotate rounds.
    WholeDir,
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-tier" => Ok(Algorithm::SingleTier),
            "priority-tier" => Ok(Algorithm::PriorityTier),
            "whole-directory" => Ok(Algorithm::WholeDir),
            _ => Err(anyhow::anyhow!("unsupported scheduling algorithm: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub algorithm: Algorithm,
    /// Upload a plain-text corpus-size measurement after classification.
    pub measure_corpus: bool,
    /// Rounds per whole-directory session, >= 2.
    pub repeat_times: usize,
    /// Remote path root the corpus namespace lives under.
    pub root: String,
    pub branch: String,
    pub model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SingleTier,
            measure_corpus: false,
            repeat_times: 4,
            root: "corpus".to_string(),
            branch: "main".to_string(),
            model: "generic".to_string(),
        }
    }
}

impl Config {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.repeat_times < 2 {
            anyhow::bail!("repeat_times must be >= 2, got {}", self.repeat_times);
        }
        if self.root.is_empty() {
            anyhow::bail!("empty corpus root");
        }
        if self.branch.is_empty() || self.branch.contains('/') {
            anyhow::bail!("bad branch: {:?}", self.branch);
        }
        if self.model.is_empty() || self.model.contains('/') {
            anyhow::bail!("bad model: {:?}", self.model);
        }
        Ok(())
    }
}
