//! Corpus tiers and the remote path scheme.
//!
//! Every remote path encodes exactly one tier. Layout:
//! `<root>/<branch>/<model>/<test>/<test>_<tier>/<name>` for state tiers,
//! `<root>/<branch>/<model>/<test>/incoming/<staging>/<name>` for in-flight
//! uploads and `<test>/<test>_lock/<serial>` for lock markers.

use std::fmt;

/// A named partition of the corpus namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    SeedHigh,
    Seed,
    SeedLow,
    InUse,
    Complete,
    Crash,
    Error,
    Trigger,
    /// Archived round `n` of a rotating session, `1 <= n < repeat_times`.
    SeedRound(usize),
    /// Observational corpus-size measurements, never read back.
    Measure,
}

impl Tier {
    /// The fixed state enumeration the duplicate check probes, in order.
    pub const STATE_TIERS: [Tier; 8] = [
        Tier::SeedHigh,
        Tier::Seed,
        Tier::SeedLow,
        Tier::InUse,
        Tier::Complete,
        Tier::Crash,
        Tier::Error,
        Tier::Trigger,
    ];

    pub fn suffix(&self) -> String {
        match self {
            Tier::SeedHigh => "seed_high".to_string(),
            Tier::Seed => "seed".to_string(),
            Tier::SeedLow => "seed_low".to_string(),
            Tier::InUse => "inuse".to_string(),
            Tier::Complete => "complete".to_string(),
            Tier::Crash => "crash".to_string(),
            Tier::Error => "error".to_string(),
            Tier::Trigger => "trigger".to_string(),
            Tier::SeedRound(n) => format!("seed_{}", n),
            Tier::Measure => "measure".to_string(),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Resolves (tier, test) pairs to canonical remote paths. Pure, no I/O.
#[derive(Debug, Clone)]
pub struct PathScheme {
    root: String,
    branch: String,
    model: String,
}

impl PathScheme {
    pub fn new(root: &str, branch: &str, model: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            branch: branch.to_string(),
            model: model.to_string(),
        }
    }

    fn test_dir(&self, test: &str) -> String {
        format!("{}/{}/{}/{}", self.root, self.branch, self.model, test)
    }

    pub fn tier_dir(&self, tier: Tier, test: &str) -> String {
        format!("{}/{}_{}", self.test_dir(test), test, tier.suffix())
    }

    pub fn tier_file(&self, tier: Tier, test: &str, name: &str) -> String {
        format!("{}/{}", self.tier_dir(tier, test), name)
    }

    /// Staging subtree for one in-flight upload. `staging` must be locally
    /// unique (the basename of the session's out dir); distinct names keep
    /// concurrent uploads from colliding before classification runs.
    pub fn incoming_dir(&self, test: &str, staging: &str) -> String {
        format!("{}/incoming/{}", self.test_dir(test), staging)
    }

    pub fn lock_dir(&self, test: &str) -> String {
        format!("{}/{}_lock", self.test_dir(test), test)
    }

    pub fn lock_file(&self, test: &str, serial: &str) -> String {
        format!("{}/{}", self.lock_dir(test), serial)
    }
}

/// Last path component of a remote object path.
pub(crate) fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
