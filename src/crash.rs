//! Crash-artifact export.

use crate::stats::Stats;
use crate::store::ObjectStore;
use crate::tier::{PathScheme, Tier};
use anyhow::Context;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

/// Subdirectory of the session's local dir the fuzzer drops crash evidence in.
pub const CRASH_DIR_NAME: &str = "crashes";
/// Well-known crash report filename produced by the local fuzz run.
pub const CRASH_REPORT_NAME: &str = "crash_report.txt";

pub fn crash_report_path(local_dir: &Path) -> PathBuf {
    local_dir.join(CRASH_DIR_NAME).join(CRASH_REPORT_NAME)
}

/// Uploads the run's crash report, if one exists, into the trigger tier
/// under a freshly generated random suffix. Earlier captures are never
/// overwritten.
pub fn export_crash_artifact<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    local_dir: &Path,
    stats: &Stats,
) -> anyhow::Result<bool> {
    let report = crash_report_path(local_dir);
    if !report.is_file() {
        return Ok(false);
    }
    let name = format!("{}_{}", CRASH_REPORT_NAME, unique_suffix());
    let remote = paths.tier_file(Tier::Trigger, test, &name);
    store
        .upload_file(&report, &remote)
        .with_context(|| format!("failed to upload crash report {}", report.display()))?;
    stats.inc_crashes();
    log::info!("crash report exported to {}", remote);
    Ok(true)
}

fn unique_suffix() -> String {
    let mut bytes = [0u8; 8];
    SmallRng::from_entropy().fill(&mut bytes);
    hex::encode(bytes)
}
