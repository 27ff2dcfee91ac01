//! Move-as-claim: a seed is owned by whoever wins the atomic move of its
//! object into the `inuse` tier. Races with other claimants are expected;
//! losers re-list and pick again.

use crate::retry::{with_retry, Attempt};
use crate::stats::Stats;
use crate::store::ObjectStore;
use crate::tier::{basename, PathScheme, Tier};
use anyhow::Context;
use rand::prelude::{SliceRandom, SmallRng};
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Attempt budget for one tier before reporting no-work.
pub const CLAIM_ATTEMPTS: usize = 10;

/// A content-bearing corpus entry, identified by its remote path.
#[derive(Debug, Clone)]
pub struct CorpusItem {
    pub remote_path: String,
    pub test_name: String,
    pub tier: Tier,
    /// Disposable local cache, set once downloaded.
    pub local_mirror: Option<PathBuf>,
}

/// Claims one item from `tier` and downloads it into `local_dir`.
///
/// The listing is an eventually-consistent snapshot; the candidate is picked
/// uniformly at random so lexicographically-first names do not become
/// hotspots under contention. An empty listing is terminal. A download
/// failure after a won move leaves the item in `inuse` and burns an attempt;
/// there is no automatic reclaim of such items.
pub fn fetch_seed_from_tier<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    local_dir: &Path,
    tier: Tier,
    stats: &Stats,
) -> anyhow::Result<Option<CorpusItem>> {
    let tier_dir = paths.tier_dir(tier, test);
    store
        .prepare_download_destination(local_dir)
        .with_context(|| format!("failed to prepare {}", local_dir.display()))?;

    let mut rng = SmallRng::from_entropy();
    with_retry(CLAIM_ATTEMPTS, |attempt| {
        let entries = match store.list_with_prefix(&tier_dir, true) {
            Ok(entries) => entries,
            Err(e) => {
                return Attempt::Failed(
                    anyhow::Error::new(e).context(format!("failed to list {}", tier_dir)),
                )
            }
        };
        if entries.is_empty() {
            return Attempt::Empty;
        }
        let candidate = entries.choose(&mut rng).unwrap();
        let name = basename(candidate);
        let claimed_path = paths.tier_file(Tier::InUse, test, name);

        match store.move_file(candidate, &claimed_path, false) {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("lost claim race on {} (attempt {})", candidate, attempt);
                stats.inc_claim_races();
                return Attempt::Contended;
            }
            Err(e) => {
                log::warn!("claim move of {} failed: {}", candidate, e);
                return Attempt::Contended;
            }
        }

        let local = local_dir.join(name);
        match store.download_file(&claimed_path, &local) {
            Ok(()) => {
                stats.inc_claimed();
                Attempt::Done(CorpusItem {
                    remote_path: claimed_path,
                    test_name: test.to_string(),
                    tier: Tier::InUse,
                    local_mirror: Some(local),
                })
            }
            Err(e) => {
                // the item stays claimed in inuse
                log::warn!("download of claimed {} failed: {}", claimed_path, e);
                Attempt::Contended
            }
        }
    })
}
