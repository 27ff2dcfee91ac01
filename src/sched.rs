//! Scheduling core: hands out seeds and takes back classified outputs.
//!
//! Every operation is a blocking sequence of store calls on the caller's
//! thread; all concurrency is external. Sessions on other devices race
//! against the same remote namespace and coordinate only through atomic
//! moves and the per-test lock.

use crate::claim::{fetch_seed_from_tier, CorpusItem};
use crate::classify;
use crate::config::{Algorithm, Config};
use crate::lock;
use crate::stats::Stats;
use crate::store::ObjectStore;
use crate::tier::{basename, PathScheme, Tier};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Per-invocation inputs from the host test harness.
#[derive(Debug, Clone)]
pub struct Session {
    pub test_name: String,
    /// Local temp directory exclusively owned by this session.
    pub local_dir: PathBuf,
    pub device_serial: String,
}

/// Result of a fetch. `Locked` and `Empty` are steady-state outcomes, not
/// errors: the caller skips this round or reports no-work.
#[derive(Debug)]
pub enum Fetched {
    /// One claimed seed, downloaded into the session's local dir.
    Seed(CorpusItem),
    /// The whole seed tier, bulk-downloaded; rotation lock is now held.
    Dir(PathBuf),
    /// Another session is rotating this test.
    Locked,
    Empty,
}

pub struct Scheduler<S> {
    store: S,
    config: Config,
    paths: PathScheme,
    stats: Stats,
}

impl<S: ObjectStore> Scheduler<S> {
    pub fn new(store: S, config: Config) -> anyhow::Result<Self> {
        config.check().context("config error")?;
        let paths = PathScheme::new(&config.root, &config.branch, &config.model);
        Ok(Self {
            store,
            config,
            paths,
            stats: Stats::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Fetches work for one fuzzing round, per the configured policy.
    pub fn fetch_seed(&self, sess: &Session) -> anyhow::Result<Fetched> {
        match self.config.algorithm {
            Algorithm::SingleTier => self.fetch_from_tiers(sess, &[Tier::Seed]),
            Algorithm::PriorityTier => {
                self.fetch_from_tiers(sess, &[Tier::SeedHigh, Tier::Seed, Tier::SeedLow])
            }
            Algorithm::WholeDir => self.fetch_whole_dir(sess),
        }
    }

    fn fetch_from_tiers(&self, sess: &Session, tiers: &[Tier]) -> anyhow::Result<Fetched> {
        for &tier in tiers {
            let claimed = fetch_seed_from_tier(
                &self.store,
                &self.paths,
                &sess.test_name,
                &sess.local_dir,
                tier,
                &self.stats,
            )?;
            if let Some(item) = claimed {
                log::debug!("claimed {} from {}", item.remote_path, tier);
                return Ok(Fetched::Seed(item));
            }
        }
        Ok(Fetched::Empty)
    }

    fn fetch_whole_dir(&self, sess: &Session) -> anyhow::Result<Fetched> {
        let test = &sess.test_name;
        let locked = lock::try_lock(
            &self.store,
            &self.paths,
            test,
            &sess.device_serial,
            &sess.local_dir,
        )?;
        if !locked {
            self.stats.inc_lock_misses();
            return Ok(Fetched::Locked);
        }

        match self.download_seed_tier(sess) {
            Ok(n) => {
                log::debug!("downloaded {} seeds for {}", n, test);
                Ok(Fetched::Dir(sess.local_dir.clone()))
            }
            Err(e) => {
                // do not hold the lock without the corpus
                if let Err(e2) = lock::unlock(&self.store, &self.paths, test) {
                    log::warn!("failed to unlock {}: {}", test, e2);
                }
                Err(e)
            }
        }
    }

    fn download_seed_tier(&self, sess: &Session) -> anyhow::Result<usize> {
        let seed_dir = self.paths.tier_dir(Tier::Seed, &sess.test_name);
        self.store
            .prepare_download_destination(&sess.local_dir)
            .with_context(|| format!("failed to prepare {}", sess.local_dir.display()))?;
        let entries = self
            .store
            .list_with_prefix(&seed_dir, true)
            .with_context(|| format!("failed to list {}", seed_dir))?;
        for item in &entries {
            let local = sess.local_dir.join(basename(item));
            self.store
                .download_file(item, &local)
                .with_context(|| format!("failed to download {}", item))?;
        }
        Ok(entries.len())
    }

    /// Classifies the finished run's out dir: staging upload, duplicate
    /// discard, tier promotion, round rotation and crash export. Returns the
    /// number of uniquely promoted items.
    pub fn upload_corpus_out_dir(&self, sess: &Session, out_dir: &Path) -> anyhow::Result<u64> {
        classify::upload_corpus_out_dir(
            &self.store,
            &self.config,
            &self.paths,
            &self.stats,
            sess,
            out_dir,
        )
    }

    /// Retires a claimed seed out of `inuse` once the run is over: into
    /// `complete` on success, into `error` when the run failed on it.
    /// Returns `false` when the item was no longer where the claim left it.
    pub fn finish_seed(&self, item: &CorpusItem, ok: bool) -> anyhow::Result<bool> {
        let target = if ok { Tier::Complete } else { Tier::Error };
        let dst = self
            .paths
            .tier_file(target, &item.test_name, basename(&item.remote_path));
        let moved = self
            .store
            .move_file(&item.remote_path, &dst, true)
            .with_context(|| format!("failed to retire {}", item.remote_path))?;
        if !moved {
            log::warn!("claimed seed vanished before retire: {}", item.remote_path);
        }
        Ok(moved)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn paths(&self) -> &PathScheme {
        &self.paths
    }
}
