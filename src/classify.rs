//! Classification and promotion of freshly produced corpus outputs.
//!
//! One invocation stages the run's out dir under a private incoming path,
//! drops duplicates, then promotes what is left according to the active
//! policy. A failure on one item never stops the rest of the batch, and the
//! whole-directory policy always gives its lock back.

use crate::config::{Algorithm, Config};
use crate::crash;
use crate::lock;
use crate::sched::Session;
use crate::stats::Stats;
use crate::store::ObjectStore;
use crate::tier::{basename, PathScheme, Tier};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn upload_corpus_out_dir<S: ObjectStore>(
    store: &S,
    config: &Config,
    paths: &PathScheme,
    stats: &Stats,
    sess: &Session,
    out_dir: &Path,
) -> anyhow::Result<u64> {
    let result = classify(store, config, paths, stats, sess, out_dir);
    if config.algorithm == Algorithm::WholeDir {
        // one bad item must not leave the test permanently locked
        if let Err(e) = lock::unlock(store, paths, &sess.test_name) {
            log::warn!("failed to unlock {}: {}", sess.test_name, e);
        }
    }
    result
}

fn classify<S: ObjectStore>(
    store: &S,
    config: &Config,
    paths: &PathScheme,
    stats: &Stats,
    sess: &Session,
    out_dir: &Path,
) -> anyhow::Result<u64> {
    let test = &sess.test_name;
    let staging = staging_name(out_dir)?;
    let incoming = paths.incoming_dir(test, &staging);
    store
        .upload_dir(out_dir, &incoming)
        .with_context(|| format!("failed to upload {} to {}", out_dir.display(), incoming))?;

    let uploaded = store
        .list_with_prefix(&incoming, true)
        .with_context(|| format!("failed to list {}", incoming))?;
    log::debug!("{} items staged under {}", uploaded.len(), incoming);

    let mut fresh = Vec::new();
    for item in &uploaded {
        match is_duplicate(store, paths, test, basename(item)) {
            Ok(true) => {
                stats.inc_duplicates();
                if let Err(e) = store.delete_file(item) {
                    log::warn!("failed to drop duplicate {}: {}", item, e);
                }
            }
            Ok(false) => fresh.push(item.clone()),
            Err(e) => log::warn!("dedup probe for {} failed, skipping: {}", item, e),
        }
    }

    let promoted = match config.algorithm {
        Algorithm::SingleTier => promote_all(store, paths, test, &fresh, Tier::Seed),
        Algorithm::PriorityTier => {
            let target = if crash::crash_report_path(&sess.local_dir).is_file() {
                Tier::SeedHigh
            } else {
                Tier::Seed
            };
            promote_all(store, paths, test, &fresh, target)
        }
        Algorithm::WholeDir => rotate_rounds(store, config, paths, test, &fresh)?,
    };
    stats.add_promoted(promoted);
    log::info!(
        "classified {}: {} staged, {} promoted",
        test,
        uploaded.len(),
        promoted
    );

    if config.measure_corpus {
        if let Err(e) = upload_measurement(store, paths, sess, promoted) {
            log::warn!("failed to upload corpus measurement: {}", e);
        }
    }
    if let Err(e) = crash::export_crash_artifact(store, paths, test, &sess.local_dir, stats) {
        log::warn!("failed to export crash artifact: {}", e);
    }
    Ok(promoted)
}

fn staging_name(out_dir: &Path) -> anyhow::Result<String> {
    out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("bad out dir: {}", out_dir.display()))
}

/// Probes every state tier for an item with the same basename.
fn is_duplicate<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    name: &str,
) -> anyhow::Result<bool> {
    for tier in Tier::STATE_TIERS.iter() {
        let probe = paths.tier_file(*tier, test, name);
        if store
            .file_exists(&probe)
            .with_context(|| format!("failed to probe {}", probe))?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

fn promote_all<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    items: &[String],
    target: Tier,
) -> u64 {
    let mut n = 0;
    for item in items {
        let dst = paths.tier_file(target, test, basename(item));
        match store.move_file(item, &dst, false) {
            Ok(true) => n += 1,
            Ok(false) => {
                // a concurrent session promoted the same basename first
                log::warn!("{} already present, dropping staged copy", dst);
                if let Err(e) = store.delete_file(item) {
                    log::warn!("failed to drop {}: {}", item, e);
                }
            }
            Err(e) => log::warn!("failed to promote {}: {}", item, e),
        }
    }
    n
}

/// Smallest round index whose archive dir does not exist yet. Recomputed on
/// every classification so it can never drift from the directory listing.
fn current_round<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    test: &str,
    repeat_times: usize,
) -> anyhow::Result<usize> {
    for n in 1..repeat_times {
        let dir = paths.tier_dir(Tier::SeedRound(n), test);
        let occupied = store
            .count_files(&dir)
            .with_context(|| format!("failed to probe {}", dir))?;
        if occupied == 0 {
            return Ok(n);
        }
    }
    Ok(repeat_times - 1)
}

fn rotate_rounds<S: ObjectStore>(
    store: &S,
    config: &Config,
    paths: &PathScheme,
    test: &str,
    fresh: &[String],
) -> anyhow::Result<u64> {
    let round = current_round(store, paths, test, config.repeat_times)?;
    let seed_dir = paths.tier_dir(Tier::Seed, test);

    if round < config.repeat_times - 1 {
        // mid-session: archive the previous round wholesale, then refill seed
        let entries = store
            .list_with_prefix(&seed_dir, true)
            .with_context(|| format!("failed to list {}", seed_dir))?;
        for item in &entries {
            let dst = paths.tier_file(Tier::SeedRound(round), test, basename(item));
            match store.move_file(item, &dst, true) {
                Ok(true) => {}
                Ok(false) => log::warn!("{} vanished during archival", item),
                Err(e) => log::warn!("failed to archive {}: {}", item, e),
            }
        }
        log::info!("{}: archived round {} ({} entries)", test, round, entries.len());
        Ok(promote_all(store, paths, test, fresh, Tier::Seed))
    } else {
        // terminal round: sweep the seed prefix into complete, numbered
        // archives included (non-strict listing)
        let entries = store
            .list_with_prefix(&seed_dir, false)
            .with_context(|| format!("failed to list {}", seed_dir))?;
        for item in &entries {
            let dst = paths.tier_file(Tier::Complete, test, basename(item));
            match store.move_file(item, &dst, true) {
                Ok(true) => {}
                Ok(false) => log::warn!("{} vanished during archival", item),
                Err(e) => log::warn!("failed to complete {}: {}", item, e),
            }
        }
        log::info!("{}: session complete after round {}", test, round);
        Ok(promote_all(store, paths, test, fresh, Tier::Complete))
    }
}

/// Plain-text corpus-size measurement, named by upload time. Observational
/// only; callers never read it back.
fn upload_measurement<S: ObjectStore>(
    store: &S,
    paths: &PathScheme,
    sess: &Session,
    promoted: u64,
) -> anyhow::Result<()> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let name = format!("corpus_count_{}.txt", now);
    fs::create_dir_all(&sess.local_dir)
        .with_context(|| format!("failed to create {}", sess.local_dir.display()))?;
    let local = sess.local_dir.join(&name);
    fs::write(&local, format!("{}\n", promoted))
        .with_context(|| format!("failed to write {}", local.display()))?;
    store
        .upload_file(&local, &paths.tier_file(Tier::Measure, &sess.test_name, &name))
        .context("failed to upload measurement")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::crash_report_path;
    use crate::mem::MemStore;
    use crate::sched::Scheduler;
    use crate::testutil::{scratch_dir, FlakyStore};
    use std::fs;
    use std::path::PathBuf;

    fn scheduler(algorithm: Algorithm) -> Scheduler<MemStore> {
        let config = Config {
            algorithm,
            repeat_times: 3,
            ..Config::default()
        };
        Scheduler::new(MemStore::new(), config).unwrap()
    }

    fn session(tag: &str) -> Session {
        Session {
            test_name: "t".to_string(),
            local_dir: scratch_dir(tag),
            device_serial: "SER1".to_string(),
        }
    }

    fn out_dir(names: &[&str]) -> PathBuf {
        let dir = scratch_dir("cls-out");
        for name in names {
            fs::write(dir.join(name), name.as_bytes()).unwrap();
        }
        dir
    }

    fn tier_names(sched: &Scheduler<MemStore>, tier: Tier) -> Vec<String> {
        let mut names: Vec<String> = sched
            .store()
            .list_with_prefix(&sched.paths().tier_dir(tier, "t"), true)
            .unwrap()
            .iter()
            .map(|p| basename(p).to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn single_tier_promotes_into_seed() {
        let sched = scheduler(Algorithm::SingleTier);
        let sess = session("cls-single");

        let promoted = sched
            .upload_corpus_out_dir(&sess, &out_dir(&["a", "b"]))
            .unwrap();
        assert_eq!(promoted, 2);
        assert_eq!(tier_names(&sched, Tier::Seed), vec!["a", "b"]);
        // staging left empty
        let incoming = sched
            .store()
            .list_with_prefix("corpus/main/generic/t/incoming", true)
            .unwrap();
        assert!(incoming.is_empty());
    }

    #[test]
    fn duplicate_is_deleted_not_promoted() {
        let sched = scheduler(Algorithm::SingleTier);
        sched
            .store()
            .put(&sched.paths().tier_file(Tier::Complete, "t", "x"), b"old");
        let sess = session("cls-dup");

        let promoted = sched.upload_corpus_out_dir(&sess, &out_dir(&["x"])).unwrap();
        assert_eq!(promoted, 0);
        assert!(tier_names(&sched, Tier::Seed).is_empty());
        // incoming copy dropped, original capture untouched
        let incoming = sched
            .store()
            .list_with_prefix("corpus/main/generic/t/incoming", true)
            .unwrap();
        assert!(incoming.is_empty());
        assert_eq!(
            sched
                .store()
                .get(&sched.paths().tier_file(Tier::Complete, "t", "x"))
                .unwrap(),
            b"old"
        );
        assert_eq!(sched.stats().duplicates(), 1);
    }

    #[test]
    fn dedup_probes_every_state_tier() {
        let sched = scheduler(Algorithm::SingleTier);
        sched
            .store()
            .put(&sched.paths().tier_file(Tier::Trigger, "t", "y"), b"old");
        let sess = session("cls-dup-trigger");

        let promoted = sched.upload_corpus_out_dir(&sess, &out_dir(&["y"])).unwrap();
        assert_eq!(promoted, 0);
    }

    #[test]
    fn priority_without_crash_goes_to_seed() {
        let sched = scheduler(Algorithm::PriorityTier);
        let sess = session("cls-prio-plain");

        sched.upload_corpus_out_dir(&sess, &out_dir(&["a"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::Seed), vec!["a"]);
        assert!(tier_names(&sched, Tier::SeedHigh).is_empty());
    }

    #[test]
    fn priority_with_crash_goes_to_seed_high_and_exports() {
        let sched = scheduler(Algorithm::PriorityTier);
        let sess = session("cls-prio-crash");
        let report = crash_report_path(&sess.local_dir);
        fs::create_dir_all(report.parent().unwrap()).unwrap();
        fs::write(&report, b"stack").unwrap();

        sched.upload_corpus_out_dir(&sess, &out_dir(&["a"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::SeedHigh), vec!["a"]);
        assert!(tier_names(&sched, Tier::Seed).is_empty());
        assert_eq!(tier_names(&sched, Tier::Trigger).len(), 1);
        assert_eq!(sched.stats().crashes(), 1);
    }

    #[test]
    fn whole_dir_rotates_then_completes() {
        let sched = scheduler(Algorithm::WholeDir);
        let sess = session("cls-rotate");
        sched
            .store()
            .put(&sched.paths().tier_file(Tier::Seed, "t", "a"), b"a");

        // round 1: previous corpus archived, new items become next input
        sched.upload_corpus_out_dir(&sess, &out_dir(&["b"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::SeedRound(1)), vec!["a"]);
        assert_eq!(tier_names(&sched, Tier::Seed), vec!["b"]);

        // terminal round: everything archives into complete
        sched.upload_corpus_out_dir(&sess, &out_dir(&["c"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::Complete), vec!["a", "b", "c"]);
        assert!(tier_names(&sched, Tier::Seed).is_empty());
        assert!(tier_names(&sched, Tier::SeedRound(1)).is_empty());

        // numbering restarts: the next session rotates from round 1 again
        sched.upload_corpus_out_dir(&sess, &out_dir(&["d"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::Seed), vec!["d"]);
        assert!(tier_names(&sched, Tier::SeedRound(1)).is_empty());
        sched.upload_corpus_out_dir(&sess, &out_dir(&["e"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::SeedRound(1)), vec!["d"]);
        assert_eq!(tier_names(&sched, Tier::Seed), vec!["e"]);
    }

    #[test]
    fn terminal_round_when_all_archives_present() {
        // seed_1 exists, repeat_times = 3, so round 2 is terminal
        let sched = scheduler(Algorithm::WholeDir);
        let sess = session("cls-terminal");
        sched
            .store()
            .put(&sched.paths().tier_file(Tier::SeedRound(1), "t", "a"), b"a");
        sched
            .store()
            .put(&sched.paths().tier_file(Tier::Seed, "t", "b"), b"b");

        sched.upload_corpus_out_dir(&sess, &out_dir(&["c"])).unwrap();
        assert_eq!(tier_names(&sched, Tier::Complete), vec!["a", "b", "c"]);
        assert!(tier_names(&sched, Tier::SeedRound(1)).is_empty());
    }

    #[test]
    fn whole_dir_unlocks_after_classification() {
        let sched = scheduler(Algorithm::WholeDir);
        let sess = session("cls-unlock");
        match sched.fetch_seed(&sess).unwrap() {
            crate::sched::Fetched::Dir(_) => {}
            other => panic!("expected a dir, got {:?}", other),
        }
        assert!(sched
            .store()
            .contains(&sched.paths().lock_file("t", "SER1")));

        sched.upload_corpus_out_dir(&sess, &out_dir(&["a"])).unwrap();
        assert_eq!(
            sched
                .store()
                .count_files(&sched.paths().lock_dir("t"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn whole_dir_unlocks_even_when_upload_fails() {
        let sched = scheduler(Algorithm::WholeDir);
        let sess = session("cls-unlock-fail");
        match sched.fetch_seed(&sess).unwrap() {
            crate::sched::Fetched::Dir(_) => {}
            other => panic!("expected a dir, got {:?}", other),
        }

        let missing = sess.local_dir.join("no-such-out-dir");
        assert!(sched.upload_corpus_out_dir(&sess, &missing).is_err());
        assert_eq!(
            sched
                .store()
                .count_files(&sched.paths().lock_dir("t"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn whole_dir_unlocks_despite_promotion_faults() {
        let config = Config {
            algorithm: Algorithm::WholeDir,
            repeat_times: 3,
            ..Config::default()
        };
        let store = FlakyStore {
            fail_moves: true,
            ..FlakyStore::new(MemStore::new())
        };
        let sched = Scheduler::new(store, config).unwrap();
        let sess = session("cls-promote-fault");
        sched
            .store()
            .inner
            .put(&sched.paths().lock_file("t", "SER1"), b"");

        // every move faults, but the call still succeeds with zero
        // promotions and gives the lock back
        let promoted = sched.upload_corpus_out_dir(&sess, &out_dir(&["a"])).unwrap();
        assert_eq!(promoted, 0);
        assert_eq!(
            sched
                .store()
                .inner
                .count_files(&sched.paths().lock_dir("t"))
                .unwrap(),
            0
        );
    }

    #[test]
    fn measurement_uploaded_when_enabled() {
        let config = Config {
            algorithm: Algorithm::SingleTier,
            measure_corpus: true,
            ..Config::default()
        };
        let sched = Scheduler::new(MemStore::new(), config).unwrap();
        let sess = session("cls-measure");

        sched.upload_corpus_out_dir(&sess, &out_dir(&["a", "b"])).unwrap();
        let measures = sched
            .store()
            .list_with_prefix(&sched.paths().tier_dir(Tier::Measure, "t"), true)
            .unwrap();
        assert_eq!(measures.len(), 1);
        assert_eq!(sched.store().get(&measures[0]).unwrap(), b"2\n");
    }

    #[test]
    fn empty_out_dir_promotes_nothing() {
        let sched = scheduler(Algorithm::SingleTier);
        let sess = session("cls-empty-out");
        let promoted = sched.upload_corpus_out_dir(&sess, &out_dir(&[])).unwrap();
        assert_eq!(promoted, 0);
    }
}
