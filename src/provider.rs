use std::collections::HashSet;
use std::env;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::snapshot_fetch;
use crate::state::{Delta, ProviderCommand};

fn fetch_parallelism() -> usize {
    env::var("FOE_FETCH_THREADS")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(4)
        .clamp(1, 16)
}

fn build_fetch_pool() -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(fetch_parallelism())
        .build()
        .ok()
}

/// Background worker: owns all network I/O, reports results as deltas. One
/// fetch per distinct snapshot id; a repeated request for an id already in
/// flight is dropped rather than re-issued.
pub fn spawn_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let pool = build_fetch_pool();
        let inflight_snapshots: Arc<Mutex<HashSet<u32>>> = Arc::new(Mutex::new(HashSet::new()));

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::LoadSnapshotList => match snapshot_fetch::fetch_snapshots() {
                    Ok(snapshots) => {
                        let _ = tx.send(Delta::SetSnapshots(snapshots));
                    }
                    Err(err) => {
                        let _ = tx.send(Delta::SnapshotListFailed {
                            message: err.to_string(),
                        });
                    }
                },
                ProviderCommand::LoadSnapshot { snapshot_id } => {
                    {
                        let mut inflight = inflight_snapshots
                            .lock()
                            .expect("inflight snapshot lock poisoned");
                        // Concurrency is bounded by the pool; this set only
                        // stops a second in-flight fetch for the same id.
                        if !inflight.insert(snapshot_id) {
                            continue;
                        }
                    }

                    let tx = tx.clone();
                    let inflight_snapshots = inflight_snapshots.clone();
                    let job = move || {
                        match snapshot_fetch::fetch_players_by_snapshot(snapshot_id) {
                            Ok(rows) => {
                                let _ = tx.send(Delta::SnapshotLoaded { snapshot_id, rows });
                            }
                            Err(err) => {
                                let _ = tx.send(Delta::SnapshotLoadFailed {
                                    snapshot_id,
                                    message: err.to_string(),
                                });
                            }
                        }
                        let mut inflight = inflight_snapshots
                            .lock()
                            .expect("inflight snapshot lock poisoned");
                        inflight.remove(&snapshot_id);
                    };

                    if let Some(pool) = pool.as_ref() {
                        pool.spawn(job);
                    } else {
                        thread::spawn(job);
                    }
                }
                ProviderCommand::UpdateRecruitment {
                    snapshot_id,
                    player_id,
                    update,
                } => {
                    let tx = tx.clone();
                    let job = move || {
                        // The cache patch only happens once the service has
                        // confirmed the update, via RecruitmentSaved.
                        match snapshot_fetch::update_recruitment(player_id, &update) {
                            Ok(saved) => {
                                let _ = tx.send(Delta::RecruitmentSaved {
                                    snapshot_id,
                                    player_id,
                                    update: saved,
                                });
                            }
                            Err(err) => {
                                let _ = tx.send(Delta::RecruitmentFailed {
                                    player_id,
                                    message: err.to_string(),
                                });
                            }
                        }
                    };
                    if let Some(pool) = pool.as_ref() {
                        pool.spawn(job);
                    } else {
                        thread::spawn(job);
                    }
                }
            }
        }
    });
}
