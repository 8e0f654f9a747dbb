use crate::config::ReloadConfig;
use crate::hosts;
use crate::metrics::{RELOADS_TOTAL, RELOAD_FAILED_TOTAL, TABLE_ENTRIES};
use crate::table::NameTable;
use arc_swap::ArcSwap;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Polls the hosts file and swaps in a freshly built table whenever its
/// contents differ from `baseline`, the digest of the bytes the current
/// table was built from. Lookups in flight keep the snapshot they loaded.
pub fn spawn_watcher(
    path: PathBuf,
    cfg: ReloadConfig,
    table: Arc<ArcSwap<NameTable>>,
    baseline: String,
) -> JoinHandle<()> {
    tracing::info!("[reload] Watching changes for {} (Interval: {:?}, Jitter: {:?})", path.display(), cfg.interval, cfg.jitter);

    tokio::spawn(async move {
        let mut current = baseline;
        loop {
            sleep(jittered(cfg.interval, cfg.jitter)).await;

            let content = match hosts::read(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("[reload] {}", e);
                    RELOAD_FAILED_TOTAL.inc();
                    continue;
                }
            };
            let digest = hosts::digest(&content);
            if digest == current {
                continue;
            }

            tracing::info!("[reload] hosts file change detected! New SHA512: {}", digest);
            let fresh = hosts::build(&content, &path);
            TABLE_ENTRIES.set(fresh.table.len() as f64);
            table.store(Arc::new(fresh.table));
            RELOADS_TOTAL.inc();
            current = fresh.digest;
        }
    })
}

fn jittered(interval: Duration, jitter: Duration) -> Duration {
    let span = jitter.as_millis() as u64;
    if span == 0 {
        return interval;
    }
    let j = rand::thread_rng().gen_range(0..=span * 2);
    let offset = j as i64 - span as i64;
    if offset > 0 { interval + Duration::from_millis(offset as u64) }
    else { interval.saturating_sub(Duration::from_millis(-offset as u64)) }
}
