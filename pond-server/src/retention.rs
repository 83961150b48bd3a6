//! Background maintenance: periodic eviction of records older than
//! `max_age`, and periodic compaction of per-site indexes with nothing
//! left to serve. Runs off a fixed wall-clock interval rather than off
//! ingest activity.

use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::instance::Instance;

const MAX_AGE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const COMPRESS_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub async fn run(instance: Rc<Instance>) {
    let mut age_timer = tokio::time::interval(MAX_AGE_CHECK_INTERVAL);
    let mut compress_timer = tokio::time::interval(COMPRESS_INTERVAL);
    age_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    compress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = age_timer.tick() => {
                if let Some(max_age) = instance.max_age {
                    let cutoff = instance.system_now().saturating_sub(max_age.into());
                    instance.database.borrow_mut().delete_older_than(cutoff);
                    debug!("retention sweep ran");
                }
                refresh_gauges(&instance);
            }
            _ = compress_timer.tick() => {
                instance.database.borrow_mut().compress();
                debug!("compress ran");
                refresh_gauges(&instance);
            }
        }
    }
}

fn refresh_gauges(instance: &Instance) {
    let db = instance.database.borrow();
    crate::metrics::memory_usage_bytes().set(db.memory_usage() as i64);
    crate::metrics::record_count().set(db.record_count() as i64);
}
