use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::{now_ms, Actor, Engine, EngineError};
use crate::model::{BookingStatus, Ms};

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub cancelled: usize,
    /// Already settled by someone else between selection and cancel.
    pub skipped: usize,
    pub failed: usize,
}

/// Cancel every Pending booking older than `pending_ttl` at `now`.
///
/// Each booking is handled on its own: a failure is counted and logged, and
/// the sweep carries on with the rest.
pub async fn sweep_once(engine: &Engine, now: Ms, pending_ttl: Ms) -> SweepReport {
    let mut report = SweepReport::default();
    for id in engine.collect_stale_bookings(now, pending_ttl) {
        match engine.transition(id, Actor::Sweeper, BookingStatus::Cancelled).await {
            Ok(_) => {
                report.cancelled += 1;
                metrics::counter!(crate::observability::SWEEPER_CANCELLED_TOTAL).increment(1);
            }
            // Confirmed or deleted since selection.
            Err(e @ (EngineError::StatusLocked { .. } | EngineError::NotFound(..))) => {
                report.skipped += 1;
                debug!("sweeper skip {id}: {e}");
            }
            Err(e) => {
                report.failed += 1;
                metrics::counter!(crate::observability::SWEEPER_FAILURES_TOTAL).increment(1);
                warn!("sweeper failed to cancel {id}: {e}");
            }
        }
    }
    report
}

/// Shortest sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Background task that periodically cancels abandoned Pending bookings.
pub async fn run_sweeper(engine: Arc<Engine>, every: Duration, pending_ttl: Duration) {
    let ttl = Ms::try_from(pending_ttl.as_millis()).unwrap_or(Ms::MAX);
    let mut interval = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
    loop {
        interval.tick().await;
        let report = sweep_once(&engine, now_ms(), ttl).await;
        if report != SweepReport::default() {
            info!(
                "sweep: {} cancelled, {} skipped, {} failed",
                report.cancelled, report.skipped, report.failed
            );
        }
    }
}

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    const MINUTE: Ms = 60_000;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_sweeper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    async fn setup(name: &str) -> (Arc<Engine>, Ulid, Ulid) {
        let engine = Arc::new(Engine::new(test_wal_path(name)).unwrap());
        let rt = engine.create_room_type("Double", None).await.unwrap();
        let room = engine
            .create_room(RoomSpec {
                name: "River 4".into(),
                description: None,
                room_type_id: rt.id,
                photos: vec![],
                price: 500_000.0,
                discount: 0.0,
                amenities: vec![],
            })
            .await
            .unwrap();
        let user = engine
            .save_user(UserProfile {
                id: Ulid::new(),
                username: "thu".into(),
                email: "thu@example.com".into(),
                phone: "0911111111".into(),
            })
            .await
            .unwrap();
        (engine, room.id, user.id)
    }

    #[tokio::test]
    async fn sweeper_cancels_stale_pending_and_unblocks() {
        let (engine, room_id, user_id) = setup("stale.wal").await;
        let b = engine
            .place_booking(user_id, room_id, d(6, 1), d(6, 3))
            .await
            .unwrap();

        let report = sweep_once(&engine, b.created_at + 16 * MINUTE, 15 * MINUTE).await;
        assert_eq!(report.cancelled, 1);
        assert_eq!(engine.get_booking(b.id).unwrap().status, BookingStatus::Cancelled);
        assert!(engine.get_room(room_id).await.unwrap().invalid_dates.is_empty());
    }

    #[tokio::test]
    async fn sweeper_leaves_fresh_and_confirmed_bookings() {
        let (engine, room_id, user_id) = setup("fresh.wal").await;
        let fresh = engine
            .place_booking(user_id, room_id, d(6, 1), d(6, 3))
            .await
            .unwrap();
        let paid = engine
            .place_booking(user_id, room_id, d(6, 5), d(6, 6))
            .await
            .unwrap();
        engine
            .transition(paid.id, Actor::PaymentGateway, BookingStatus::Confirmed)
            .await
            .unwrap();

        let report = sweep_once(&engine, fresh.created_at + 5 * MINUTE, 15 * MINUTE).await;
        assert_eq!(report, SweepReport::default());
        assert_eq!(engine.get_booking(fresh.id).unwrap().status, BookingStatus::Pending);
        assert_eq!(engine.get_room(room_id).await.unwrap().invalid_dates.len(), 3);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let (engine, room_id, user_id) = setup("twice.wal").await;
        let b = engine
            .place_booking(user_id, room_id, d(7, 1), d(7, 4))
            .await
            .unwrap();
        let later = b.created_at + 20 * MINUTE;
        assert_eq!(sweep_once(&engine, later, 15 * MINUTE).await.cancelled, 1);
        assert_eq!(sweep_once(&engine, later, 15 * MINUTE).await, SweepReport::default());
    }

    #[tokio::test]
    async fn sweep_spares_bookings_paid_in_time() {
        let (engine, room_id, user_id) = setup("isolation.wal").await;
        let a = engine
            .place_booking(user_id, room_id, d(8, 1), d(8, 2))
            .await
            .unwrap();
        let b = engine
            .place_booking(user_id, room_id, d(8, 3), d(8, 4))
            .await
            .unwrap();
        let later = b.created_at + 30 * MINUTE;
        assert_eq!(engine.collect_stale_bookings(later, 15 * MINUTE).len(), 2);

        // Paid for before the sweep gets to it.
        engine
            .transition(a.id, Actor::PaymentGateway, BookingStatus::Confirmed)
            .await
            .unwrap();
        let report = sweep_once(&engine, later, 15 * MINUTE).await;
        assert_eq!(report.cancelled, 1);
        assert_eq!(engine.get_booking(a.id).unwrap().status, BookingStatus::Confirmed);
        assert_eq!(engine.get_booking(b.id).unwrap().status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn zero_interval_sweeper_keeps_running() {
        let (engine, room_id, user_id) = setup("zero_interval.wal").await;
        let b = engine
            .place_booking(user_id, room_id, d(9, 1), d(9, 2))
            .await
            .unwrap();

        let task = tokio::spawn(run_sweeper(engine.clone(), Duration::ZERO, Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!task.is_finished(), "sweeper task died");
        assert_eq!(engine.get_booking(b.id).unwrap().status, BookingStatus::Cancelled);
        task.abort();
    }
}
