mod availability;
mod catalog;
mod conflict;
mod error;
mod mutations;
mod policy;
mod queries;
mod reports;
mod reviews;
mod writer;

pub use availability::{block_dates, expected_invalid_dates, is_free, unblock_dates};
pub use catalog::{RoomFilter, RoomTypeFilter, UserFilter};
pub use error::{EngineError, Entity};
pub use policy::{authorize, Actor, Decision};
pub use queries::{BookingFilter, BookingOrder, SortDir};
pub use reviews::ReviewFilter;
pub use reports::{count_by_status, revenue_by_month, revenue_by_room_type, zero_filled};

pub(crate) use conflict::now_ms;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use writer::{WalRequest, WalWriter};

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Engine ──────────────────────────────────────────────

pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) room_types: DashMap<Ulid, RoomType>,
    pub(super) users: DashMap<Ulid, UserProfile>,
    /// Every booking ever placed and not deleted, including those whose room
    /// has since been removed from the catalog.
    pub(super) bookings: DashMap<Ulid, Booking>,
    /// Reverse lookup: review id → room id.
    pub(super) review_to_room: DashMap<Ulid, Ulid>,
    /// Serializes catalog writes so name uniqueness and reference checks see a
    /// stable catalog.
    pub(super) catalog_lock: Mutex<()>,
    pub(super) wal_tx: mpsc::Sender<WalRequest>,
}

/// Apply a room-scoped event (caller holds the room's write lock).
fn apply_to_room(rs: &mut RoomState, event: &Event, review_to_room: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated { spec, at, .. } => rs.apply_spec(spec.clone(), *at),
        Event::BookingPlaced { booking } => {
            if booking.status.is_active() {
                let stay = booking.stay();
                rs.insert_reservation(Reservation {
                    booking_id: booking.id,
                    stay,
                });
                block_dates(rs, &stay);
            }
        }
        Event::BookingStatusChanged { id, status, .. } => {
            if status.releases_dates()
                && let Some(released) = rs.remove_reservation(*id)
            {
                unblock_dates(rs, &released.stay);
            }
        }
        Event::BookingDeleted { id, .. } => {
            if let Some(released) = rs.remove_reservation(*id) {
                unblock_dates(rs, &released.stay);
            }
        }
        Event::ReviewSaved { review } => {
            match rs.reviews.iter_mut().find(|r| r.id == review.id) {
                Some(existing) => *existing = review.clone(),
                None => rs.reviews.push(review.clone()),
            }
            review_to_room.insert(review.id, review.room.id);
            rs.recompute_rating();
        }
        Event::ReviewDeleted { id, .. } => {
            rs.reviews.retain(|r| r.id != *id);
            review_to_room.remove(id);
            rs.recompute_rating();
        }
        _ => {}
    }
}

fn forget_reviews(rs: &RoomState, review_to_room: &DashMap<Ulid, Ulid>) {
    for review in &rs.reviews {
        review_to_room.remove(&review.id);
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let wal_tx = WalWriter::spawn(wal, 4096);

        let engine = Self {
            rooms: DashMap::new(),
            room_types: DashMap::new(),
            users: DashMap::new(),
            bookings: DashMap::new(),
            review_to_room: DashMap::new(),
            catalog_lock: Mutex::new(()),
            wal_tx,
        };

        // Rooms are rebuilt unshared and only wrapped in locks once replay is done.
        let mut rooms: HashMap<Ulid, RoomState> = HashMap::new();
        for event in &events {
            match event {
                Event::RoomCreated { id, spec, at } => {
                    rooms.insert(*id, RoomState::new(*id, spec.clone(), *at));
                }
                Event::RoomDeleted { id } => {
                    if let Some(rs) = rooms.remove(id) {
                        forget_reviews(&rs, &engine.review_to_room);
                    }
                }
                other => {
                    engine.apply_records(other);
                    if let Some(room_id) = other.room_id()
                        && let Some(rs) = rooms.get_mut(&room_id)
                    {
                        apply_to_room(rs, other, &engine.review_to_room);
                    }
                }
            }
        }
        for (id, rs) in rooms {
            engine.rooms.insert(id, Arc::new(RwLock::new(rs)));
        }

        tracing::info!(
            "replayed {} events: {} rooms, {} bookings",
            events.len(),
            engine.rooms.len(),
            engine.bookings.len()
        );
        Ok(engine)
    }

    /// Apply the part of an event that lives outside room state: room types,
    /// profiles and booking records.
    fn apply_records(&self, event: &Event) {
        match event {
            Event::RoomTypeCreated {
                id,
                name,
                description,
                at,
            } => {
                self.room_types.insert(
                    *id,
                    RoomType {
                        id: *id,
                        name: name.clone(),
                        description: description.clone(),
                        created_at: *at,
                        updated_at: *at,
                    },
                );
            }
            Event::RoomTypeUpdated {
                id,
                name,
                description,
                at,
            } => {
                if let Some(mut rt) = self.room_types.get_mut(id) {
                    rt.name = name.clone();
                    rt.description = description.clone();
                    rt.updated_at = *at;
                }
            }
            Event::RoomTypeDeleted { id } => {
                self.room_types.remove(id);
            }
            Event::UserSaved { profile } => {
                self.users.insert(profile.id, profile.clone());
            }
            Event::UserDeleted { id } => {
                self.users.remove(id);
            }
            Event::BookingPlaced { booking } => {
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingStatusChanged { id, status, at, .. } => {
                if let Some(mut b) = self.bookings.get_mut(id) {
                    b.status = *status;
                    b.updated_at = *at;
                }
            }
            Event::BookingDeleted { id, .. } => {
                self.bookings.remove(id);
            }
            _ => {}
        }
    }

    /// Send one request to the WAL writer and wait for its answer.
    pub(super) async fn wal_request<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<T>) -> WalRequest,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(request(tx))
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))
    }

    /// Durably append one event; returns once its batch is fsynced.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let event = event.clone();
        self.wal_request(|ack| WalRequest::Append { event, ack })
            .await?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_room_state(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Write-lock a room that is still in the catalog. A room removed while we
    /// waited for the lock reads as missing.
    pub(super) async fn lock_room(&self, id: Ulid) -> Option<OwnedRwLockWriteGuard<RoomState>> {
        let rs = self.get_room_state(&id)?;
        let guard = rs.write_owned().await;
        self.rooms.contains_key(&id).then_some(guard)
    }

    /// WAL-append, then apply to records and, when given, the locked room.
    pub(super) async fn persist_and_apply(
        &self,
        rs: Option<&mut RoomState>,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_records(event);
        if let Some(rs) = rs {
            apply_to_room(rs, event, &self.review_to_room);
        }
        Ok(())
    }

    /// Look up a booking's room and write-lock it. The guard is `None` when the
    /// room has been deleted; such a booking no longer holds any dates.
    pub(super) async fn resolve_booking_write(
        &self,
        id: Ulid,
    ) -> Result<(Ulid, Option<OwnedRwLockWriteGuard<RoomState>>), EngineError> {
        let room_id = self
            .bookings
            .get(&id)
            .map(|b| b.room.id)
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;
        let guard = self.lock_room(room_id).await;
        Ok((room_id, guard))
    }
}
