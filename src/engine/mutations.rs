use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, now_ms, total_cost, validate_stay};
use super::policy::{authorize, Actor, Decision};
use super::{Engine, EngineError, Entity, WalRequest};

impl Engine {
    /// Create a Pending booking for `user_id` on `room_id`.
    ///
    /// The conflict check, the insert and the date blocking all happen under
    /// the room's write lock, so two overlapping requests cannot both land.
    pub async fn place_booking(
        &self,
        user_id: Ulid,
        room_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        let user = self
            .users
            .get(&user_id)
            .map(|u| UserSnapshot::from(u.value()))
            .ok_or(EngineError::NotFound(Entity::User, user_id))?;

        let mut guard = self
            .lock_room(room_id)
            .await
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;
        if guard.reservations.len() >= MAX_ACTIVE_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many active bookings on room"));
        }
        if let Err(e) = check_no_conflict(&guard, &stay) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }
        let room_type_id = guard.room.room_type_id;
        let room_type = self
            .room_types
            .get(&room_type_id)
            .map(|t| t.name.clone())
            .ok_or(EngineError::NotFound(Entity::RoomType, room_type_id))?;

        let now = now_ms();
        let booking = Booking {
            id: Ulid::new(),
            user,
            room: guard.room.snapshot(),
            room_type,
            check_in,
            check_out,
            total_cost: total_cost(&guard.room, &stay),
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let event = Event::BookingPlaced {
            booking: booking.clone(),
        };
        self.persist_and_apply(Some(&mut *guard), &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            "booking {} placed on room {room_id} for {check_in}..{check_out}",
            booking.id
        );
        Ok(booking)
    }

    /// The one way a booking's status changes. Every actor goes through the
    /// same policy check, and moving to Cancelled or Completed gives the nights
    /// back to the room if the booking still holds them.
    pub async fn transition(
        &self,
        id: Ulid,
        actor: Actor,
        to: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(id).await?;
        let _catalog = match guard {
            Some(_) => None,
            // Room already deleted: the catalog lock orders us against compaction.
            None => Some(self.catalog_lock.lock().await),
        };
        // Re-read under the lock: a racing transition may have won.
        let booking = self
            .bookings
            .get(&id)
            .map(|b| b.value().clone())
            .ok_or(EngineError::NotFound(Entity::Booking, id))?;

        match authorize(actor, &booking, to)? {
            Decision::NoOp => return Ok(booking),
            Decision::Apply => {}
        }

        let event = Event::BookingStatusChanged {
            id,
            room_id,
            status: to,
            at: now_ms(),
        };
        self.persist_and_apply(guard.as_deref_mut(), &event).await?;

        metrics::counter!(
            crate::observability::BOOKING_TRANSITIONS_TOTAL,
            "actor" => actor.label(),
            "status" => to.as_str(),
        )
        .increment(1);
        info!("booking {id} {} -> {to} by {}", booking.status, actor.label());
        self.bookings
            .get(&id)
            .map(|b| b.value().clone())
            .ok_or(EngineError::NotFound(Entity::Booking, id))
    }

    /// Remove a booking outright, from any status. Its nights are released only
    /// if it still holds them.
    pub async fn delete_booking(&self, id: Ulid) -> Result<(), EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(id).await?;
        let _catalog = match guard {
            Some(_) => None,
            None => Some(self.catalog_lock.lock().await),
        };
        if !self.bookings.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Booking, id));
        }
        let event = Event::BookingDeleted { id, room_id };
        self.persist_and_apply(guard.as_deref_mut(), &event).await?;
        info!("booking {id} deleted");
        Ok(())
    }

    /// Pending bookings created at or before `now - ttl`.
    pub fn collect_stale_bookings(&self, now: Ms, ttl: Ms) -> Vec<Ulid> {
        self.bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at + ttl <= now)
            .map(|b| b.id)
            .collect()
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate
    /// the current state.
    ///
    /// Holds the catalog lock and a read lock on every room until the rewrite
    /// is done, so no event can be acknowledged between the snapshot and the
    /// file swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let mut guards = Vec::with_capacity(self.rooms.len());
        let room_states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs in room_states {
            guards.push(rs.read_owned().await);
        }

        let mut events = Vec::new();
        for rt in self.room_types.iter() {
            events.push(Event::RoomTypeCreated {
                id: rt.id,
                name: rt.name.clone(),
                description: rt.description.clone(),
                at: rt.created_at,
            });
            if rt.updated_at != rt.created_at {
                events.push(Event::RoomTypeUpdated {
                    id: rt.id,
                    name: rt.name.clone(),
                    description: rt.description.clone(),
                    at: rt.updated_at,
                });
            }
        }
        for guard in &guards {
            events.push(Event::RoomCreated {
                id: guard.room.id,
                spec: guard.spec(),
                at: guard.room.created_at,
            });
            if guard.room.updated_at != guard.room.created_at {
                events.push(Event::RoomUpdated {
                    id: guard.room.id,
                    spec: guard.spec(),
                    at: guard.room.updated_at,
                });
            }
        }
        for user in self.users.iter() {
            events.push(Event::UserSaved {
                profile: user.value().clone(),
            });
        }
        // Bookings carry their current status; replay reserves only active ones.
        for booking in self.bookings.iter() {
            events.push(Event::BookingPlaced {
                booking: booking.value().clone(),
            });
        }
        for guard in &guards {
            for review in &guard.reviews {
                events.push(Event::ReviewSaved {
                    review: review.clone(),
                });
            }
        }

        self.wal_request(|ack| WalRequest::Rewrite { events, ack })
            .await?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.wal_request(|reply| WalRequest::AppendCount { reply })
            .await
            .unwrap_or(0)
    }
}
