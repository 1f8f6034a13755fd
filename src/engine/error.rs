use std::fmt;

use ulid::Ulid;

use crate::model::BookingStatus;

/// What a `NotFound` / `InUse` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room,
    RoomType,
    Booking,
    User,
    Review,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Room => "room",
            Entity::RoomType => "room type",
            Entity::Booking => "booking",
            Entity::User => "user",
            Entity::Review => "review",
        })
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Entity, Ulid),
    /// A unique field (room or room type name) is already taken.
    AlreadyExists(Entity, String),
    /// The requested stay overlaps this active booking.
    Conflict(Ulid),
    /// The booking's current status does not allow the requested change.
    StatusLocked {
        id: Ulid,
        status: BookingStatus,
    },
    /// No actor may ever request this target status.
    InvalidTransition(BookingStatus),
    /// Still referenced: a room type with rooms, a room with active bookings.
    InUse(Entity, Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::AlreadyExists(entity, name) => {
                write!(f, "{entity} named {name:?} already exists")
            }
            EngineError::Conflict(id) => write!(f, "stay overlaps active booking {id}"),
            EngineError::StatusLocked { id, status } => {
                write!(f, "booking {id} is {status} and cannot change")
            }
            EngineError::InvalidTransition(to) => write!(f, "cannot move a booking to {to}"),
            EngineError::InUse(entity, id) => write!(f, "{entity} {id} is still in use"),
            EngineError::Invalid(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
