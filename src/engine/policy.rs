use ulid::Ulid;

use crate::model::{Booking, BookingStatus};

use super::{EngineError, Entity};

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A signed-in guest acting on their own booking.
    Guest(Ulid),
    Admin,
    PaymentGateway,
    Sweeper,
}

impl Actor {
    pub fn label(&self) -> &'static str {
        match self {
            Actor::Guest(_) => "guest",
            Actor::Admin => "admin",
            Actor::PaymentGateway => "payment_gateway",
            Actor::Sweeper => "sweeper",
        }
    }

    fn may_leave(&self, from: BookingStatus) -> bool {
        use BookingStatus::*;
        match self {
            Actor::Guest(_) => matches!(from, Pending | Confirmed),
            Actor::Admin | Actor::PaymentGateway | Actor::Sweeper => from == Pending,
        }
    }

    fn may_target(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        match self {
            Actor::Guest(_) | Actor::Admin => matches!(to, Confirmed | Cancelled | Completed),
            Actor::PaymentGateway => matches!(to, Confirmed | Cancelled),
            Actor::Sweeper => to == Cancelled,
        }
    }

    /// Whether repeating the current status is silently accepted.
    fn tolerates_repeat(&self) -> bool {
        !matches!(self, Actor::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    NoOp,
}

/// Decide whether `actor` may move `booking` to `to`.
///
/// A guest asking about someone else's booking gets `NotFound`, never a hint
/// that the booking exists.
pub fn authorize(actor: Actor, booking: &Booking, to: BookingStatus) -> Result<Decision, EngineError> {
    if to == BookingStatus::Pending {
        return Err(EngineError::InvalidTransition(to));
    }
    if let Actor::Guest(user_id) = actor
        && booking.user.id != user_id
    {
        return Err(EngineError::NotFound(Entity::Booking, booking.id));
    }
    let locked = EngineError::StatusLocked {
        id: booking.id,
        status: booking.status,
    };
    if booking.status == to {
        return if actor.tolerates_repeat() {
            Ok(Decision::NoOp)
        } else {
            Err(locked)
        };
    }
    if actor.may_leave(booking.status) && actor.may_target(to) {
        Ok(Decision::Apply)
    } else {
        Err(locked)
    }
}
