use chrono::{Datelike, NaiveDate};

use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<Stay, EngineError> {
    use crate::limits::*;
    if check_out <= check_in {
        return Err(EngineError::Invalid("check-out must be after check-in"));
    }
    if check_in.year() < MIN_VALID_YEAR || check_out.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    let stay = Stay::new(check_in, check_out);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// Reject `stay` if any active booking on the room overlaps it.
///
/// Uses the symmetric half-open test `existing.check_in < stay.check_out &&
/// existing.check_out > stay.check_in`, so a request that swallows an existing
/// stay whole is caught too.
pub(crate) fn check_no_conflict(rs: &RoomState, stay: &Stay) -> Result<(), EngineError> {
    match rs.overlapping(stay).next() {
        Some(existing) => Err(EngineError::Conflict(existing.booking_id)),
        None => Ok(()),
    }
}

/// Nights times the discounted nightly price.
pub(crate) fn total_cost(room: &Room, stay: &Stay) -> f64 {
    stay.nights() as f64 * room.discounted_price()
}
