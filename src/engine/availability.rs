use chrono::NaiveDate;

use crate::model::*;

// ── Availability Index ────────────────────────────────────────────
//
// `Room.invalid_dates` is the materialized list of nights held by active
// bookings. Only the booking lifecycle writes it, always under the room's write
// lock, and always paired with the matching reservation insert/remove.

/// Add every night of `stay` to the room's blocked list, keeping it sorted.
pub fn block_dates(rs: &mut RoomState, stay: &Stay) {
    let dates = &mut rs.room.invalid_dates;
    for date in stay.dates() {
        if let Err(pos) = dates.binary_search(&date) {
            dates.insert(pos, date);
        }
    }
}

/// Remove the nights of `stay` from the blocked list.
///
/// Call after the releasing booking's reservation is gone: a night another
/// reservation still covers stays blocked.
pub fn unblock_dates(rs: &mut RoomState, stay: &Stay) {
    for date in stay.dates() {
        if rs.covers_date(date) {
            continue;
        }
        if let Ok(pos) = rs.room.invalid_dates.binary_search(&date) {
            rs.room.invalid_dates.remove(pos);
        }
    }
}

/// True when no active booking on the room overlaps `stay`.
pub fn is_free(rs: &RoomState, stay: &Stay) -> bool {
    rs.overlapping(stay).next().is_none()
}

/// The blocked list a room must have for the given reservations: the sorted
/// union of their nights.
pub fn expected_invalid_dates(reservations: &[Reservation]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = reservations.iter().flat_map(|r| r.stay.dates()).collect();
    dates.sort_unstable();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn room() -> RoomState {
        RoomState::new(
            Ulid::new(),
            RoomSpec {
                name: "Hill 7".into(),
                description: None,
                room_type_id: Ulid::new(),
                photos: vec![],
                price: 800_000.0,
                discount: 0.0,
                amenities: vec![],
            },
            0,
        )
    }

    fn reserve(rs: &mut RoomState, stay: Stay) -> Ulid {
        let booking_id = Ulid::new();
        rs.insert_reservation(Reservation { booking_id, stay });
        block_dates(rs, &stay);
        booking_id
    }

    #[test]
    fn block_pushes_every_night_but_check_out() {
        let mut rs = room();
        reserve(&mut rs, Stay::new(d(6, 1), d(6, 3)));
        assert_eq!(rs.room.invalid_dates, vec![d(6, 1), d(6, 2)]);
    }

    #[test]
    fn block_keeps_dates_sorted() {
        let mut rs = room();
        reserve(&mut rs, Stay::new(d(6, 10), d(6, 12)));
        reserve(&mut rs, Stay::new(d(6, 1), d(6, 2)));
        assert_eq!(rs.room.invalid_dates, vec![d(6, 1), d(6, 10), d(6, 11)]);
    }

    #[test]
    fn block_then_unblock_restores_prior_set() {
        let mut rs = room();
        reserve(&mut rs, Stay::new(d(5, 28), d(5, 30)));
        let before = rs.room.invalid_dates.clone();

        let stay = Stay::new(d(6, 1), d(6, 4));
        let id = reserve(&mut rs, stay);
        assert_eq!(rs.room.invalid_dates.len(), before.len() + 3);

        rs.remove_reservation(id);
        unblock_dates(&mut rs, &stay);
        assert_eq!(rs.room.invalid_dates, before);
    }

    #[test]
    fn unblock_leaves_nights_of_remaining_reservations() {
        let mut rs = room();
        // Not reachable through the engine (stays are disjoint), but the index
        // must not drop a night someone else still holds.
        let keep = Stay::new(d(6, 2), d(6, 5));
        rs.insert_reservation(Reservation { booking_id: Ulid::new(), stay: keep });
        block_dates(&mut rs, &keep);
        let gone = Stay::new(d(6, 1), d(6, 3));
        unblock_dates(&mut rs, &gone);
        assert_eq!(rs.room.invalid_dates, vec![d(6, 2), d(6, 3), d(6, 4)]);
    }

    #[test]
    fn unblock_twice_is_harmless() {
        let mut rs = room();
        let stay = Stay::new(d(6, 1), d(6, 3));
        let id = reserve(&mut rs, stay);
        rs.remove_reservation(id);
        unblock_dates(&mut rs, &stay);
        unblock_dates(&mut rs, &stay);
        assert!(rs.room.invalid_dates.is_empty());
    }

    #[test]
    fn free_check_uses_half_open_stays() {
        let mut rs = room();
        reserve(&mut rs, Stay::new(d(6, 1), d(6, 3)));
        assert!(!is_free(&rs, &Stay::new(d(6, 2), d(6, 4))));
        assert!(is_free(&rs, &Stay::new(d(6, 3), d(6, 4))));
        assert!(!is_free(&rs, &Stay::new(d(5, 20), d(6, 20))));
    }

    #[test]
    fn expected_dates_union() {
        let rs = {
            let mut rs = room();
            reserve(&mut rs, Stay::new(d(6, 5), d(6, 7)));
            reserve(&mut rs, Stay::new(d(6, 1), d(6, 2)));
            rs
        };
        assert_eq!(expected_invalid_dates(&rs.reservations), rs.room.invalid_dates);
    }
}
