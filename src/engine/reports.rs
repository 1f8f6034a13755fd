use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};

use crate::model::*;

use super::Engine;

// ── Revenue / status aggregation ─────────────────────────────────
//
// Pure functions over booking records; the engine wrappers only collect the
// records. Revenue counts Confirmed bookings, bucketed by the UTC creation time.

fn created(b: &Booking) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(b.created_at)
}

fn confirmed_in_year<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    year: i32,
) -> impl Iterator<Item = (&'a Booking, DateTime<Utc>)> {
    bookings.into_iter().filter_map(move |b| {
        let at = created(b)?;
        (b.status == BookingStatus::Confirmed && at.year() == year).then_some((b, at))
    })
}

/// Count per status, every status present (zero-filled) in report order.
pub fn count_by_status<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Vec<StatusCount> {
    let mut counts: HashMap<BookingStatus, u64> = HashMap::new();
    for b in bookings {
        *counts.entry(b.status).or_default() += 1;
    }
    BookingStatus::REPORT_ORDER
        .iter()
        .map(|&status| StatusCount {
            status,
            count: counts.get(&status).copied().unwrap_or(0),
        })
        .collect()
}

/// Confirmed revenue per `YYYY-MM` of `year`, ascending. Months without
/// confirmed bookings are absent; see [`zero_filled`].
pub fn revenue_by_month<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    year: i32,
) -> Vec<MonthRevenue> {
    let mut months: BTreeMap<u32, (f64, u64)> = BTreeMap::new();
    for (b, at) in confirmed_in_year(bookings, year) {
        let slot = months.entry(at.month()).or_default();
        slot.0 += b.total_cost;
        slot.1 += 1;
    }
    months
        .into_iter()
        .map(|(month, (total_revenue, bookings))| MonthRevenue {
            month: format!("{year:04}-{month:02}"),
            total_revenue,
            bookings,
        })
        .collect()
}

/// The full January..December series for `year`, taking values from `raw`.
pub fn zero_filled(year: i32, raw: &[MonthRevenue]) -> Vec<MonthRevenue> {
    (1..=12)
        .map(|m| {
            let month = format!("{year:04}-{m:02}");
            raw.iter()
                .find(|r| r.month == month)
                .cloned()
                .unwrap_or(MonthRevenue {
                    month,
                    total_revenue: 0.0,
                    bookings: 0,
                })
        })
        .collect()
}

/// Confirmed revenue per snapshotted room type name, highest first.
pub fn revenue_by_room_type<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    year: i32,
) -> Vec<RoomTypeRevenue> {
    let mut groups: HashMap<&str, (f64, u64)> = HashMap::new();
    for (b, _) in confirmed_in_year(bookings, year) {
        let slot = groups.entry(b.room_type.as_str()).or_default();
        slot.0 += b.total_cost;
        slot.1 += 1;
    }
    let mut out: Vec<RoomTypeRevenue> = groups
        .into_iter()
        .map(|(room_type, (total_revenue, bookings))| RoomTypeRevenue {
            room_type: room_type.to_string(),
            total_revenue,
            bookings,
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_revenue
            .total_cmp(&a.total_revenue)
            .then_with(|| a.room_type.cmp(&b.room_type))
    });
    out
}

impl Engine {
    fn booking_records(&self) -> Vec<Booking> {
        self.bookings.iter().map(|b| b.value().clone()).collect()
    }

    pub fn status_report(&self) -> Vec<StatusCount> {
        count_by_status(&self.booking_records())
    }

    pub fn monthly_revenue(&self, year: i32) -> Vec<MonthRevenue> {
        revenue_by_month(&self.booking_records(), year)
    }

    pub fn room_type_revenue(&self, year: i32) -> Vec<RoomTypeRevenue> {
        revenue_by_room_type(&self.booking_records(), year)
    }
}
