use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the timestamp type for createdAt/updatedAt.
pub type Ms = i64;

/// Half-open stay `[check_in, check_out)` at day granularity.
/// The guest sleeps on `check_in` and leaves on `check_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    /// Every night of the stay, in order. `check_out` is not included.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Display order used by the status report.
    pub const REPORT_ORDER: [BookingStatus; 4] = [
        BookingStatus::Confirmed,
        BookingStatus::Pending,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    /// Active bookings occupy room availability.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Moving into one of these statuses gives the nights back to the room.
    pub fn releases_dates(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Directory & snapshots ───────────────────────────────────────

/// A user profile as held by the directory. Identity itself lives with the
/// identity provider; this is the contact data bookings copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Ulid,
    pub username: String,
    pub email: String,
    pub phone: String,
}

/// User fields frozen into a booking or review when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub id: Ulid,
    pub username: String,
    pub email: String,
    pub phone: String,
}

impl From<&UserProfile> for UserSnapshot {
    fn from(p: &UserProfile) -> Self {
        Self {
            id: p.id,
            username: p.username.clone(),
            email: p.email.clone(),
            phone: p.phone.clone(),
        }
    }
}

/// Room pricing frozen into a booking when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: Ulid,
    pub name: String,
    pub price: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub id: Ulid,
    pub name: String,
}

// ── Catalog ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: Ulid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// The editable part of a room. Availability and rating are derived and never
/// part of a catalog edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub room_type_id: Ulid,
    #[serde(default)]
    pub photos: Vec<String>,
    pub price: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub description: Option<String>,
    pub room_type_id: Ulid,
    pub photos: Vec<String>,
    pub price: f64,
    pub discount: f64,
    pub amenities: Vec<String>,
    /// Average review rating, 0 when the room has no reviews.
    pub rating: f64,
    /// Nights held by active bookings, ascending.
    pub invalid_dates: Vec<NaiveDate>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Room {
    /// Nightly price after the room's percentage discount.
    pub fn discounted_price(&self) -> f64 {
        self.price - self.price * self.discount / 100.0
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            discount: self.discount,
        }
    }
}

// ── Bookings & reviews ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub user: UserSnapshot,
    pub room: RoomSnapshot,
    /// Room type name at creation time; revenue groups on this.
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_cost: f64,
    pub status: BookingStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    pub fn stay(&self) -> Stay {
        Stay::new(self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Ulid,
    pub user: UserSnapshot,
    pub room: RoomRef,
    pub rating: u8,
    pub comment: String,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// A booking's claim on a room's nights. Exists only while the booking is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub booking_id: Ulid,
    pub stay: Stay,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Active bookings, sorted by `stay.check_in`. Pairwise disjoint.
    pub reservations: Vec<Reservation>,
    pub reviews: Vec<Review>,
}

impl RoomState {
    pub fn new(id: Ulid, spec: RoomSpec, at: Ms) -> Self {
        let room = Room {
            id,
            name: spec.name,
            description: spec.description,
            room_type_id: spec.room_type_id,
            photos: spec.photos,
            price: spec.price,
            discount: spec.discount,
            amenities: spec.amenities,
            rating: 0.0,
            invalid_dates: Vec::new(),
            created_at: at,
            updated_at: at,
        };
        Self {
            room,
            reservations: Vec::new(),
            reviews: Vec::new(),
        }
    }

    /// Overwrite catalog fields only.
    pub fn apply_spec(&mut self, spec: RoomSpec, at: Ms) {
        self.room.name = spec.name;
        self.room.description = spec.description;
        self.room.room_type_id = spec.room_type_id;
        self.room.photos = spec.photos;
        self.room.price = spec.price;
        self.room.discount = spec.discount;
        self.room.amenities = spec.amenities;
        self.room.updated_at = at;
    }

    pub fn spec(&self) -> RoomSpec {
        RoomSpec {
            name: self.room.name.clone(),
            description: self.room.description.clone(),
            room_type_id: self.room.room_type_id,
            photos: self.room.photos.clone(),
            price: self.room.price,
            discount: self.room.discount,
            amenities: self.room.amenities.clone(),
        }
    }

    /// Insert reservation maintaining sort order by check-in.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.stay.check_in, |r| r.stay.check_in)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, booking_id: Ulid) -> Option<Reservation> {
        let pos = self
            .reservations
            .iter()
            .position(|r| r.booking_id == booking_id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn holds(&self, booking_id: Ulid) -> bool {
        self.reservations.iter().any(|r| r.booking_id == booking_id)
    }

    /// Reservations whose stay overlaps `query`.
    /// Binary search skips everything checking in on or after `query.check_out`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.stay.check_in < query.check_out);
        let start = query.check_in;
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.stay.check_out > start)
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.reservations.iter().any(|r| r.stay.contains_date(date))
    }

    /// Average of all review ratings; 0 when there are none.
    pub fn recompute_rating(&mut self) {
        let total: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        let count = self.reviews.len().max(1);
        self.room.rating = f64::from(total) / count as f64;
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
/// Derived fields (invalid dates, ratings) are rebuilt on apply, never logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeCreated {
        id: Ulid,
        name: String,
        description: Option<String>,
        at: Ms,
    },
    RoomTypeUpdated {
        id: Ulid,
        name: String,
        description: Option<String>,
        at: Ms,
    },
    RoomTypeDeleted {
        id: Ulid,
    },
    RoomCreated {
        id: Ulid,
        spec: RoomSpec,
        at: Ms,
    },
    RoomUpdated {
        id: Ulid,
        spec: RoomSpec,
        at: Ms,
    },
    RoomDeleted {
        id: Ulid,
    },
    UserSaved {
        profile: UserProfile,
    },
    UserDeleted {
        id: Ulid,
    },
    BookingPlaced {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: BookingStatus,
        at: Ms,
    },
    BookingDeleted {
        id: Ulid,
        room_id: Ulid,
    },
    ReviewSaved {
        review: Review,
    },
    ReviewDeleted {
        id: Ulid,
        room_id: Ulid,
    },
}

impl Event {
    /// The room whose lock must be held while this event is applied.
    pub fn room_id(&self) -> Option<Ulid> {
        match self {
            Event::RoomUpdated { id, .. } => Some(*id),
            Event::BookingPlaced { booking } => Some(booking.room.id),
            Event::BookingStatusChanged { room_id, .. }
            | Event::BookingDeleted { room_id, .. }
            | Event::ReviewDeleted { room_id, .. } => Some(*room_id),
            Event::ReviewSaved { review } => Some(review.room.id),
            Event::RoomTypeCreated { .. }
            | Event::RoomTypeUpdated { .. }
            | Event::RoomTypeDeleted { .. }
            | Event::RoomCreated { .. }
            | Event::RoomDeleted { .. }
            | Event::UserSaved { .. }
            | Event::UserDeleted { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: BookingStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRevenue {
    /// `YYYY-MM`.
    pub month: String,
    pub total_revenue: f64,
    pub bookings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypeRevenue {
    pub room_type: String,
    pub total_revenue: f64,
    pub bookings: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}
