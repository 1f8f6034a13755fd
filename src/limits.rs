//! Hard caps on input sizes. Everything user-supplied is checked against these
//! before it reaches the WAL.

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_ROOM_TYPES: usize = 1_000;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;
pub const MAX_COMMENT_LEN: usize = 4_000;
pub const MAX_CONTACT_LEN: usize = 320;
pub const MAX_PHOTOS: usize = 50;
pub const MAX_AMENITIES: usize = 100;
pub const MAX_URL_LEN: usize = 2_048;

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;
/// Active bookings held on one room at any time.
pub const MAX_ACTIVE_BOOKINGS_PER_ROOM: usize = 2_000;

pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2200;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;
pub const MAX_SEARCH_LEN: usize = 200;
