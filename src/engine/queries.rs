use std::cmp::Ordering;

use serde::Deserialize;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, Entity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingOrder {
    #[default]
    CreatedAt,
    CheckIn,
    TotalCost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub(crate) fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }
}

/// Admin booking list parameters. Deserializes straight from a query string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub room_type: Option<String>,
    pub search: Option<String>,
    pub order_by: BookingOrder,
    pub sort_by: SortDir,
    pub page: usize,
    pub limit: usize,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            status: None,
            room_type: None,
            search: None,
            order_by: BookingOrder::default(),
            sort_by: SortDir::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Slice out one 1-based page. Page 0 reads as page 1; limit 0 as the default.
pub(crate) fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = match limit {
        0 => DEFAULT_PAGE_LIMIT,
        n => n.min(MAX_PAGE_LIMIT),
    };
    let total = items.len();
    let data = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    Page {
        data,
        total,
        page,
        limit,
    }
}

/// Normalize a search term: trimmed, lowercased, `None` when blank.
pub(crate) fn search_term(search: Option<&str>) -> Result<Option<String>, EngineError> {
    let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if term.len() > MAX_SEARCH_LEN {
        return Err(EngineError::LimitExceeded("search term too long"));
    }
    Ok(Some(term.to_lowercase()))
}

pub(crate) fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn booking_matches(b: &Booking, term: &str) -> bool {
    contains_ci(&b.user.username, term)
        || contains_ci(&b.user.email, term)
        || contains_ci(&b.room.name, term)
        || contains_ci(&b.room_type, term)
}

impl Engine {
    pub fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.bookings
            .get(&id)
            .map(|b| b.value().clone())
            .ok_or(EngineError::NotFound(Entity::Booking, id))
    }

    pub fn list_bookings(&self, filter: &BookingFilter) -> Result<Page<Booking>, EngineError> {
        let term = search_term(filter.search.as_deref())?;
        let mut hits: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| {
                filter
                    .room_type
                    .as_deref()
                    .is_none_or(|rt| b.room_type == rt)
            })
            .filter(|b| term.as_deref().is_none_or(|t| booking_matches(b, t)))
            .map(|b| b.value().clone())
            .collect();

        hits.sort_by(|a, b| {
            let ord = match filter.order_by {
                BookingOrder::CreatedAt => a.created_at.cmp(&b.created_at),
                BookingOrder::CheckIn => a.check_in.cmp(&b.check_in),
                BookingOrder::TotalCost => a.total_cost.total_cmp(&b.total_cost),
            };
            filter.sort_by.apply(ord.then(a.id.cmp(&b.id)))
        });
        Ok(paginate(hits, filter.page, filter.limit))
    }

    /// A guest's own bookings, newest first.
    pub fn user_bookings(&self, user_id: Ulid) -> Vec<Booking> {
        let mut mine: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|b| b.user.id == user_id)
            .map(|b| b.value().clone())
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        mine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_is_one_based() {
        let page = paginate((1..=25).collect::<Vec<_>>(), 2, 10);
        assert_eq!(page.data, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn paginate_clamps_inputs() {
        let page = paginate((1..=500).collect::<Vec<_>>(), 0, 1_000);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_PAGE_LIMIT);
        assert_eq!(page.data.len(), MAX_PAGE_LIMIT);

        let page = paginate(vec![1, 2, 3], 1, 0);
        assert_eq!(page.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn paginate_past_end_is_empty() {
        let page = paginate(vec![1, 2, 3], 5, 2);
        assert!(page.data.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn search_term_normalizes() {
        assert_eq!(search_term(Some("  Lan ")).unwrap().as_deref(), Some("lan"));
        assert_eq!(search_term(Some("   ")).unwrap(), None);
        assert_eq!(search_term(None).unwrap(), None);
        let long = "x".repeat(MAX_SEARCH_LEN + 1);
        assert!(search_term(Some(&long)).is_err());
    }

    #[test]
    fn filter_parses_from_query_names() {
        let f: BookingFilter = serde_json::from_str(
            r#"{"status":"Pending","orderBy":"totalCost","sortBy":"asc","page":3}"#,
        )
        .unwrap();
        assert_eq!(f.status, Some(BookingStatus::Pending));
        assert_eq!(f.order_by, BookingOrder::TotalCost);
        assert_eq!(f.sort_by, SortDir::Asc);
        assert_eq!(f.page, 3);
        assert_eq!(f.limit, DEFAULT_PAGE_LIMIT);
    }
}
