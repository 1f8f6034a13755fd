use serde::Deserialize;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::now_ms;
use super::queries::{contains_ci, paginate, search_term};
use super::{Engine, EngineError, Entity};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReviewFilter {
    pub search: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for ReviewFilter {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

fn validate_review(rating: u8, comment: &str) -> Result<String, EngineError> {
    if !(1..=5).contains(&rating) {
        return Err(EngineError::Invalid("rating must be between 1 and 5"));
    }
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(EngineError::Invalid("comment is required"));
    }
    if comment.len() > MAX_COMMENT_LEN {
        return Err(EngineError::LimitExceeded("comment too long"));
    }
    Ok(comment.to_string())
}

fn newest_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
}

impl Engine {
    /// One review per (user, room): a second submission replaces the first and
    /// keeps its id. The room's rating is recomputed in the same step.
    pub async fn upsert_review(
        &self,
        user_id: Ulid,
        room_id: Ulid,
        rating: u8,
        comment: &str,
    ) -> Result<Review, EngineError> {
        let comment = validate_review(rating, comment)?;
        let user = self
            .users
            .get(&user_id)
            .map(|u| UserSnapshot::from(u.value()))
            .ok_or(EngineError::NotFound(Entity::User, user_id))?;
        let mut guard = self
            .lock_room(room_id)
            .await
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;

        let now = now_ms();
        let (id, created_at) = guard
            .reviews
            .iter()
            .find(|r| r.user.id == user_id)
            .map_or((Ulid::new(), now), |r| (r.id, r.created_at));
        let review = Review {
            id,
            user,
            room: RoomRef {
                id: room_id,
                name: guard.room.name.clone(),
            },
            rating,
            comment,
            created_at,
            updated_at: now,
        };
        let event = Event::ReviewSaved {
            review: review.clone(),
        };
        self.persist_and_apply(Some(&mut *guard), &event).await?;
        info!("review {id} saved on room {room_id}, rating now {:.2}", guard.room.rating);
        Ok(review)
    }

    /// Newest first.
    pub async fn list_room_reviews(
        &self,
        room_id: Ulid,
        page: usize,
        limit: usize,
    ) -> Result<Page<Review>, EngineError> {
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;
        let mut reviews = rs.read().await.reviews.clone();
        newest_first(&mut reviews);
        Ok(paginate(reviews, page, limit))
    }

    /// Every review across rooms, searching username, email and room name.
    pub async fn list_reviews(&self, filter: &ReviewFilter) -> Result<Page<Review>, EngineError> {
        let term = search_term(filter.search.as_deref())?;
        let handles: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut hits = Vec::new();
        for rs in handles {
            let guard = rs.read().await;
            hits.extend(
                guard
                    .reviews
                    .iter()
                    .filter(|r| {
                        term.as_deref().is_none_or(|t| {
                            contains_ci(&r.user.username, t)
                                || contains_ci(&r.user.email, t)
                                || contains_ci(&r.room.name, t)
                        })
                    })
                    .cloned(),
            );
        }
        newest_first(&mut hits);
        Ok(paginate(hits, filter.page, filter.limit))
    }

    pub async fn delete_review(&self, id: Ulid) -> Result<(), EngineError> {
        let room_id = self
            .review_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(Entity::Review, id))?;
        let mut guard = self
            .lock_room(room_id)
            .await
            .ok_or(EngineError::NotFound(Entity::Review, id))?;
        if !guard.reviews.iter().any(|r| r.id == id) {
            return Err(EngineError::NotFound(Entity::Review, id));
        }
        let event = Event::ReviewDeleted { id, room_id };
        self.persist_and_apply(Some(&mut *guard), &event).await?;
        info!("review {id} deleted from room {room_id}");
        Ok(())
    }
}
