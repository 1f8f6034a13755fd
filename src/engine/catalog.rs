use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::is_free;
use super::conflict::{now_ms, validate_stay};
use super::queries::{contains_ci, paginate, search_term};
use super::{forget_reviews, Engine, EngineError, Entity, SharedRoomState};

/// Room list parameters. Deserializes straight from a query string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomFilter {
    pub search: Option<String>,
    pub room_type: Option<Ulid>,
    /// With `check_out`, keep only rooms free for the whole window.
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub page: usize,
    pub limit: usize,
}

impl Default for RoomFilter {
    fn default() -> Self {
        Self {
            search: None,
            room_type: None,
            check_in: None,
            check_out: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoomTypeFilter {
    pub search: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for RoomTypeFilter {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Admin user list parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    /// Matches username or email, or a whole user id.
    pub search: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

fn validate_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::Invalid("name is required"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(name.to_string())
}

fn validate_description(description: Option<&str>) -> Result<(), EngineError> {
    if description.is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    Ok(())
}

fn validate_spec(mut spec: RoomSpec) -> Result<RoomSpec, EngineError> {
    spec.name = validate_name(&spec.name)?;
    validate_description(spec.description.as_deref())?;
    if !spec.price.is_finite() || spec.price < 0.0 {
        return Err(EngineError::Invalid("price must be a non-negative number"));
    }
    if !spec.discount.is_finite() || !(0.0..=100.0).contains(&spec.discount) {
        return Err(EngineError::Invalid("discount must be between 0 and 100"));
    }
    if spec.photos.len() > MAX_PHOTOS {
        return Err(EngineError::LimitExceeded("too many photos"));
    }
    if spec.photos.iter().any(|p| p.len() > MAX_URL_LEN) {
        return Err(EngineError::LimitExceeded("photo URL too long"));
    }
    if spec.amenities.len() > MAX_AMENITIES {
        return Err(EngineError::LimitExceeded("too many amenities"));
    }
    if spec.amenities.iter().any(|a| a.len() > MAX_NAME_LEN) {
        return Err(EngineError::LimitExceeded("amenity too long"));
    }
    Ok(spec)
}

fn validate_profile(profile: &UserProfile) -> Result<(), EngineError> {
    if profile.username.trim().is_empty() {
        return Err(EngineError::Invalid("username is required"));
    }
    if profile.email.trim().is_empty() || !profile.email.contains('@') {
        return Err(EngineError::Invalid("email is invalid"));
    }
    if profile.username.len() > MAX_NAME_LEN
        || profile.email.len() > MAX_CONTACT_LEN
        || profile.phone.len() > MAX_CONTACT_LEN
    {
        return Err(EngineError::LimitExceeded("profile field too long"));
    }
    Ok(())
}

impl Engine {
    // ── Room types ──────────────────────────────────────

    pub async fn create_room_type(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<RoomType, EngineError> {
        let name = validate_name(name)?;
        validate_description(description.as_deref())?;
        let _catalog = self.catalog_lock.lock().await;
        if self.room_types.len() >= MAX_ROOM_TYPES {
            return Err(EngineError::LimitExceeded("too many room types"));
        }
        if self.room_types.iter().any(|rt| rt.name == name) {
            return Err(EngineError::AlreadyExists(Entity::RoomType, name));
        }

        let id = Ulid::new();
        let event = Event::RoomTypeCreated {
            id,
            name,
            description,
            at: now_ms(),
        };
        self.persist_and_apply(None, &event).await?;
        info!("room type {id} created");
        self.get_room_type(id)
    }

    pub fn get_room_type(&self, id: Ulid) -> Result<RoomType, EngineError> {
        self.room_types
            .get(&id)
            .map(|rt| rt.value().clone())
            .ok_or(EngineError::NotFound(Entity::RoomType, id))
    }

    /// Newest first, searching name and description.
    pub fn list_room_types(&self, filter: &RoomTypeFilter) -> Result<Page<RoomType>, EngineError> {
        let term = search_term(filter.search.as_deref())?;
        let mut hits: Vec<RoomType> = self
            .room_types
            .iter()
            .filter(|rt| {
                term.as_deref().is_none_or(|t| {
                    contains_ci(&rt.name, t)
                        || rt.description.as_deref().is_some_and(|d| contains_ci(d, t))
                })
            })
            .map(|rt| rt.value().clone())
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(hits, filter.page, filter.limit))
    }

    pub async fn update_room_type(
        &self,
        id: Ulid,
        name: &str,
        description: Option<String>,
    ) -> Result<RoomType, EngineError> {
        let name = validate_name(name)?;
        validate_description(description.as_deref())?;
        let _catalog = self.catalog_lock.lock().await;
        if !self.room_types.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::RoomType, id));
        }
        if self.room_types.iter().any(|rt| rt.id != id && rt.name == name) {
            return Err(EngineError::AlreadyExists(Entity::RoomType, name));
        }

        let event = Event::RoomTypeUpdated {
            id,
            name,
            description,
            at: now_ms(),
        };
        self.persist_and_apply(None, &event).await?;
        self.get_room_type(id)
    }

    /// Rejected while any room still references the type.
    pub async fn delete_room_type(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        if !self.room_types.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::RoomType, id));
        }
        for rs in self.room_handles() {
            if rs.read().await.room.room_type_id == id {
                return Err(EngineError::InUse(Entity::RoomType, id));
            }
        }
        self.persist_and_apply(None, &Event::RoomTypeDeleted { id }).await?;
        info!("room type {id} deleted");
        Ok(())
    }

    // ── Rooms ───────────────────────────────────────────

    fn room_handles(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// Caller holds the catalog lock.
    async fn room_name_taken(&self, name: &str, except: Option<Ulid>) -> bool {
        for rs in self.room_handles() {
            let guard = rs.read().await;
            if Some(guard.room.id) != except && guard.room.name == name {
                return true;
            }
        }
        false
    }

    pub async fn create_room(&self, spec: RoomSpec) -> Result<Room, EngineError> {
        let spec = validate_spec(spec)?;
        let _catalog = self.catalog_lock.lock().await;
        if self.rooms.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if !self.room_types.contains_key(&spec.room_type_id) {
            return Err(EngineError::NotFound(Entity::RoomType, spec.room_type_id));
        }
        if self.room_name_taken(&spec.name, None).await {
            return Err(EngineError::AlreadyExists(Entity::Room, spec.name));
        }

        let id = Ulid::new();
        let at = now_ms();
        let event = Event::RoomCreated {
            id,
            spec: spec.clone(),
            at,
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, spec, at);
        let room = rs.room.clone();
        self.rooms.insert(id, Arc::new(RwLock::new(rs)));
        info!("room {id} created");
        Ok(room)
    }

    /// Includes the blocked dates and the current rating.
    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let rs = self
            .get_room_state(&id)
            .ok_or(EngineError::NotFound(Entity::Room, id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    /// Newest first.
    pub async fn list_rooms(&self, filter: &RoomFilter) -> Result<Page<Room>, EngineError> {
        let term = search_term(filter.search.as_deref())?;
        let window = match (filter.check_in, filter.check_out) {
            (Some(check_in), Some(check_out)) => Some(validate_stay(check_in, check_out)?),
            (None, None) => None,
            _ => return Err(EngineError::Invalid("checkIn and checkOut go together")),
        };

        let mut hits = Vec::new();
        for rs in self.room_handles() {
            let guard = rs.read().await;
            let room = &guard.room;
            if filter.room_type.is_some_and(|rt| room.room_type_id != rt) {
                continue;
            }
            if let Some(t) = term.as_deref()
                && !(contains_ci(&room.name, t)
                    || room.description.as_deref().is_some_and(|d| contains_ci(d, t)))
            {
                continue;
            }
            if let Some(stay) = &window
                && !is_free(&guard, stay)
            {
                continue;
            }
            hits.push(room.clone());
        }
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(hits, filter.page, filter.limit))
    }

    /// Catalog fields only; blocked dates and rating are untouched.
    pub async fn update_room(&self, id: Ulid, spec: RoomSpec) -> Result<Room, EngineError> {
        let spec = validate_spec(spec)?;
        let _catalog = self.catalog_lock.lock().await;
        if !self.rooms.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Room, id));
        }
        if !self.room_types.contains_key(&spec.room_type_id) {
            return Err(EngineError::NotFound(Entity::RoomType, spec.room_type_id));
        }
        if self.room_name_taken(&spec.name, Some(id)).await {
            return Err(EngineError::AlreadyExists(Entity::Room, spec.name));
        }

        let mut guard = self
            .lock_room(id)
            .await
            .ok_or(EngineError::NotFound(Entity::Room, id))?;
        let event = Event::RoomUpdated {
            id,
            spec,
            at: now_ms(),
        };
        self.persist_and_apply(Some(&mut *guard), &event).await?;
        Ok(guard.room.clone())
    }

    /// Rejected while the room has active bookings. Past bookings keep their
    /// room snapshot.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        let guard = self
            .lock_room(id)
            .await
            .ok_or(EngineError::NotFound(Entity::Room, id))?;
        if !guard.reservations.is_empty() {
            return Err(EngineError::InUse(Entity::Room, id));
        }
        self.wal_append(&Event::RoomDeleted { id }).await?;
        self.rooms.remove(&id);
        forget_reviews(&guard, &self.review_to_room);
        info!("room {id} deleted");
        Ok(())
    }

    pub fn room_total(&self) -> usize {
        self.rooms.len()
    }

    // ── User directory ──────────────────────────────────

    /// Create or replace a profile. Existing bookings keep their snapshot.
    pub async fn save_user(&self, profile: UserProfile) -> Result<UserProfile, EngineError> {
        validate_profile(&profile)?;
        let _catalog = self.catalog_lock.lock().await;
        let event = Event::UserSaved {
            profile: profile.clone(),
        };
        self.persist_and_apply(None, &event).await?;
        Ok(profile)
    }

    pub fn get_user(&self, id: Ulid) -> Result<UserProfile, EngineError> {
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or(EngineError::NotFound(Entity::User, id))
    }

    /// Newest id first.
    pub fn list_users(&self, filter: &UserFilter) -> Result<Page<UserProfile>, EngineError> {
        let term = search_term(filter.search.as_deref())?;
        let exact_id = filter
            .search
            .as_deref()
            .and_then(|s| Ulid::from_string(s.trim()).ok());
        let mut hits: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|u| {
                term.as_deref().is_none_or(|t| {
                    contains_ci(&u.username, t) || contains_ci(&u.email, t) || exact_id == Some(u.id)
                })
            })
            .map(|u| u.value().clone())
            .collect();
        hits.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(paginate(hits, filter.page, filter.limit))
    }

    pub fn user_total(&self) -> usize {
        self.users.len()
    }

    /// Drop a profile. Bookings and reviews keep the snapshot taken when they
    /// were made; the user simply cannot book again until re-saved.
    pub async fn delete_user(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        if !self.users.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::User, id));
        }
        self.persist_and_apply(None, &Event::UserDeleted { id }).await?;
        info!("user {id} deleted");
        Ok(())
    }
}
