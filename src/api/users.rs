//! `GET /users`: cache-first lookup of the default user.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;
use crate::store::{Resources, StoreError, UserRow};

pub const DEFAULT_USER_ID: &str = "1";
pub const USER_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub code: u32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UserRow>,
}

pub fn user_key(id: &str) -> String {
    format!("user:{id}")
}

pub async fn get_user(State(resources): State<Resources>) -> Result<Json<UserResponse>, ApiError> {
    let user = lookup(&resources, DEFAULT_USER_ID).await?;
    Ok(Json(UserResponse {
        code: 0,
        msg: "ok".to_string(),
        data: user,
    }))
}

/// Cache first, then the row store, back-filling the cache on a hit.
/// Cache failures only degrade to the row store.
pub async fn lookup(resources: &Resources, id: &str) -> Result<Option<UserRow>, StoreError> {
    let key = user_key(id);

    match resources.cache.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str::<UserRow>(&raw) {
            Ok(user) => return Ok(Some(user)),
            Err(err) => tracing::warn!(key = %key, error = %err, "Discarding malformed cache entry"),
        },
        Ok(None) => {}
        Err(err) => tracing::warn!(key = %key, error = %err, "Cache read failed, using row store"),
    }

    let row = resources.rows.get_user(id).await?;
    if let Some(user) = &row {
        match serde_json::to_string(user) {
            Ok(raw) => {
                if let Err(err) = resources.cache.set(&key, &raw, Some(USER_CACHE_TTL)).await {
                    tracing::warn!(key = %key, error = %err, "Cache back-fill failed");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Failed to encode user for cache"),
        }
    }
    Ok(row)
}
