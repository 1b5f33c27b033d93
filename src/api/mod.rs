//! Application routes.

pub mod users;

use axum::{routing::get, Router};

use crate::store::Resources;

/// Router for the application endpoints, before the request pipeline.
pub fn routes(resources: Resources) -> Router {
    Router::new()
        .route("/users", get(users::get_user))
        .with_state(resources)
}
