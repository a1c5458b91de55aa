use axum::{
    routing::{get, post},
    Router,
};

pub mod events;
pub mod grants;
pub mod reservations;
pub mod system;
pub mod tasks;
pub mod users;

/// Router for the versioned engine endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/events", post(events::trigger_event))
        .route("/reservations", get(reservations::list_reservations))
        .nest("/grants", grants::router())
        .nest("/tasks", tasks::router())
        .nest("/users", users::router())
}
