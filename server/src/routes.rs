// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::clock::Clock;
use crate::database::Store;
use crate::handlers;
use axum::{
    Router,
    routing::{get, patch, put},
};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub clock: Arc<dyn Clock>,
}

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/trackers",
            get(handlers::list_trackers).post(handlers::create_tracker),
        )
        .route("/api/trackers/sections", get(handlers::list_tracker_sections))
        .route(
            "/api/trackers/{id}",
            put(handlers::update_tracker).delete(handlers::delete_tracker),
        )
        .route("/api/trackers/{id}/pin", patch(handlers::pin_tracker))
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/api/categories/{id}",
            put(handlers::rename_category).delete(handlers::delete_category),
        )
        .route(
            "/api/records",
            get(handlers::list_records)
                .post(handlers::add_record)
                .delete(handlers::remove_record),
        )
        .route("/api/statistics", get(handlers::statistics))
        .route("/api/events", get(handlers::stream_events))
        // Adds the store and clock to the application state
        .with_state(state)
}
