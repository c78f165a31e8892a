//! Route definitions for ad-scoped resources.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{mixer, version};
use crate::state::AppState;

/// Routes mounted at `/ads`.
///
/// ```text
/// GET    /{ad_id}/{stream}/versions                  list
/// POST   /{ad_id}/{stream}/versions                  create
/// GET    /{ad_id}/{stream}/versions/{id}             get_by_id
/// PATCH  /{ad_id}/{stream}/versions/{id}             update
/// DELETE /{ad_id}/{stream}/versions/{id}             delete
/// POST   /{ad_id}/{stream}/versions/{id}/activate    activate
/// POST   /{ad_id}/{stream}/versions/{id}/clone       clone
/// GET    /{ad_id}/{stream}/active                    get_active
///
/// GET    /{ad_id}/mixer                              get_state
/// POST   /{ad_id}/mixer/rebuild                      rebuild
/// POST   /{ad_id}/mixer/durations                    report_durations
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{ad_id}/mixer", get(mixer::get_state))
        .route("/{ad_id}/mixer/rebuild", post(mixer::rebuild))
        .route("/{ad_id}/mixer/durations", post(mixer::report_durations))
        .route(
            "/{ad_id}/{stream}/versions",
            get(version::list).post(version::create),
        )
        .route(
            "/{ad_id}/{stream}/versions/{id}",
            get(version::get_by_id)
                .patch(version::update)
                .delete(version::delete),
        )
        .route("/{ad_id}/{stream}/versions/{id}/activate", post(version::activate))
        .route("/{ad_id}/{stream}/versions/{id}/clone", post(version::clone))
        .route("/{ad_id}/{stream}/active", get(version::get_active))
}
