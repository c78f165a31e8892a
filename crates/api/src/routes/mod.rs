pub mod ads;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ads/{ad_id}/{stream}/versions                   list, create draft
/// /ads/{ad_id}/{stream}/versions/{id}              get, update draft, delete
/// /ads/{ad_id}/{stream}/versions/{id}/activate     freeze/activate + rebuild (POST)
/// /ads/{ad_id}/{stream}/versions/{id}/clone        clone into draft (POST)
/// /ads/{ad_id}/{stream}/active                     active version or null
///
/// /ads/{ad_id}/mixer                               mixer state
/// /ads/{ad_id}/mixer/rebuild                       rebuild (POST)
/// /ads/{ad_id}/mixer/durations                     report measured durations (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/ads", ads::router())
}
