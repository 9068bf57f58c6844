//! services/api/src/web/middleware.rs
//!
//! Resolves the caller's identity for every route.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use tracing::debug;
use uuid::Uuid;

use crate::profile::Identity;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Reads the optional `x-user-id` header and inserts an [`Identity`] into the
/// request extensions. A missing header means a guest; a malformed one is rejected.
pub async fn resolve_identity(
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let identity = match req.headers().get(USER_ID_HEADER) {
        None => Identity::Guest,
        Some(value) => {
            let user_id = value
                .to_str()
                .ok()
                .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
                .ok_or_else(|| {
                    (
                        StatusCode::BAD_REQUEST,
                        "Invalid x-user-id format".to_string(),
                    )
                })?;
            Identity::User(user_id)
        }
    };

    debug!("Resolved request identity: {:?}", identity);
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
