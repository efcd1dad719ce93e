use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderName, header},
    routing::get,
};
use serde::Deserialize;

use crate::{error::AppError, services::media, state::SharedState};

/// Access token travelling alongside a photo request.
#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    token: String,
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/photos/{reference}", get(serve_photo))
}

/// Serve a stored photo. The URL including its token is minted by the
/// service and expires on its own; there is no way to list references.
#[utoipa::path(
    get,
    path = "/photos/{reference}",
    tag = "photos",
    params(
        ("reference" = String, Path, description = "Opaque photo reference"),
        ("token" = String, Query, description = "Expiring access token minted with the URL")
    ),
    responses(
        (status = 200, description = "Photo bytes", content_type = "image/jpeg", body = Vec<u8>),
        (status = 401, description = "Token invalid or expired"),
        (status = 403, description = "Token was minted for another photo"),
        (status = 404, description = "No photo under this reference")
    )
)]
pub async fn serve_photo(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
    Query(query): Query<PhotoQuery>,
) -> Result<([(HeaderName, String); 1], Vec<u8>), AppError> {
    let blob = media::read_photo(&state, &reference, &query.token).await?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}
