use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    routing::post,
};

use crate::{
    dto::eliminations::{EliminationForm, EliminationResponse},
    error::AppError,
    routes::{AuthUser, read_optional_photo},
    services::elimination_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/sessions/{code}/eliminations", post(claim_elimination))
}

/// Claim the elimination of the caller's current target.
///
/// The proof photo travels as the multipart `photo` part. It may be omitted
/// when the deployment waives photo verification.
#[utoipa::path(
    post,
    path = "/sessions/{code}/eliminations",
    tag = "eliminations",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("code" = String, Path, description = "Join code of the session")
    ),
    request_body(content = EliminationForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Claim accepted", body = EliminationResponse),
        (status = 403, description = "Caller has no target left"),
        (status = 409, description = "Session is not in progress"),
        (status = 422, description = "Proof photo does not show the target")
    )
)]
pub async fn claim_elimination(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
    multipart: Multipart,
) -> Result<Json<EliminationResponse>, AppError> {
    let photo = read_optional_photo(multipart).await?;
    let response =
        elimination_service::claim(&state, &user, &code, &photo.content_type, photo.bytes).await?;
    Ok(Json(response))
}
