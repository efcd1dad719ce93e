use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::sessions::{LeaveRequest, SessionCodeResponse, SessionView, UpdateSessionRequest},
    error::AppError,
    routes::AuthUser,
    services::session_service,
    state::SharedState,
};

/// Session lifecycle and lobby routes. All of them require a credential.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session).patch(update_session))
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/leave", post(leave_session))
}

/// Open a new session and return its join code.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Bearer credential issued at registration")),
    responses(
        (status = 201, description = "Session created", body = SessionCodeResponse),
        (status = 409, description = "No free join code found")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<(StatusCode, Json<SessionCodeResponse>), AppError> {
    let response = session_service::create_session(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Full session view for the owner or a joined player.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("code" = String, Path, description = "Join code of the session")
    ),
    responses(
        (status = 200, description = "Session details", body = SessionView),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "No session under this code")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::session_view(&state, &user, &code).await?))
}

/// Join an open lobby.
#[utoipa::path(
    post,
    path = "/sessions/{code}/join",
    tag = "sessions",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("code" = String, Path, description = "Join code of the session")
    ),
    responses(
        (status = 200, description = "Joined", body = SessionView),
        (status = 409, description = "Game already started or player already joined")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(session_service::join(&state, &user, &code).await?))
}

/// Leave an open lobby, or as the owner remove a named player from it.
#[utoipa::path(
    post,
    path = "/sessions/{code}/leave",
    tag = "sessions",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("code" = String, Path, description = "Join code of the session")
    ),
    request_body = LeaveRequest,
    responses(
        (status = 204, description = "Removed from the roster"),
        (status = 400, description = "Owner did not name a player"),
        (status = 403, description = "Tried to remove someone else"),
        (status = 404, description = "Named player is not in the lobby")
    )
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(request): Json<LeaveRequest>,
) -> Result<StatusCode, AppError> {
    session_service::leave(&state, &user, &code, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move the session forward: start the hunt or finish it. Owner only.
#[utoipa::path(
    patch,
    path = "/sessions/{code}",
    tag = "sessions",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("code" = String, Path, description = "Join code of the session")
    ),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session updated", body = SessionView),
        (status = 403, description = "Caller is not the owner"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
pub async fn update_session(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        session_service::update_status(&state, &user, &code, request).await?,
    ))
}
