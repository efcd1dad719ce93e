use axum::{
    Extension, Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::users::{
        CredentialResponse, ListUsersQuery, PhotoForm, RegistrationForm, UserListResponse,
        UserView,
    },
    error::AppError,
    routes::{AuthUser, PhotoPart, collect_photo, read_required_photo},
    services::player_service,
    state::SharedState,
};

/// Registration, open to everyone.
pub fn registration_router() -> Router<SharedState> {
    Router::new().route("/users", post(register))
}

/// Directory and profile routes for authenticated players.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(current_user))
        .route("/users/me/photo", put(replace_photo))
}

/// Register a new player and hand out their bearer credential.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body(content = RegistrationForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Player registered", body = CredentialResponse),
        (status = 400, description = "Invalid username or photo"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CredentialResponse>), AppError> {
    let (username, photo) = read_registration(multipart).await?;
    let response =
        player_service::register(&state, username, &photo.content_type, photo.bytes).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Page through registered players.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("Authorization" = String, Header, description = "Bearer credential issued at registration"),
        ("offset" = Option<u64>, Query, description = "How many players to skip"),
        ("limit" = Option<u64>, Query, description = "Page size, at most 100")
    ),
    responses((status = 200, description = "One page of players", body = UserListResponse))
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ListUsersQuery>>,
) -> Result<Json<UserListResponse>, AppError> {
    Ok(Json(
        player_service::list_players(&state, query.offset, query.limit).await?,
    ))
}

/// The calling player's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    params(("Authorization" = String, Header, description = "Bearer credential issued at registration")),
    responses((status = 200, description = "The calling player", body = UserView))
)]
pub async fn current_user(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<UserView>, AppError> {
    Ok(Json(player_service::build_view(&state, user)?))
}

/// Replace the calling player's reference portrait.
#[utoipa::path(
    put,
    path = "/users/me/photo",
    tag = "users",
    params(("Authorization" = String, Header, description = "Bearer credential issued at registration")),
    request_body(content = PhotoForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Portrait replaced", body = UserView),
        (status = 400, description = "Unsupported or empty photo")
    )
)]
pub async fn replace_photo(
    State(state): State<SharedState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<UserView>, AppError> {
    let photo = read_required_photo(multipart).await?;
    Ok(Json(
        player_service::replace_photo(&state, user, &photo.content_type, photo.bytes).await?,
    ))
}

async fn read_registration(mut multipart: Multipart) -> Result<(String, PhotoPart), AppError> {
    let mut username = None;
    let mut photo = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("username") => username = Some(field.text().await?),
            Some("photo") => photo = Some(collect_photo(field).await?),
            _ => {}
        }
    }

    let username =
        username.ok_or_else(|| AppError::BadRequest("missing `username` part".into()))?;
    let photo = photo.ok_or_else(|| AppError::BadRequest("missing `photo` part".into()))?;
    Ok((username, photo))
}
