use axum::{
    Router,
    body::Body,
    extract::{
        State,
        multipart::{Field, Multipart},
    },
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::{
    dao::models::UserRecord,
    error::{AppError, ServiceError},
    state::SharedState,
};

pub mod docs;
pub mod eliminations;
pub mod health;
pub mod photos;
pub mod sessions;
pub mod users;

/// The authenticated caller, resolved once by the credential middleware and
/// handed to handlers through request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let open_router = health::router()
        .merge(photos::router())
        .merge(users::registration_router());

    let player_router = users::router()
        .merge(sessions::router())
        .merge(eliminations::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let docs_router = docs::router(state.clone());

    open_router
        .merge(player_router)
        .merge(docs_router)
        .with_state(state)
}

/// Resolve the bearer credential to a live user before the handler runs.
///
/// Credentials whose subject no longer exists are rejected the same way as
/// unparseable ones.
async fn require_user(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let credential = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.to_owned())
        .ok_or_else(|| AppError::Unauthorized("missing bearer credential".into()))?;

    let user_id = state
        .identity()
        .authenticate(&credential)
        .map_err(|err| AppError::Unauthorized(err.to_string()))?;

    let store = state.require_game_store().await?;
    let user = store
        .find_user(user_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::Unauthorized("credential subject no longer exists".into()))?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

/// An uploaded photo part: its media type and raw bytes.
pub(crate) struct PhotoPart {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoPart {
    fn empty() -> Self {
        Self {
            content_type: String::new(),
            bytes: Vec::new(),
        }
    }
}

async fn collect_photo(field: Field<'_>) -> Result<PhotoPart, AppError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    let bytes = field.bytes().await?.to_vec();
    Ok(PhotoPart {
        content_type,
        bytes,
    })
}

/// Pull the mandatory `photo` part out of a multipart body.
pub(crate) async fn read_required_photo(mut multipart: Multipart) -> Result<PhotoPart, AppError> {
    let mut photo = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("photo") {
            photo = Some(collect_photo(field).await?);
        }
    }
    photo.ok_or_else(|| AppError::BadRequest("missing `photo` part".into()))
}

/// Pull the `photo` part out of a multipart body, tolerating its absence.
///
/// Claims do not need a proof photo while verification is switched off; the
/// service rejects empty proofs itself whenever verification is on.
pub(crate) async fn read_optional_photo(mut multipart: Multipart) -> Result<PhotoPart, AppError> {
    let mut photo = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("photo") {
            photo = Some(collect_photo(field).await?);
        }
    }
    Ok(photo.unwrap_or_else(PhotoPart::empty))
}
