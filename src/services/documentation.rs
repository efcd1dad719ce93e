use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Gotcha backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::users::register,
        crate::routes::users::list_users,
        crate::routes::users::current_user,
        crate::routes::users::replace_photo,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::update_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::leave_session,
        crate::routes::eliminations::claim_elimination,
        crate::routes::photos::serve_photo,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::users::RegistrationForm,
            crate::dto::users::PhotoForm,
            crate::dto::users::UserView,
            crate::dto::users::CredentialResponse,
            crate::dto::users::UserListResponse,
            crate::dto::sessions::SessionCodeResponse,
            crate::dto::sessions::SessionStatusDto,
            crate::dto::sessions::PlayerView,
            crate::dto::sessions::TargetView,
            crate::dto::sessions::EliminationView,
            crate::dto::sessions::SessionView,
            crate::dto::sessions::UpdateSessionRequest,
            crate::dto::sessions::LeaveRequest,
            crate::dto::eliminations::EliminationForm,
            crate::dto::eliminations::EliminationOutcomeDto,
            crate::dto::eliminations::EliminationResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Registration, player directory and photos of record"),
        (name = "sessions", description = "Session lifecycle and lobby management"),
        (name = "eliminations", description = "Target elimination claims"),
        (name = "photos", description = "Token-gated photo delivery"),
    )
)]
pub struct ApiDoc;
