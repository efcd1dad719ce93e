/// OpenAPI documentation generation.
pub mod documentation;
/// Elimination claims and ring rewiring.
pub mod elimination_service;
/// Health check service.
pub mod health_service;
/// Photo intake, serving and URL minting.
pub mod media;
/// Registration and the player directory.
pub mod player_service;
/// Session creation, membership and lifecycle.
pub mod session_service;
/// Storage backend supervision and degraded mode handling.
pub mod storage_supervisor;
