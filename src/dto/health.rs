use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the game store is connected and answering.
    pub database: bool,
    /// Whether the photo store is connected and answering.
    pub photos: bool,
}

impl HealthResponse {
    /// Build a response from the two backend probes; overall status is "ok"
    /// only when both answer.
    pub fn from_probes(database: bool, photos: bool) -> Self {
        let status = if database && photos { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            database,
            photos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tracks_both_probes() {
        assert_eq!(HealthResponse::from_probes(true, true).status, "ok");
        assert_eq!(HealthResponse::from_probes(false, true).status, "degraded");
        assert_eq!(HealthResponse::from_probes(true, false).status, "degraded");
    }
}
