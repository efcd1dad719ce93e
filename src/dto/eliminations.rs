//! DTO definitions for elimination claims.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::sessions::TargetView;

/// Multipart payload submitted with an elimination claim.
///
/// The handler reads the parts manually; this type only feeds the OpenAPI
/// document.
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct EliminationForm {
    /// Photo of the claimed victim, compared against their reference portrait.
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
}

/// How a confirmed elimination resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EliminationOutcomeDto {
    /// The hunt goes on with an inherited target.
    Continue,
    /// Only the eliminator remains and the session has ended.
    Winner,
}

/// Response to a confirmed elimination claim.
#[derive(Debug, Serialize, ToSchema)]
pub struct EliminationResponse {
    pub outcome: EliminationOutcomeDto,
    /// Next assignment, present when the hunt continues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_target: Option<TargetView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&EliminationOutcomeDto::Continue).unwrap(),
            r#""continue""#
        );
        assert_eq!(
            serde_json::to_string(&EliminationOutcomeDto::Winner).unwrap(),
            r#""winner""#
        );
    }

    #[test]
    fn winner_response_omits_target() {
        let response = EliminationResponse {
            outcome: EliminationOutcomeDto::Winner,
            next_target: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "winner"}));
    }
}
