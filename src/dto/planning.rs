use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};
use time::OffsetDateTime;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        deserialize_timestamp, scale::EstimationScale, validation::validate_not_blank,
        ws::RevealedVote,
    },
    state::auth::TokenClaims,
};

/// Lifecycle status reported by the backend for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Voting,
    Revealed,
    Completed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Session state as returned by `GET /planning/sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub scale: EstimationScale,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub votes_revealed: bool,
}

impl SessionSnapshot {
    /// Whether the session still accepts votes.
    pub fn is_voting(&self) -> bool {
        self.status == SessionStatus::Voting
    }

    /// Whether the signed-in user may trigger a reveal or record the estimate.
    ///
    /// Only drives button enablement; the backend enforces the rule.
    pub fn can_reveal(&self, claims: Option<&TokenClaims>) -> bool {
        let Some(claims) = claims else {
            return false;
        };
        let is_creator = claims
            .id
            .as_deref()
            .is_some_and(|user_id| self.created_by.as_deref() == Some(user_id));
        is_creator || claims.is_facilitator()
    }
}

/// Payload for `POST /planning/sessions`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1))]
    pub story_id: String,
    pub scale: EstimationScale,
}

/// Payload for `POST /planning/sessions/{id}/vote`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct VoteRequest {
    #[validate(length(min = 1))]
    pub value: String,
}

/// Payload for `PUT /planning/sessions/{id}/estimate`.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateRequest {
    pub final_estimate: String,
}

impl EstimateRequest {
    /// Build a request from user input, trimming surrounding whitespace.
    pub fn new(final_estimate: &str) -> Self {
        Self {
            final_estimate: final_estimate.trim().to_string(),
        }
    }
}

impl Validate for EstimateRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_not_blank(&self.final_estimate) {
            errors.add("final_estimate", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Vote echoed back by the backend after submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoteResponse {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub value: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<OffsetDateTime>,
}

/// Result of `POST /planning/sessions/{id}/reveal`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevealResponse {
    pub session_id: String,
    #[serde(default)]
    pub votes: Vec<RevealedVote>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    pub average: Option<f64>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    pub median: Option<f64>,
}

/// Result of `PUT /planning/sessions/{id}/estimate`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EstimateResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub final_estimate: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot(created_by: &str) -> SessionSnapshot {
        serde_json::from_value(json!({
            "id": "S1",
            "story_id": "st1",
            "created_by": created_by,
            "status": "voting",
            "scale": "t_shirt",
            "created_at": "2024-05-01T10:00:00.123456",
            "vote_count": 2,
            "votes_revealed": false
        }))
        .unwrap()
    }

    #[test]
    fn decodes_backend_snapshot() {
        let session = snapshot("u1");
        assert!(session.is_voting());
        assert_eq!(session.scale, EstimationScale::TShirt);
        assert_eq!(session.vote_count, 2);
        assert_eq!(
            session.created_at.map(|ts| ts.unix_timestamp()),
            Some(1_714_557_600)
        );
    }

    #[test]
    fn unknown_status_and_missing_fields_use_defaults() {
        let session: SessionSnapshot =
            serde_json::from_value(json!({"id": "S2", "status": "archived"})).unwrap();
        assert_eq!(session.status, SessionStatus::Unknown);
        assert_eq!(session.scale, EstimationScale::Fibonacci);
        assert_eq!(session.created_at, None);
    }

    #[test]
    fn creator_or_facilitator_can_reveal() {
        let session = snapshot("u1");
        let creator = TokenClaims {
            id: Some("u1".into()),
            role: Some("developer".into()),
            ..TokenClaims::default()
        };
        let facilitator = TokenClaims {
            id: Some("u2".into()),
            role: Some("product_owner".into()),
            ..TokenClaims::default()
        };
        let developer = TokenClaims {
            id: Some("u3".into()),
            role: Some("developer".into()),
            ..TokenClaims::default()
        };
        let anonymous_facilitator = TokenClaims {
            id: None,
            role: Some("scrum_master".into()),
            ..TokenClaims::default()
        };

        assert!(session.can_reveal(Some(&creator)));
        assert!(session.can_reveal(Some(&facilitator)));
        assert!(!session.can_reveal(Some(&developer)));
        assert!(session.can_reveal(Some(&anonymous_facilitator)));
        assert!(!session.can_reveal(None));
    }

    #[test]
    fn estimate_request_is_trimmed_and_validated() {
        let request = EstimateRequest::new("  8 ");
        assert_eq!(request.final_estimate, "8");
        assert!(request.validate().is_ok());
        assert!(EstimateRequest::new("   ").validate().is_err());
    }

    #[test]
    fn reveal_response_reads_string_median() {
        let response: RevealResponse = serde_json::from_value(json!({
            "session_id": "S1",
            "votes": [{"id": "v1", "user_id": "u1", "value": "3"}],
            "average": 3.0,
            "median": "3.0"
        }))
        .unwrap();
        assert_eq!(response.median, Some(3.0));
        assert_eq!(response.votes[0].value, "3");
    }
}
