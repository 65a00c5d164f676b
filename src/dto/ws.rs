use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, VecSkipError, serde_as};

/// Frame sent to the server to keep the realtime connection alive.
pub const HEARTBEAT_PAYLOAD: &str = "ping";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
/// Messages pushed by the planning realtime endpoint, discriminated by `type`.
///
/// Malformed optional fields decode to `None`/empty instead of rejecting the frame so the
/// reducer can decide what to ignore.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A participant connected to the session.
    Joined {
        #[serde(alias = "participant_id")]
        user_id: String,
        #[serde(default)]
        username: Option<String>,
    },
    /// A participant disconnected.
    Left {
        #[serde(alias = "participant_id")]
        user_id: String,
    },
    /// Someone voted; only the running count is disclosed.
    VoteSubmitted {
        #[serde(default, deserialize_with = "lenient_count")]
        vote_count: Option<u64>,
    },
    /// Votes and statistics disclosed by a reveal.
    VotesRevealed {
        #[serde_as(as = "DefaultOnError<VecSkipError<_>>")]
        #[serde(default)]
        votes: Vec<RevealedVote>,
        #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
        #[serde(default)]
        average: Option<f64>,
        #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
        #[serde(default)]
        median: Option<f64>,
    },
    /// A final estimate was recorded and the session closed.
    SessionCompleted {
        #[serde_as(as = "DefaultOnError")]
        #[serde(default)]
        final_estimate: Option<String>,
    },
    /// The session was announced.
    SessionCreated {
        #[serde_as(as = "DefaultOnError")]
        #[serde(default)]
        scale: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl SessionEvent {
    /// Decode a text frame. Anything that is not a JSON object with a `type` yields `None`.
    pub fn from_json_str(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Wire name of the event, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::Left { .. } => "left",
            Self::VoteSubmitted { .. } => "vote_submitted",
            Self::VotesRevealed { .. } => "votes_revealed",
            Self::SessionCompleted { .. } => "session_completed",
            Self::SessionCreated { .. } => "session_created",
            Self::Unknown => "unknown",
        }
    }
}

/// What the realtime channel hands to its subscriber: lifecycle signals and decoded frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// Handshake completed.
    Opened,
    /// One decoded inbound frame.
    Event(SessionEvent),
    /// Transport ended; no further signal follows.
    Closed,
}

/// One disclosed vote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RevealedVote {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Numbers and booleans are kept in their JSON rendering.
    #[serde(deserialize_with = "lenient_text")]
    pub value: String,
}

impl RevealedVote {
    /// Username, or `User <last six chars of id>` when the backend omitted it.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.username.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        let id = self.user_id.as_deref().unwrap_or_default();
        let start = id
            .char_indices()
            .rev()
            .nth(5)
            .map(|(index, _)| index)
            .unwrap_or(0);
        format!("User {}", &id[start..])
    }
}

/// Any JSON number with a non-negative integral value; everything else is `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Number(number) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|count| count.is_finite() && *count >= 0.0 && count.fract() == 0.0)
            .filter(|count| *count <= u64::MAX as f64)
            .map(|count| count as u64)
    }))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
