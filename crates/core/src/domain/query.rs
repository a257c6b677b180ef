use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Immutable ingress record for one user request. Created once at the edge
/// and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub session_id: SessionId,
    pub received_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            text: text.into().trim().to_string(),
            session_id,
            received_at: Utc::now(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Query, SessionId};

    #[test]
    fn query_trims_surrounding_whitespace() {
        let query = Query::new("  which routes are delayed?  ", SessionId::from("s-1"));
        assert_eq!(query.text, "which routes are delayed?");
        assert_eq!(query.session_id.as_str(), "s-1");
    }

    #[test]
    fn whitespace_only_text_is_blank() {
        let query = Query::new("   \t ", SessionId::from("s-2"));
        assert!(query.is_blank());
    }
}
