use std::{fmt, ops::Deref};

use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;

/// Identifier of a timeline entry.
///
/// Stable for the lifetime of one timeline instance only, never reused across instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for UniqueId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UniqueId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UniqueId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The identity of an event-kind timeline entry: either confirmed by the server,
/// or still a local echo known only by its transaction ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventOrTransactionId {
    EventId(String),
    TransactionId(String),
}

impl EventOrTransactionId {
    /// Whether this identity is a local echo that the server hasn't confirmed yet.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::TransactionId(_))
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::EventId(id) => Some(id),
            Self::TransactionId(_) => None,
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::EventId(_) => None,
            Self::TransactionId(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EventId(id) | Self::TransactionId(id) => id,
        }
    }
}

impl fmt::Display for EventOrTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventId(id) => write!(f, "event {id}"),
            Self::TransactionId(id) => write!(f, "transaction {id}"),
        }
    }
}

impl Serialize for EventOrTransactionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("EventOrTransactionId", 2)?;
        state.serialize_field("timelineItemId", self.as_str())?;
        state.serialize_field("isLocal", &self.is_local())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for EventOrTransactionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Inspect the raw structure first, the variant is chosen by `isLocal`.
        let value = Value::deserialize(deserializer)?;

        let id = value
            .get("timelineItemId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| serde::de::Error::missing_field("timelineItemId"))?;

        let is_local = value
            .get("isLocal")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| serde::de::Error::missing_field("isLocal"))?;

        if id.is_empty() {
            return Err(serde::de::Error::custom("timelineItemId must not be empty"));
        }

        if is_local {
            Ok(Self::TransactionId(id.to_owned()))
        } else {
            Ok(Self::EventId(id.to_owned()))
        }
    }
}
