use {
    super::error::PipelineError,
    derive_more::{Deref, Display},
    serde::{Deserialize, Serialize},
};

const MAX_EVENT_ID_LEN: usize = 255;

/// Provider delivery identifier, the deduplication key for webhooks.
///
/// Providers shape these differently (`evt_…` from the mock gateway,
/// `payment.succeeded:<id>` for YooKassa, `<TransactionId>:<status>` for
/// CloudPayments), so only emptiness, length and control characters are
/// checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Deref, Serialize, Deserialize)]
#[deref(forward)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PipelineError::Validation("EventId must not be empty".into()));
        }
        if id.len() > MAX_EVENT_ID_LEN {
            return Err(PipelineError::Validation(format!(
                "EventId longer than {MAX_EVENT_ID_LEN} bytes"
            )));
        }
        if id.chars().any(char::is_control) {
            return Err(PipelineError::Validation(
                "EventId contains control characters".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for EventId {
    type Error = PipelineError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}
