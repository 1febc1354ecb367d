use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wire shape stored in the stream's `message` field: `{body, headers}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub body: String,
    pub headers: HashMap<String, String>,
}

/// Wire shape stored as a delay-queue member: `{body, headers, uniqid}`.
///
/// The `uniqid` field guarantees two enqueues of an otherwise-identical
/// `(body, headers, scheduled_at)` produce distinct sorted-set members, so
/// `ZADD NX` never silently drops one of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayedEnvelope {
    pub body: String,
    pub headers: HashMap<String, String>,
    pub uniqid: String,
}

impl DelayedEnvelope {
    pub(crate) fn new(body: String, headers: HashMap<String, String>) -> Self {
        Self {
            body,
            headers,
            uniqid: ulid::Ulid::new().to_string(),
        }
    }
}

/// What `Connection::get` hands back: the reshaped `{id, data}` pair from
/// spec §3 — `data` mirrors the server's nested reply shape so callers that
/// already expect `{streamId: {"message": json}}` need no translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMessage {
    pub id: String,
    pub data: HashMap<String, HashMap<String, String>>,
}

impl GetMessage {
    /// Decode the `message` field as an [`Envelope`], the shape every entry
    /// on the stream carries.
    pub fn envelope(&self) -> Result<Envelope, serde_json::Error> {
        let json = self
            .data
            .get(&self.id)
            .and_then(|fields| fields.get("message"))
            .cloned()
            .unwrap_or_default();
        serde_json::from_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_envelopes_get_distinct_uniqids() {
        let a = DelayedEnvelope::new("x".into(), HashMap::new());
        let b = DelayedEnvelope::new("x".into(), HashMap::new());
        assert_ne!(a.uniqid, b.uniqid);
    }

    #[test]
    fn get_message_decodes_envelope() {
        let mut headers = HashMap::new();
        headers.insert("type".to_string(), "T".to_string());
        let env = Envelope {
            body: "hello".to_string(),
            headers,
        };
        let json = serde_json::to_string(&env).unwrap();

        let mut fields = HashMap::new();
        fields.insert("message".to_string(), json);
        let mut data = HashMap::new();
        data.insert("123-0".to_string(), fields);

        let msg = GetMessage {
            id: "123-0".to_string(),
            data,
        };

        let decoded = msg.envelope().unwrap();
        assert_eq!(decoded, env);
    }
}
