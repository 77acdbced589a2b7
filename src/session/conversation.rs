//! Conversation store.
//!
//! An append-only, ordered list of chat turns. Assistant turns start as a
//! loading placeholder and are completed in place once the backend answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{ConversationTurn, Record};

/// Content shown on an assistant turn whose query failed.
pub const FAILED_QUERY_CONTENT: &str = "Failed to analyze query";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Monotonic message identifier, unique within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Query the backend generated for this turn
    pub sql: Option<String>,
    /// Result rows
    pub data: Option<Vec<Record>>,
    pub error: Option<String>,
    pub is_loading: bool,
}

impl Message {
    fn new(id: MessageId, role: Role, content: String, is_loading: bool) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: Utc::now(),
            sql: None,
            data: None,
            error: None,
            is_loading,
        }
    }

    /// Rows to display, when the turn completed without error.
    pub fn rows(&self) -> Option<&[Record]> {
        if self.is_loading || self.error.is_some() {
            return None;
        }
        self.data.as_deref().filter(|rows| !rows.is_empty())
    }

    fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            role: self.role.as_str().to_string(),
            content: self.content.clone(),
            sql_query: self.sql.clone(),
            data: self.data.clone(),
        }
    }
}

/// A completed assistant answer, normalized for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub sql: Option<String>,
    pub data: Vec<Record>,
}

/// Ordered sequence of messages.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId(self.next_id)
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::new(id, Role::User, content.into(), false));
        id
    }

    /// Append an assistant placeholder that is still loading.
    pub fn push_placeholder(&mut self) -> MessageId {
        let id = self.allocate_id();
        self.messages.push(Message::new(id, Role::Assistant, String::new(), true));
        id
    }

    /// Complete a pending assistant turn with the backend's answer.
    ///
    /// Returns false if no message has this id.
    pub fn resolve(&mut self, id: MessageId, reply: AssistantReply) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        message.is_loading = false;
        message.content = reply.content;
        message.sql = reply.sql;
        message.data = Some(reply.data);
        message.error = None;
        true
    }

    /// Mark a pending assistant turn as failed.
    pub fn fail(&mut self, id: MessageId, error: impl Into<String>) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        message.is_loading = false;
        message.content = FAILED_QUERY_CONTENT.to_string();
        message.error = Some(error.into());
        message.data = None;
        true
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether any assistant turn is still waiting for the backend.
    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.is_loading)
    }

    /// Most recent message carrying displayable rows.
    pub fn latest_rows(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.rows().is_some())
    }

    /// Serialize the conversation for `/finalize`.
    pub fn to_turns(&self) -> Vec<ConversationTurn> {
        self.messages.iter().map(Message::to_turn).collect()
    }

    /// Drop every message. Ids keep increasing across resets.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(player: &str, runs: i64) -> Record {
        let mut r = Record::new();
        r.insert("player".to_string(), json!(player));
        r.insert("runs".to_string(), json!(runs));
        r
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut conversation = Conversation::new();
        let a = conversation.push_user("first");
        let b = conversation.push_placeholder();
        conversation.clear();
        let c = conversation.push_user("again");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_placeholder_lifecycle() {
        let mut conversation = Conversation::new();
        conversation.push_user("Top run scorers in 2011");
        let id = conversation.push_placeholder();

        assert!(conversation.has_pending());
        assert!(conversation.get(id).unwrap().rows().is_none());

        let reply = AssistantReply {
            content: "Found 1 results".to_string(),
            sql: Some("SELECT 1".to_string()),
            data: vec![row("Tendulkar", 482)],
        };
        assert!(conversation.resolve(id, reply));

        let message = conversation.get(id).unwrap();
        assert!(!message.is_loading);
        assert!(message.error.is_none());
        assert_eq!(message.rows().unwrap().len(), 1);
        assert!(!conversation.has_pending());
    }

    #[test]
    fn test_fail_sets_error_not_data() {
        let mut conversation = Conversation::new();
        let id = conversation.push_placeholder();
        conversation.fail(id, "Analysis failed");

        let message = conversation.get(id).unwrap();
        assert_eq!(message.content, FAILED_QUERY_CONTENT);
        assert_eq!(message.error.as_deref(), Some("Analysis failed"));
        assert!(message.data.is_none());
        assert!(!message.is_loading);
    }

    #[test]
    fn test_resolve_unknown_id() {
        let mut conversation = Conversation::new();
        let id = conversation.push_user("hi");
        conversation.clear();
        assert!(!conversation.resolve(id, AssistantReply::default()));
    }

    #[test]
    fn test_turns_serialize_nulls() {
        let mut conversation = Conversation::new();
        conversation.push_user("Who hit the most sixes?");
        let turns = conversation.to_turns();

        let value = serde_json::to_value(&turns).unwrap();
        assert_eq!(
            value,
            json!([{
                "role": "user",
                "content": "Who hit the most sixes?",
                "sql_query": null,
                "data": null
            }])
        );
    }

    #[test]
    fn test_latest_rows_skips_failed_turns() {
        let mut conversation = Conversation::new();
        let ok = conversation.push_placeholder();
        conversation.resolve(
            ok,
            AssistantReply { content: "ok".into(), sql: None, data: vec![row("Kohli", 100)] },
        );
        let failed = conversation.push_placeholder();
        conversation.fail(failed, "boom");

        assert_eq!(conversation.latest_rows().map(|m| m.id), Some(ok));
    }
}
