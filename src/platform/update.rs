//! Reduces a raw Telegram update to a [`NormalizedMessage`].
//!
//! Works on an untyped `serde_json::Value` rather than a full update schema:
//! the relay only needs three fields, and every other update kind
//! (callback queries, channel posts, member changes, ...) must be
//! acknowledged without failing deserialization.

use serde_json::Value;

use super::{ChatId, MessageId, NormalizedMessage};

/// Why an update produced no message to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Neither `message` nor `edited_message` is present
    NoMessage,
    /// A message object without a usable `chat.id`
    MissingChatId,
}

/// Update fields checked in order; the first non-empty object found wins.
const MESSAGE_FIELDS: [&str; 2] = ["message", "edited_message"];

pub fn normalize(update: &Value) -> Result<NormalizedMessage, Skip> {
    let message = MESSAGE_FIELDS
        .iter()
        .filter_map(|field| update.get(field))
        .find(|v| v.as_object().is_some_and(|m| !m.is_empty()))
        .ok_or(Skip::NoMessage)?;

    let chat_id = message
        .get("chat")
        .and_then(|chat| chat.get("id"))
        .and_then(Value::as_i64)
        .map(ChatId)
        .ok_or(Skip::MissingChatId)?;

    let text = message
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string);

    let message_id = message
        .get("message_id")
        .and_then(Value::as_i64)
        .map(MessageId);

    Ok(NormalizedMessage {
        chat_id,
        text,
        message_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message() {
        let update = json!({
            "update_id": 1,
            "message": {"message_id": 7, "chat": {"id": 42}, "text": "hi"}
        });
        let msg = normalize(&update).unwrap();
        assert_eq!(msg.chat_id, ChatId(42));
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.message_id, Some(MessageId(7)));
    }

    #[test]
    fn test_edited_message() {
        let update = json!({
            "edited_message": {"message_id": 8, "chat": {"id": -100123}, "text": "fixed"}
        });
        let msg = normalize(&update).unwrap();
        assert_eq!(msg.chat_id, ChatId(-100123));
        assert_eq!(msg.text.as_deref(), Some("fixed"));
    }

    #[test]
    fn test_message_preferred_over_edit() {
        let update = json!({
            "message": {"chat": {"id": 1}, "text": "new"},
            "edited_message": {"chat": {"id": 2}, "text": "edit"}
        });
        let msg = normalize(&update).unwrap();
        assert_eq!(msg.chat_id, ChatId(1));
        assert_eq!(msg.text.as_deref(), Some("new"));
    }

    #[test]
    fn test_null_message_falls_through_to_edit() {
        let update = json!({
            "message": null,
            "edited_message": {"chat": {"id": 2}, "text": "edit"}
        });
        assert_eq!(normalize(&update).unwrap().chat_id, ChatId(2));
    }

    #[test]
    fn test_empty_message_falls_through_to_edit() {
        let update = json!({
            "message": {},
            "edited_message": {"chat": {"id": 2}, "text": "edit", "message_id": 4}
        });
        let msg = normalize(&update).unwrap();
        assert_eq!(msg.chat_id, ChatId(2));
        assert_eq!(msg.message_id, Some(MessageId(4)));
        assert_eq!(normalize(&json!({"message": {}})), Err(Skip::NoMessage));
    }

    #[test]
    fn test_other_update_kinds_are_skipped() {
        let update = json!({"update_id": 5, "callback_query": {"id": "x"}});
        assert_eq!(normalize(&update), Err(Skip::NoMessage));
        assert_eq!(normalize(&json!([1, 2])), Err(Skip::NoMessage));
        assert_eq!(normalize(&json!("text")), Err(Skip::NoMessage));
    }

    #[test]
    fn test_missing_chat_id() {
        let update = json!({"message": {"text": "hi"}});
        assert_eq!(normalize(&update), Err(Skip::MissingChatId));

        let update = json!({"message": {"chat": {"id": "not-a-number"}, "text": "hi"}});
        assert_eq!(normalize(&update), Err(Skip::MissingChatId));
    }

    #[test]
    fn test_optional_fields_absent() {
        let update = json!({"message": {"chat": {"id": 3}, "sticker": {}}});
        let msg = normalize(&update).unwrap();
        assert_eq!(msg.text, None);
        assert_eq!(msg.message_id, None);
    }

    #[test]
    fn test_non_string_text_is_treated_as_absent() {
        let update = json!({"message": {"chat": {"id": 3}, "text": 12}});
        assert_eq!(normalize(&update).unwrap().text, None);
    }
}
