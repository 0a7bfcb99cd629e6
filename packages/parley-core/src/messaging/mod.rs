//! # Messaging Module
//!
//! Direct messages between two users, stored through a
//! [`MessageRepository`] with only their bodies encrypted.
//!
//! ## Message Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           MESSAGE FLOW                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SEND                                                                  │
//! │  ────                                                                   │
//! │  conversation_id(sender, receiver)                                     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  codec.encrypt_message(text) ──None──► Error::SendFailed (not stored)  │
//! │        │ Some(payload)                                                 │
//! │        ▼                                                                │
//! │  MessageRecord { ids, timestamp, encryptedContent, iv, ... }           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  repository.save_message                                               │
//! │                                                                         │
//! │  LOAD                                                                  │
//! │  ────                                                                   │
//! │  repository.list_messages(conversation_id)                             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  codec.decrypt_message per record (placeholder on failure)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Plaintext bodies are never written to the repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::MessageCodec;
use crate::error::{Error, Result};

/// Separator between the two participant ids of a conversation id
pub const CONVERSATION_ID_SEPARATOR: &str = "_";

/// Deterministic conversation id for two participants
///
/// The ids are sorted before joining, so both sides compute the same value
/// whoever starts the conversation.
pub fn conversation_id(user_a: &str, user_b: &str) -> Result<String> {
    if user_a.is_empty() || user_b.is_empty() {
        return Err(Error::InvalidConversationId(
            "participant ids must not be empty".into(),
        ));
    }

    let (first, second) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };

    Ok(format!("{}{}{}", first, CONVERSATION_ID_SEPARATOR, second))
}

/// Kind of message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Text typed by the sender
    Text,
    /// Link to an uploaded image; the link itself is the encrypted body
    Image,
}

/// Sender details copied onto each message for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// User id
    pub id: String,
    /// Name shown next to the message
    pub display_name: String,
    /// Avatar image URL
    pub avatar_url: Option<String>,
}

impl Participant {
    /// Participant with no avatar
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }
}

/// A stored message document
///
/// Everything except `encrypted_content` and `iv` is stored in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Unique message ID (UUID)
    pub id: String,
    /// Conversation this belongs to
    pub conversation_id: String,
    /// Sender's user id
    pub sender_id: String,
    /// Receiver's user id
    pub receiver_id: String,
    /// Unix timestamp when sent (milliseconds)
    pub timestamp: i64,
    /// Whether the receiver has read it
    pub read: bool,
    /// Body kind
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Sender's display name at send time
    pub sender_name: String,
    /// Sender's avatar at send time
    pub sender_avatar: Option<String>,
    /// Base64 ciphertext of the body
    pub encrypted_content: String,
    /// Base64 nonce of the body
    pub iv: String,
}

/// A stored message with its body decrypted for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// The stored document
    pub record: MessageRecord,
    /// Plaintext body, or the placeholder if it could not be decrypted
    pub body: String,
}

/// Durable storage for message documents
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message
    async fn save_message(&self, message: &MessageRecord) -> Result<()>;

    /// All messages of a conversation, oldest first
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>>;

    /// Mark every message addressed to `reader_id` as read; returns how many
    /// changed
    async fn mark_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize>;
}

/// Repository kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    conversations: RwLock<HashMap<String, Vec<MessageRecord>>>,
}

impl InMemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryRepository {
    async fn save_message(&self, message: &MessageRecord) -> Result<()> {
        self.conversations
            .write()
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        let mut messages = self
            .conversations
            .read()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn mark_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        let mut conversations = self.conversations.write();
        let Some(messages) = conversations.get_mut(conversation_id) else {
            return Ok(0);
        };

        let mut changed = 0;
        for message in messages
            .iter_mut()
            .filter(|m| m.receiver_id == reader_id && !m.read)
        {
            message.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

/// Sends and loads direct messages, encrypting bodies on the way
#[derive(Clone)]
pub struct MessagingService {
    codec: MessageCodec,
    repository: Arc<dyn MessageRepository>,
}

impl MessagingService {
    /// Create a messaging service
    pub fn new(codec: MessageCodec, repository: Arc<dyn MessageRepository>) -> Self {
        Self { codec, repository }
    }

    /// The codec used for message bodies
    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Prepare the key for a conversation before showing it
    pub async fn open_conversation(&self, user_a: &str, user_b: &str) -> Result<String> {
        let conv_id = conversation_id(user_a, user_b)?;
        self.codec.initialize_for_conversation(&conv_id).await?;
        Ok(conv_id)
    }

    /// Send a text message
    pub async fn send_text(
        &self,
        sender: &Participant,
        receiver_id: &str,
        text: &str,
    ) -> Result<MessageRecord> {
        self.send(sender, receiver_id, MessageType::Text, text).await
    }

    /// Send an image message whose body is the uploaded image's URL
    pub async fn send_image(
        &self,
        sender: &Participant,
        receiver_id: &str,
        image_url: &str,
    ) -> Result<MessageRecord> {
        self.send(sender, receiver_id, MessageType::Image, image_url)
            .await
    }

    async fn send(
        &self,
        sender: &Participant,
        receiver_id: &str,
        message_type: MessageType,
        body: &str,
    ) -> Result<MessageRecord> {
        let conv_id = conversation_id(&sender.id, receiver_id)?;

        let payload = self
            .codec
            .encrypt_message(body, &conv_id)
            .await
            .ok_or_else(|| {
                Error::SendFailed("message could not be encrypted; please try again".into())
            })?;

        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conv_id,
            sender_id: sender.id.clone(),
            receiver_id: receiver_id.to_string(),
            timestamp: crate::time::now_timestamp_millis(),
            read: false,
            message_type,
            sender_name: sender.display_name.clone(),
            sender_avatar: sender.avatar_url.clone(),
            encrypted_content: payload.encrypted_content,
            iv: payload.iv,
        };

        self.repository.save_message(&record).await?;

        tracing::debug!(
            message_id = %record.id,
            conversation_id = %record.conversation_id,
            "Message sent"
        );
        Ok(record)
    }

    /// Load a conversation with every body decrypted
    ///
    /// Each message is decrypted on its own; one bad body does not affect
    /// the others.
    pub async fn load_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Vec<DecryptedMessage>> {
        let conv_id = conversation_id(user_a, user_b)?;
        let records = self.repository.list_messages(&conv_id).await?;

        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            let body = self
                .codec
                .decrypt_message(&record.encrypted_content, &record.iv, &conv_id)
                .await;
            messages.push(DecryptedMessage { record, body });
        }

        tracing::debug!(conversation_id = %conv_id, count = messages.len(), "Loaded conversation");
        Ok(messages)
    }

    /// Mark messages from `other` to `reader` as read
    pub async fn mark_conversation_read(&self, reader: &str, other: &str) -> Result<usize> {
        let conv_id = conversation_id(reader, other)?;
        self.repository.mark_read(&conv_id, reader).await
    }

    /// Drop all conversation keys on this device
    pub async fn logout(&self) -> Result<()> {
        self.codec.clear_keys().await
    }
}

// ============================================================================
// TESTS
// ============================================================================
