// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log.

use chrono::{DateTime, Utc};
use kindly_core::{KindlyError, Message, MessageType, UserId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{blob_to_vec, format_ts, parse_json, parse_ts, vec_to_blob};

/// A message about to be appended to the log.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: UserId,
    pub message_type: MessageType,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    /// Embedding stored alongside bot replies for the repetition guard.
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn new(user_id: UserId, message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            user_id,
            message_type,
            content: content.into(),
            metadata: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, user_id, message_type, content, metadata, created_at";

fn row_to_message(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let type_text: String = row.get(2)?;
    let message_type = type_text.parse::<MessageType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let metadata: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message_type,
        content: row.get(3)?,
        metadata: metadata.map(|m| parse_json(4, &m)).transpose()?,
        created_at: parse_ts(5, &created_at)?,
    })
}

/// Append a message and return the stored row. Creates the user row on first contact.
pub async fn insert_message(db: &Database, msg: NewMessage) -> Result<Message, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<Message, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO users (user_id) VALUES (?1)",
                params![msg.user_id],
            )?;
            tx.execute(
                "INSERT INTO messages (user_id, message_type, content, metadata, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg.user_id,
                    msg.message_type.to_string(),
                    msg.content,
                    msg.metadata.as_ref().map(|m| m.to_string()),
                    msg.embedding.as_deref().map(vec_to_blob),
                    format_ts(msg.created_at),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(Message {
                id,
                user_id: msg.user_id,
                message_type: msg.message_type,
                content: msg.content,
                metadata: msg.metadata,
                created_at: msg.created_at,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one message by id.
pub async fn get_message(db: &Database, id: i64) -> Result<Option<Message>, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of `user_id` with id greater than `after_id`, ascending, at most `limit`.
pub async fn messages_after(
    db: &Database,
    user_id: UserId,
    after_id: i64,
    limit: usize,
) -> Result<Vec<Message>, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE user_id = ?1 AND id > ?2
                 ORDER BY id ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![user_id, after_id, limit as i64], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent bot-reply embeddings for `user_id`, newest first.
///
/// Replies stored without an embedding are skipped.
pub async fn recent_reply_embeddings(
    db: &Database,
    user_id: UserId,
    limit: usize,
) -> Result<Vec<Vec<f32>>, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Vec<f32>>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT embedding FROM messages
                 WHERE user_id = ?1 AND message_type = 'bot_reply' AND embedding IS NOT NULL
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit as i64], |row| {
                let blob: Vec<u8> = row.get(0)?;
                Ok(blob_to_vec(&blob))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Users that have user-authored messages beyond their watermark.
pub async fn users_with_pending(db: &Database) -> Result<Vec<UserId>, KindlyError> {
    db.connection()
        .call(|conn| -> Result<Vec<UserId>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT u.user_id FROM users u
                 WHERE EXISTS (
                     SELECT 1 FROM messages m
                     WHERE m.user_id = u.user_id
                       AND m.id > u.last_indexed_message_id
                       AND m.message_type != 'bot_reply'
                 )
                 ORDER BY u.user_id",
            )?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
