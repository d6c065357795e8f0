// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user indexing watermark.
//!
//! The watermark only moves forward, except through [`reset_watermark`]
//! which backs a full reindex.

use kindly_core::{KindlyError, UserId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Create the user row if it does not exist yet.
pub async fn ensure_user(db: &Database, user_id: UserId) -> Result<(), KindlyError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO users (user_id) VALUES (?1)",
                params![user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Current watermark, or 0 for unknown users.
pub async fn get_watermark(db: &Database, user_id: UserId) -> Result<i64, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let mark = conn
                .query_row(
                    "SELECT last_indexed_message_id FROM users WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(mark.unwrap_or(0))
        })
        .await
        .map_err(map_tr_err)
}

/// Move the watermark to `up_to` unless it is already at or past it.
///
/// Returns the watermark after the update.
pub async fn advance_watermark(
    db: &Database,
    user_id: UserId,
    up_to: i64,
) -> Result<i64, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "INSERT INTO users (user_id, last_indexed_message_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET
                     last_indexed_message_id = MAX(last_indexed_message_id, excluded.last_indexed_message_id),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 RETURNING last_indexed_message_id",
                params![user_id, up_to],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Advance to `message_id` only when no user-authored message of this user
/// lies strictly between the current watermark and `message_id`.
///
/// Returns `true` when the watermark moved.
pub async fn advance_if_contiguous(
    db: &Database,
    user_id: UserId,
    message_id: i64,
) -> Result<bool, KindlyError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE users SET
                     last_indexed_message_id = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1
                   AND last_indexed_message_id < ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM messages m
                       WHERE m.user_id = ?1
                         AND m.message_type != 'bot_reply'
                         AND m.id > users.last_indexed_message_id
                         AND m.id < ?2
                   )",
                params![user_id, message_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Rewind the watermark to 0 for a full reindex.
pub async fn reset_watermark(db: &Database, user_id: UserId) -> Result<(), KindlyError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE users SET last_indexed_message_id = 0,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::messages::{NewMessage, insert_message};
    use kindly_core::MessageType;

    #[tokio::test]
    async fn unknown_user_has_zero_watermark() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(get_watermark(&db, 42).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn watermark_never_regresses() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(advance_watermark(&db, 1, 10).await.unwrap(), 10);
        assert_eq!(advance_watermark(&db, 1, 4).await.unwrap(), 10);
        assert_eq!(advance_watermark(&db, 1, 12).await.unwrap(), 12);
        assert_eq!(get_watermark(&db, 1).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn reset_rewinds_to_zero() {
        let db = Database::open_in_memory().await.unwrap();
        advance_watermark(&db, 1, 10).await.unwrap();
        reset_watermark(&db, 1).await.unwrap();
        assert_eq!(get_watermark(&db, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn contiguous_advance_requires_no_gap() {
        let db = Database::open_in_memory().await.unwrap();
        let m1 = insert_message(&db, NewMessage::new(5, MessageType::UserText, "first"))
            .await
            .unwrap();
        let reply = insert_message(&db, NewMessage::new(5, MessageType::BotReply, "reply"))
            .await
            .unwrap();
        let m2 = insert_message(&db, NewMessage::new(5, MessageType::UserText, "second"))
            .await
            .unwrap();

        // m1 is still unindexed, so m2 cannot move the mark.
        assert!(!advance_if_contiguous(&db, 5, m2.id).await.unwrap());
        assert_eq!(get_watermark(&db, 5).await.unwrap(), 0);

        assert!(advance_if_contiguous(&db, 5, m1.id).await.unwrap());
        // The bot reply in between does not block.
        assert!(reply.id > m1.id && reply.id < m2.id);
        assert!(advance_if_contiguous(&db, 5, m2.id).await.unwrap());
        assert_eq!(get_watermark(&db, 5).await.unwrap(), m2.id);

        // Re-applying is a no-op.
        assert!(!advance_if_contiguous(&db, 5, m1.id).await.unwrap());
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        ensure_user(&db, 7).await.unwrap();
        advance_watermark(&db, 7, 3).await.unwrap();
        ensure_user(&db, 7).await.unwrap();
        assert_eq!(get_watermark(&db, 7).await.unwrap(), 3);
    }
}
