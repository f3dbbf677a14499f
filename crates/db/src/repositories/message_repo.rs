//! Repository for the `messages` table.

use sqlx::PgPool;
use zapgate_core::types::DbId;

use crate::models::message::{Message, NewMessage};
use crate::repositories::is_unique_violation;

/// Column list for `messages` queries.
const COLUMNS: &str = "id, instance_id, chat_id, contact_id, message_id, from_me, message_type, \
     content, media_url, message_timestamp, delivery_status, is_deleted, created_at";

/// Provides CRUD operations for messages.
pub struct MessageRepo;

impl MessageRepo {
    pub async fn find_by_message_id(
        pool: &PgPool,
        instance_id: DbId,
        message_id: &str,
    ) -> Result<Option<Message>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM messages WHERE instance_id = $1 AND message_id = $2");
        sqlx::query_as::<_, Message>(&query)
            .bind(instance_id)
            .bind(message_id)
            .fetch_optional(pool)
            .await
    }

    /// Idempotent insert keyed by `(instance_id, message_id)`.
    ///
    /// Duplicate delivery of the same gateway message id is a no-op:
    /// the stored row is returned with `created = false`, whether the
    /// duplicate was detected by lookup or by losing an insert race.
    pub async fn insert_if_absent(
        pool: &PgPool,
        new: &NewMessage,
    ) -> Result<(Message, bool), sqlx::Error> {
        if let Some(existing) =
            Self::find_by_message_id(pool, new.instance_id, &new.message_id).await?
        {
            return Ok((existing, false));
        }

        match Self::insert(pool, new).await {
            Ok(created) => Ok((created, true)),
            Err(err) if is_unique_violation(&err) => {
                let existing = Self::find_by_message_id(pool, new.instance_id, &new.message_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Update the delivery status. Returns `false` when the message is
    /// not stored (e.g. a status update delivered before its upsert).
    pub async fn update_delivery_status(
        pool: &PgPool,
        instance_id: DbId,
        message_id: &str,
        delivery_status: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE messages SET delivery_status = $3 \
             WHERE instance_id = $1 AND message_id = $2",
        )
        .bind(instance_id)
        .bind(message_id)
        .bind(delivery_status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a message.
    pub async fn mark_deleted(
        pool: &PgPool,
        instance_id: DbId,
        message_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE messages SET is_deleted = TRUE WHERE instance_id = $1 AND message_id = $2")
                .bind(instance_id)
                .bind(message_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(pool: &PgPool, new: &NewMessage) -> Result<Message, sqlx::Error> {
        let query = format!(
            "INSERT INTO messages (instance_id, chat_id, contact_id, message_id, from_me, \
                 message_type, content, media_url, message_timestamp, delivery_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(new.instance_id)
            .bind(new.chat_id)
            .bind(new.contact_id)
            .bind(&new.message_id)
            .bind(new.from_me)
            .bind(new.message_type.as_str())
            .bind(&new.content)
            .bind(&new.media_url)
            .bind(new.message_timestamp)
            .bind(new.delivery_status.as_str())
            .fetch_one(pool)
            .await
    }
}
