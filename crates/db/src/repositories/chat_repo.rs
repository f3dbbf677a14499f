//! Repository for the `chats` table.

use sqlx::PgPool;
use zapgate_core::types::DbId;

use crate::models::chat::{Chat, ChatSnapshot};
use crate::repositories::is_unique_violation;

/// Column list for `chats` queries.
const COLUMNS: &str = "id, instance_id, contact_id, chat_id, last_message, last_message_type, \
     last_message_sender, last_message_at, unread_count, is_pinned, is_archived, is_muted, \
     created_at, updated_at";

/// Provides CRUD operations for chats.
pub struct ChatRepo;

impl ChatRepo {
    pub async fn find_by_chat_id(
        pool: &PgPool,
        instance_id: DbId,
        chat_id: &str,
    ) -> Result<Option<Chat>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chats WHERE instance_id = $1 AND chat_id = $2");
        sqlx::query_as::<_, Chat>(&query)
            .bind(instance_id)
            .bind(chat_id)
            .fetch_optional(pool)
            .await
    }

    /// Idempotent upsert keyed by `(instance_id, chat_id)`; same
    /// contract as [`ContactRepo::upsert`](super::ContactRepo::upsert).
    /// `contact_id` is the owning contact reference injected by the
    /// caller; a provided snapshot refreshes the last-message columns.
    pub async fn upsert(
        pool: &PgPool,
        instance_id: DbId,
        contact_id: DbId,
        chat_id: &str,
        snapshot: &ChatSnapshot,
    ) -> Result<(Chat, bool), sqlx::Error> {
        if let Some(existing) = Self::find_by_chat_id(pool, instance_id, chat_id).await? {
            let updated = Self::apply_snapshot(pool, existing.id, snapshot).await?;
            return Ok((updated, false));
        }

        match Self::insert(pool, instance_id, contact_id, chat_id, snapshot).await {
            Ok(created) => Ok((created, true)),
            Err(err) if is_unique_violation(&err) => {
                let existing = Self::find_by_chat_id(pool, instance_id, chat_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                let updated = Self::apply_snapshot(pool, existing.id, snapshot).await?;
                Ok((updated, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Refresh the last-message snapshot and bump the unread counter
    /// (inbound messages only).
    pub async fn record_message(
        pool: &PgPool,
        id: DbId,
        snapshot: &ChatSnapshot,
        increment_unread: bool,
    ) -> Result<(), sqlx::Error> {
        let increment = if increment_unread { 1 } else { 0 };
        sqlx::query(
            "UPDATE chats SET \
                 last_message = COALESCE($2, last_message), \
                 last_message_type = COALESCE($3, last_message_type), \
                 last_message_sender = COALESCE($4, last_message_sender), \
                 last_message_at = COALESCE($5, last_message_at), \
                 unread_count = unread_count + $6, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&snapshot.last_message)
        .bind(&snapshot.last_message_type)
        .bind(&snapshot.last_message_sender)
        .bind(snapshot.last_message_at)
        .bind(increment)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn count_for_instance(pool: &PgPool, instance_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM chats WHERE instance_id = $1")
                .bind(instance_id)
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    async fn insert(
        pool: &PgPool,
        instance_id: DbId,
        contact_id: DbId,
        chat_id: &str,
        snapshot: &ChatSnapshot,
    ) -> Result<Chat, sqlx::Error> {
        let query = format!(
            "INSERT INTO chats (instance_id, contact_id, chat_id, last_message, \
                 last_message_type, last_message_sender, last_message_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Chat>(&query)
            .bind(instance_id)
            .bind(contact_id)
            .bind(chat_id)
            .bind(&snapshot.last_message)
            .bind(&snapshot.last_message_type)
            .bind(&snapshot.last_message_sender)
            .bind(snapshot.last_message_at)
            .fetch_one(pool)
            .await
    }

    async fn apply_snapshot(
        pool: &PgPool,
        id: DbId,
        snapshot: &ChatSnapshot,
    ) -> Result<Chat, sqlx::Error> {
        let query = format!(
            "UPDATE chats SET \
                 last_message = COALESCE($2, last_message), \
                 last_message_type = COALESCE($3, last_message_type), \
                 last_message_sender = COALESCE($4, last_message_sender), \
                 last_message_at = COALESCE($5, last_message_at), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Chat>(&query)
            .bind(id)
            .bind(&snapshot.last_message)
            .bind(&snapshot.last_message_type)
            .bind(&snapshot.last_message_sender)
            .bind(snapshot.last_message_at)
            .fetch_one(pool)
            .await
    }
}
