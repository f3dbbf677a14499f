//! Repository for the `contacts` table.

use sqlx::PgPool;
use zapgate_core::types::DbId;

use crate::models::contact::{Contact, ContactUpsert};
use crate::repositories::is_unique_violation;

/// Column list for `contacts` queries.
const COLUMNS: &str = "id, instance_id, phone, name, push_name, avatar_url, is_group, \
     group_metadata, is_blocked, last_seen_at, created_at, updated_at";

/// Provides CRUD operations for contacts.
pub struct ContactRepo;

impl ContactRepo {
    pub async fn find_by_phone(
        pool: &PgPool,
        instance_id: DbId,
        phone: &str,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM contacts WHERE instance_id = $1 AND phone = $2");
        sqlx::query_as::<_, Contact>(&query)
            .bind(instance_id)
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    /// Idempotent upsert keyed by `(instance_id, phone)`.
    ///
    /// Returns the surviving row and whether it was created. A unique
    /// violation raised by a concurrent writer is resolved by re-read
    /// and update, never surfaced.
    pub async fn upsert(
        pool: &PgPool,
        instance_id: DbId,
        phone: &str,
        fields: &ContactUpsert,
    ) -> Result<(Contact, bool), sqlx::Error> {
        if let Some(existing) = Self::find_by_phone(pool, instance_id, phone).await? {
            let updated = Self::apply_update(pool, existing.id, fields).await?;
            return Ok((updated, false));
        }

        match Self::insert(pool, instance_id, phone, fields).await {
            Ok(created) => Ok((created, true)),
            Err(err) if is_unique_violation(&err) => {
                // Lost the insert race; the other writer's row wins the
                // key and we fold our fields into it.
                let existing = Self::find_by_phone(pool, instance_id, phone)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                let updated = Self::apply_update(pool, existing.id, fields).await?;
                Ok((updated, false))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn count_for_instance(pool: &PgPool, instance_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE instance_id = $1")
                .bind(instance_id)
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    async fn insert(
        pool: &PgPool,
        instance_id: DbId,
        phone: &str,
        fields: &ContactUpsert,
    ) -> Result<Contact, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts (instance_id, phone, name, push_name, avatar_url, is_group, group_metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(instance_id)
            .bind(phone)
            .bind(&fields.name)
            .bind(&fields.push_name)
            .bind(&fields.avatar_url)
            .bind(fields.is_group.unwrap_or(false))
            .bind(&fields.group_metadata)
            .fetch_one(pool)
            .await
    }

    /// Last-write-wins update of the mutable fields; `None` fields keep
    /// their stored value (COALESCE).
    async fn apply_update(
        pool: &PgPool,
        id: DbId,
        fields: &ContactUpsert,
    ) -> Result<Contact, sqlx::Error> {
        let query = format!(
            "UPDATE contacts SET \
                 name = COALESCE($2, name), \
                 push_name = COALESCE($3, push_name), \
                 avatar_url = COALESCE($4, avatar_url), \
                 is_group = COALESCE($5, is_group), \
                 group_metadata = COALESCE($6, group_metadata), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Contact>(&query)
            .bind(id)
            .bind(&fields.name)
            .bind(&fields.push_name)
            .bind(&fields.avatar_url)
            .bind(fields.is_group)
            .bind(&fields.group_metadata)
            .fetch_one(pool)
            .await
    }
}
