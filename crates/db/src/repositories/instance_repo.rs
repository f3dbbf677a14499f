//! Repository for the `instances` table.

use sqlx::PgPool;
use zapgate_core::types::DbId;

use crate::models::instance::Instance;

/// Column list for `instances` queries.
const COLUMNS: &str = "id, name, provider_instance_id, status, phone_number, \
     last_seen_at, settings, created_at, updated_at";

/// Provides CRUD operations for instances.
pub struct InstanceRepo;

impl InstanceRepo {
    /// Create an instance, returning the full row.
    pub async fn create(
        pool: &PgPool,
        name: &str,
        provider_instance_id: &str,
    ) -> Result<Instance, sqlx::Error> {
        let query = format!(
            "INSERT INTO instances (name, provider_instance_id) \
             VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Instance>(&query)
            .bind(name)
            .bind(provider_instance_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances WHERE id = $1");
        sqlx::query_as::<_, Instance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up an instance by its gateway-assigned identifier. Used by
    /// the webhook ingress to map envelopes to local rows.
    pub async fn find_by_provider_id(
        pool: &PgPool,
        provider_instance_id: &str,
    ) -> Result<Option<Instance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances WHERE provider_instance_id = $1");
        sqlx::query_as::<_, Instance>(&query)
            .bind(provider_instance_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Instance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM instances ORDER BY created_at");
        sqlx::query_as::<_, Instance>(&query).fetch_all(pool).await
    }

    /// Update the connection status. Callers only invoke this when the
    /// computed status actually differs from the stored one.
    pub async fn update_status(pool: &PgPool, id: DbId, status: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE instances SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_phone_number(
        pool: &PgPool,
        id: DbId,
        phone_number: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE instances SET phone_number = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(phone_number)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_seen(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE instances SET last_seen_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Merge a JSON patch into the settings blob (jsonb `||`). Used for
    /// the orphan flag, pairing artifact and similar bookkeeping.
    pub async fn merge_settings(
        pool: &PgPool,
        id: DbId,
        patch: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE instances SET settings = settings || $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(patch)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace the gateway identifier and reset pairing/phone state.
    /// Used by orphan recreation.
    pub async fn reset_provider_identity(
        pool: &PgPool,
        id: DbId,
        provider_instance_id: &str,
        status: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE instances \
             SET provider_instance_id = $2, status = $3, phone_number = NULL, \
                 settings = settings - 'orphaned' - 'orphaned_at' - 'orphaned_reason' - 'pairing_code', \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(provider_instance_id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete an instance; contacts, chats and messages cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM instances WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
