//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.
//!
//! Contacts, chats and messages are shared between the reconciliation
//! pass and the webhook pipeline, with no locking above the store. The
//! write paths therefore follow one idempotent-upsert contract: look up
//! by natural key, insert when absent, and when a concurrent writer
//! wins the insert race (unique violation 23505) re-read and apply the
//! change as an update instead of failing.

pub mod chat_repo;
pub mod contact_repo;
pub mod instance_repo;
pub mod message_repo;

pub use chat_repo::ChatRepo;
pub use contact_repo::ContactRepo;
pub use instance_repo::InstanceRepo;
pub use message_repo::MessageRepo;

/// True when the error is a PostgreSQL unique-constraint violation
/// (SQLSTATE 23505) on one of our `uq_*` constraints.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
