//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - Input structs used by the repository upsert/create paths

pub mod chat;
pub mod contact;
pub mod instance;
pub mod message;
