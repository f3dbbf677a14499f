pub mod admin;
pub mod instances;
