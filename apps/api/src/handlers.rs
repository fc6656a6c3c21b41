pub mod health;
pub mod records;
pub mod security;
pub mod tenants;
