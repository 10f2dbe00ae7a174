//! Domain records handed to the cache layer by domain services.

pub mod changes;
pub mod entities;
