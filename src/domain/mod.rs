//! Domain layer types and invariants.

pub mod alert;
pub mod editorial;
pub mod entities;
pub mod error;
pub mod personas;
pub mod slug;
pub mod types;
