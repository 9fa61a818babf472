//! Library crate for minimate-sync: the local and remote game stores, the sync
//! service composing them, and the small utilities the client ships with.

pub mod config;
/// Entities, storage errors and the two game stores.
pub mod dao;
/// Transport shapes shared by the remote backends.
pub mod dto;
/// Service-level errors.
pub mod error;
/// Operations composing the local and remote stores.
pub mod services;
pub mod util;
