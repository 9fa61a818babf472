//! Stateless helpers used by the client next to the stores.

pub mod course_id;
pub mod password;
pub mod profanity;
pub mod qr;
