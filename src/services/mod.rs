/// Push, pull and guest game hand-over between the two stores.
pub mod sync_service;
