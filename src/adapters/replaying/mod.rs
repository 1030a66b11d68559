//! Replaying adapters that serve recorded interactions from cassettes.

pub mod generation_service;
