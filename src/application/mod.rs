//! Application layer containing the verification orchestration.
//!
//! [`engine::VerificationEngine`] is the entry point for client commands. It
//! serializes commands per request with [`locks::RequestLocks`], consults the
//! transition table in [`machine`] and persists through the record store port.

pub mod documents;
pub mod engine;
pub mod locks;
pub mod machine;
pub mod report;
