//! Cloud Firestore connection and write utilities.
//!
//! Implements [`document_sink::DocumentStore`] over the Firestore REST API.
//! Authentication uses a service-account key file; pointing
//! `emulator_host` (or `FIRESTORE_EMULATOR_HOST`) at a local emulator skips
//! authentication entirely.

mod connect;
pub mod encode;
mod sink_impl;

pub use connect::{firestore_connect, FirestoreOpts, EMULATOR_HOST_ENV};
pub use sink_impl::FirestoreSink;
