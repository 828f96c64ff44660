//! Dedup service client.
//!
//! This crate is the single source of truth for the matching-service wire
//! contract: the multipart request, the two response shapes, and the
//! failure taxonomy the orchestrator rolls back on.
//!
//! No retries. A failed call is reported once to the caller.

mod client;
mod protocol;

pub use client::{DedupClient, DedupService, RemoteFailure, DEFAULT_TIMEOUT};
pub use protocol::{
    parse_response, DedupRequest, DedupResponse, Upload, SIMILARITY_THRESHOLD,
    STATUS_NEEDS_TRAINING,
};
