//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Typed representations of the webhook events the service handles

pub mod events;
pub mod signature;

pub use events::{EventKind, PingPayload, RunAction, WorkflowRunPayload};
pub use signature::{
    SignatureError, compute_signature, format_signature_header, verify_signature,
};
