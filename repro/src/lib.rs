//! Diagnostic harness for a TLS 1.3 / keep-alive cache interaction
//! bug: after the peer closes a connection without sending
//! `close_notify` (optional in TLS 1.3), worker threads can end up
//! permanently blocked on the client's idle-connection cache.
//!
//! The harness drives container/blob create-delete cycles against an
//! object-storage endpoint over TLS 1.3-only transports, then walks
//! the live threads of the process looking for the blocking symptom.
//! See the `tls13`, `tls13-track1` and `tls13-track2` binaries for the
//! three variants.

pub mod diagnose;
pub mod store;
pub mod transport;
pub mod workload;
