//! # Pordisto (Authentication Gateway)
//!
//! `pordisto` sits in front of a web application and decides which requests
//! require an authenticated session. It owns three concerns:
//!
//! - **Session gate**: every inbound path is classified as public, protected
//!   page, protected API, or static asset before any I/O. Protected paths
//!   require a valid signed session cookie; API paths get structured 401
//!   bodies with stable codes, page paths get redirected to `/login`.
//! - **Magic links**: single-use, 15-minute login tokens delivered by email.
//!   Only token hashes touch the database, and the request endpoint answers
//!   identically whether or not the address is registered.
//! - **Signup reconciliation**: users are committed locally first and then
//!   mirrored into the backend identity system on a detached task. Backend
//!   failures are logged and never surface in the signup response.
//!
//! Configuration is parsed once at startup and immutable afterwards; the
//! database's unique constraints are the only concurrency control.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
