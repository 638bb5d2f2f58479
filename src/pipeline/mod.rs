//! Request/response stages used by the dispatcher.
//!
//! Each submodule implements exactly one step and can be tested without a
//! network.
//!
//! ## Data Flow
//!
//! ```text
//! multipart ──▶ body ──▶ transport ──┬─▶ decode   (2xx)
//! (files)      (JSON /   (one call)  └─▶ failure  (non-2xx)
//!               wire)
//! ```
//!
//! 1. [`multipart`] — files + settings → ordered form parts
//! 2. [`body`]      — candidate payload → wire body + `Content-Type`
//! 3. [`decode`]    — successful response → value for the declared mode
//! 4. [`failure`]   — failed response → one normalized [`crate::ApiError`]

pub mod body;
pub mod decode;
pub mod failure;
pub mod multipart;
