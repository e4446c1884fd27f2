//! Remote mirror of the chapter store
//!
//! A [`RemoteSync`] backend lets several devices share one chapter cache. The
//! orchestrator reads through it on a local miss and writes fetched chapters
//! to it in the background. Every failure here is advisory: the local store
//! stays authoritative.
//!
//! - [`HttpRemoteSync`] talks to a bearer-token protected JSON document service
//! - [`NoOpRemoteSync`] is never authenticated, so the mirror is skipped entirely

mod http;
mod noop;
mod traits;

pub use http::HttpRemoteSync;
pub use noop::NoOpRemoteSync;
pub use traits::RemoteSync;
