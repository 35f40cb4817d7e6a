#![forbid(unsafe_code)]

//! Video fetch service with a gated client download flow.
//!
//! The server half wraps yt-dlp behind a small JSON API and streams finished
//! files back by single-use token; the client half drives the
//! submit -> 5-second gate -> download sequence as an explicit state machine.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod history;
pub mod server;
