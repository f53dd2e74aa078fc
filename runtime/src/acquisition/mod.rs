//! Plain HTTP acquisition: the shared client and scoped downloads.
//!
//! The browser renders quiz pages; everything fetched on the side (files
//! linked from a page, answer submissions) goes through here.

pub mod download;
pub mod http_client;
