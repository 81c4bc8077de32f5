//! SBS-1 feed ingestion.
//!
//! [`FeedMessage::parse`] turns one text line into a typed message;
//! [`spawn_feed_reader`] keeps a TCP connection to the receiver open and
//! pushes every parsed message into the writer queue.

mod message;
mod reader;

pub use message::{FIELD_COUNT, FeedError, FeedMessage, icao_to_key};
pub use reader::{FeedConfig, SessionError, spawn_feed_reader};
