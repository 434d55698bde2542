//! A line-oriented operational-transformation core for collaborative text
//! editing: document model, OT engine, client state machine, server
//! coordinator, wire codec, and remote-cursor tracking.

pub mod client;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod logging;
pub mod ot;
pub mod position;
pub mod protocol;
pub mod server;
pub mod types;
