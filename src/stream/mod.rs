//! Viewer stream: per-frame encoding and the TCP accept loop.

pub mod encoder;
pub mod server;

pub use encoder::{encode_frame, StreamError};
