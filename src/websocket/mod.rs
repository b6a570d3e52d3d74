//! # WebSocket Input Module
//!
//! Receives controller data from the WebXR page as JSON text frames.

pub mod message;
pub mod server;
