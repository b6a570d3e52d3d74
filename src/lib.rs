//! # VR DSU Bridge Library
//!
//! Stream WebXR motion controllers to emulators over the DSU (cemuhook)
//! protocol.
//!
//! This library provides the core functionality for receiving controller
//! state from a browser over WebSocket, keeping it in four controller slots
//! and serving it to DSU clients over UDP.

pub mod config;
pub mod error;
pub mod dsu;
pub mod controller;
pub mod websocket;
pub mod feeder;
pub mod logging;
