//! WebSocket channel: wire protocol and relay endpoint

pub mod handler;
pub mod protocol;
