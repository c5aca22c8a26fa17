//! Gateway: the HTTP front door.
//!
//! Lifecycle:
//! 1. Build the proxy client and the stream coordinator
//! 2. Attach whichever chat channels are configured
//! 3. Serve `/api/v1/message/` (WeCom), `/telegram` and `/health`
//!
//! Stream logic lives in `homegate-stream`; handlers here only decode
//! requests and encode replies.

pub mod auth_middleware;
pub mod server;
pub mod state;
pub mod telegram_routes;
pub mod wecom_routes;
