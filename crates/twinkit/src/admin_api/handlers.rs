//! Request handlers for the Admin API.

pub mod state;
pub mod system;
pub mod webhooks;
