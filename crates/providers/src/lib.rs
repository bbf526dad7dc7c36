pub mod api;
pub mod bridge;
pub mod bus;
pub mod listener;

pub use api::BackendClient;
pub use bridge::{BridgeRole, OAuthBridge};
