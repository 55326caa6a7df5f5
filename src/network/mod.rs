//! Network module
//!
//! Provides the multi-provider RPC gateway and the internal event bus.

pub mod event_bus;
pub mod gateway;

pub use event_bus::{ColonyEvent, EventBus, EventProcessor};
pub use gateway::{GatewayError, ProviderHandle, RpcGateway};
