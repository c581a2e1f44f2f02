//! Discord adapter: REST for replies, gateway for inbound events.

mod client;
mod dto;
pub mod gateway;

pub use client::DiscordClient;
pub use gateway::{
    DispatchEvent, GatewayClient, GatewayClientConfig, GatewayError, GatewayEventKind,
};
