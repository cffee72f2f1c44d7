//! Common utilities shared across OnlyStars services.

mod provider;
mod server_layers;

pub use provider::{ProviderArgs, ProviderError, ProviderResult, RetryConfig};
pub use server_layers::{timeout_layer, trace_layer};
