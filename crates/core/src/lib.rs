//! Core types for the OnlyStars access gate.
//!
//! Shared by the gate service and its clients: the request/response schemas,
//! the canonical challenge message that gets signed, the creator hub contract
//! binding and the personal-sign check used to prove account control.

#![deny(clippy::all, missing_docs)]

pub mod creator_hub;
pub mod message;
pub mod signature;
pub mod types;

mod serde_utils;

pub use message::{GateMessage, PROTOCOL_TAG};
pub use types::{AccessTarget, GateMode, NonceScope, PostId};
