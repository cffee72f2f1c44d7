//! Client side of the OnlyStars access gate.
//!
//! [`AccessResolver`] answers "may this account see this post / is this
//! subscription active" by asking the gate's cheap ledger read first and
//! falling back to the signed proof flow, memoizing every decision in a
//! [`DecisionCache`].

mod cache;
mod client;
mod resolver;
mod signer;

pub use cache::{DecisionCache, DECISION_TTL};
pub use client::{GateApi, GateClient, GateClientError};
pub use resolver::{AccessDecision, AccessResolver, DecisionSource};
pub use signer::{MessageSigner, SignerError};
