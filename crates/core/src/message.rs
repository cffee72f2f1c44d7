//! The canonical challenge message.
//!
//! Signer and verifier must produce byte-identical text, so both sides build
//! it through [`GateMessage::build`] and never from client-supplied strings.

use alloy::primitives::Address;

use crate::types::{GateMode, PostId};

/// First line of every challenge message.
pub const PROTOCOL_TAG: &str = "OnlyStars access gate v1";

/// Fields covered by the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateMessage<'a> {
    /// Which fact access is being proven for.
    pub mode: GateMode,
    /// The signing account.
    pub account: Address,
    /// The issued nonce.
    pub nonce: &'a str,
    /// Post being unlocked. Only rendered in post mode.
    pub post_id: Option<&'a PostId>,
    /// Creator the request concerns.
    pub creator: Option<Address>,
}

impl GateMessage<'_> {
    /// Renders the message: one `key=value` line per present field in fixed
    /// order, joined with `\n`, no trailing newline.
    ///
    /// Accounts and creators are rendered in EIP-55 checksum form.
    #[must_use]
    pub fn build(&self) -> String {
        let mut lines = Vec::with_capacity(6);
        lines.push(PROTOCOL_TAG.to_string());
        lines.push(format!("mode={}", self.mode));
        lines.push(format!("user={}", self.account.to_checksum(None)));
        if self.mode == GateMode::Post {
            if let Some(post_id) = self.post_id {
                lines.push(format!("postId={post_id}"));
            }
        }
        if let Some(creator) = self.creator {
            lines.push(format!("creator={}", creator.to_checksum(None)));
        }
        lines.push(format!("nonce={}", self.nonce));
        lines.join("\n")
    }
}
