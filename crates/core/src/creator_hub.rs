//! Solidity bindings for the creator hub and the ERC-1271 wallet interface.
//!
//! # Example
//!
//! ```rust,ignore
//! use onlystars_core::creator_hub::ICreatorHub;
//!
//! let hub = ICreatorHub::new(hub_address, provider);
//! let active = hub.isSubscriptionActive(user, creator).call().await?;
//! ```

alloy::sol! {
    /// Read-only view of the creator hub contract holding subscription and
    /// paid-post state.
    #[sol(rpc)]
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ICreatorHub {
        function isSubscriptionActive(address user, address creator) external view returns (bool);
        function hasPostAccess(address user, uint256 postId) external view returns (bool);
    }

    /// ERC-1271 signature validation for contract wallets.
    #[sol(rpc)]
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC1271 {
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
    }
}

/// Value returned by `isValidSignature` when the signature is valid.
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];
