//! Request and response schemas of the access gate.
//!
//! All wire types use camelCase field names.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, U256};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::serde_utils::{blank_as_none, blank_string_as_none};

/// Lowercase `0x`-prefixed hex form of an address, used in store keys and cache keys.
#[must_use]
pub fn lowercase_address(address: &Address) -> String {
    address.to_string().to_ascii_lowercase()
}

/// Which creator hub fact a nonce or a proof is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Access to a single paid post.
    Post,
    /// An active subscription to a creator.
    #[serde(alias = "sub")]
    Subscription,
}

impl GateMode {
    /// The wire and message form of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a post id is not a non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid post id `{0}`: expected a non-negative integer")]
pub struct InvalidPostId(pub String);

/// Numeric id of a post on the creator hub.
///
/// Serialized as a decimal string; accepts decimal or `0x` hex strings and
/// JSON integers on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub U256);

impl PostId {
    /// The id as a contract argument.
    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for PostId {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl FromStr for PostId {
    type Err = InvalidPostId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.starts_with(['-', '+']) {
            return Err(InvalidPostId(s.to_string()));
        }
        U256::from_str(trimmed)
            .map(Self)
            .map_err(|_| InvalidPostId(s.to_string()))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PostIdVisitor;

        impl de::Visitor<'_> for PostIdVisitor {
            type Value = PostId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PostId, E> {
                Ok(PostId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PostId, E> {
                u64::try_from(v)
                    .map(PostId::from)
                    .map_err(|_| E::custom(InvalidPostId(v.to_string())))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PostId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PostIdVisitor)
    }
}

/// What a nonce may be redeemed for.
///
/// A scope always names a mode; `post_id` and `creator_address` narrow it
/// further when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceScope {
    /// The operation the nonce is bound to.
    pub mode: GateMode,
    /// The post the nonce is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    /// The creator the nonce is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_address: Option<Address>,
}

impl NonceScope {
    /// Whether a nonce recorded with this scope may be redeemed for `expected`.
    ///
    /// Every field present in the recorded scope must match; addresses compare
    /// case-insensitively since they are parsed values.
    #[must_use]
    pub fn admits(&self, expected: Option<&Self>) -> bool {
        let Some(expected) = expected else {
            return false;
        };
        if self.mode != expected.mode {
            return false;
        }
        if self.post_id.is_some() && self.post_id != expected.post_id {
            return false;
        }
        if self.creator_address.is_some() && self.creator_address != expected.creator_address {
            return false;
        }
        true
    }
}

/// The fact being asked about, with the argument the ledger needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTarget {
    /// `hasPostAccess(user, postId)`.
    Post(PostId),
    /// `isSubscriptionActive(user, creator)`.
    Subscription(Address),
}

impl AccessTarget {
    /// The mode this target is checked under.
    #[must_use]
    pub const fn mode(&self) -> GateMode {
        match self {
            Self::Post(_) => GateMode::Post,
            Self::Subscription(_) => GateMode::Subscription,
        }
    }

    /// Key under which a decision for `account` is memoized.
    #[must_use]
    pub fn cache_key(&self, account: &Address) -> String {
        match self {
            Self::Post(post_id) => format!("post:{}:{post_id}", lowercase_address(account)),
            Self::Subscription(creator) => format!(
                "sub:{}:{}",
                lowercase_address(account),
                lowercase_address(creator)
            ),
        }
    }
}

/// Request validation failures that are not plain parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidRequest {
    /// Post mode was requested without a post id.
    #[error("postId is required for mode `post`")]
    MissingPostId,
    /// Subscription mode was requested without a creator.
    #[error("creatorAddress is required for mode `subscription`")]
    MissingCreator,
    /// A scope field was sent without a mode.
    #[error("postId and creatorAddress require a mode")]
    ScopeWithoutMode,
}

/// Nonce issuance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    /// The account that will sign the challenge.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "hex"))]
    pub account: Address,
    /// Operation to scope the nonce to; unscoped when absent.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub mode: Option<GateMode>,
    /// Post to scope the nonce to.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub post_id: Option<PostId>,
    /// Creator to scope the nonce to.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "hex"))]
    pub creator_address: Option<Address>,
}

impl NonceRequest {
    /// Checks that scope fields only appear together with a mode.
    ///
    /// # Errors
    /// Returns [`InvalidRequest::ScopeWithoutMode`] for a modeless request with scope fields.
    pub const fn validate(&self) -> Result<(), InvalidRequest> {
        if self.mode.is_none() && (self.post_id.is_some() || self.creator_address.is_some()) {
            return Err(InvalidRequest::ScopeWithoutMode);
        }
        Ok(())
    }

    /// The scope to record with the nonce.
    #[must_use]
    pub fn scope(&self) -> Option<NonceScope> {
        self.mode.map(|mode| NonceScope {
            mode,
            post_id: self.post_id,
            creator_address: self.creator_address,
        })
    }
}

/// Nonce issuance response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// The challenge token to embed in the signed message.
    pub nonce: String,
    /// Seconds until the nonce expires.
    pub expires_in_seconds: u64,
    /// Whether the nonce is bound to a scope.
    pub scoped: bool,
}

/// Proof submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GateRequest {
    /// Which fact is being checked.
    pub mode: GateMode,
    /// The account claiming access.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "hex"))]
    pub account: Address,
    /// Post being unlocked, required for `post` mode.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub post_id: Option<PostId>,
    /// Creator subscribed to, required for `subscription` mode.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "hex"))]
    pub creator_address: Option<Address>,
    /// Nonce previously issued for this account.
    #[serde(default, deserialize_with = "blank_string_as_none", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// `0x`-prefixed 65-byte personal-sign signature of the canonical message.
    #[serde(default, deserialize_with = "blank_string_as_none", skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// The message the client signed. Informational only; the gate always
    /// rebuilds the canonical message itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GateRequest {
    /// Resolves the ledger question this request asks.
    ///
    /// # Errors
    /// Returns an error when the field required by `mode` is missing.
    pub fn target(&self) -> Result<AccessTarget, InvalidRequest> {
        match self.mode {
            GateMode::Post => self
                .post_id
                .map(AccessTarget::Post)
                .ok_or(InvalidRequest::MissingPostId),
            GateMode::Subscription => self
                .creator_address
                .map(AccessTarget::Subscription)
                .ok_or(InvalidRequest::MissingCreator),
        }
    }

    /// The scope a nonce must admit to be redeemed by this request.
    #[must_use]
    pub const fn scope(&self) -> NonceScope {
        NonceScope {
            mode: self.mode,
            post_id: self.post_id,
            creator_address: self.creator_address,
        }
    }
}

/// Why a proof was not accepted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ProofFailure {
    /// Signature or nonce missing from the request.
    MissingSig,
    /// Nonce unknown, expired, already used or unreadable.
    BadNonce,
    /// Nonce was issued for a different operation or target.
    ScopeMismatch,
    /// Signature does not verify for the account.
    BadSignature,
}

/// Why access was granted or denied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AccessReason {
    /// The account holds an active subscription.
    SubscriptionActive,
    /// The account holds no active subscription.
    NoSubscription,
    /// The account has unlocked the post.
    PostAccess,
    /// The account has not unlocked the post.
    NoPostAccess,
    /// The ledger could not be read; denied in degraded mode.
    LedgerUnavailable,
}

impl AccessReason {
    /// The reason reported for a ledger answer about `target`.
    #[must_use]
    pub const fn from_ledger(target: &AccessTarget, allowed: bool) -> Self {
        match (target, allowed) {
            (AccessTarget::Post(_), true) => Self::PostAccess,
            (AccessTarget::Post(_), false) => Self::NoPostAccess,
            (AccessTarget::Subscription(_), true) => Self::SubscriptionActive,
            (AccessTarget::Subscription(_), false) => Self::NoSubscription,
        }
    }
}

/// Outcome of the signature step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AuthOutcome {
    /// Whether the proof verified.
    pub signature: bool,
    /// Why the proof failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_reason: Option<ProofFailure>,
}

/// Proof submission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    /// Always `true`; failures of the access check are reported through `allowed`.
    pub ok: bool,
    /// The access decision.
    pub allowed: bool,
    /// Why access was granted or denied.
    pub reason: AccessReason,
    /// Result of the signature step.
    pub auth: AuthOutcome,
}

/// Cheap check query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CheckQuery {
    /// The account to check.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "hex"))]
    pub account: Address,
    /// Creator to check the subscription against.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "hex"))]
    pub creator_address: Option<Address>,
    /// Post to check access to.
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub post_id: Option<PostId>,
}

impl CheckQuery {
    /// Query asking only about `target`.
    #[must_use]
    pub const fn for_target(account: Address, target: &AccessTarget) -> Self {
        match *target {
            AccessTarget::Post(post_id) => Self {
                account,
                creator_address: None,
                post_id: Some(post_id),
            },
            AccessTarget::Subscription(creator) => Self {
                account,
                creator_address: Some(creator),
                post_id: None,
            },
        }
    }
}

/// Cheap check response; `null` for every question that was not asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// `isSubscriptionActive(account, creatorAddress)`.
    pub sub_active: Option<bool>,
    /// `hasPostAccess(account, postId)`.
    pub has_access: Option<bool>,
}

impl CheckResponse {
    /// The answer for `target`, if the response carries one.
    #[must_use]
    pub const fn answer(&self, target: &AccessTarget) -> Option<bool> {
        match target {
            AccessTarget::Post(_) => self.has_access,
            AccessTarget::Subscription(_) => self.sub_active,
        }
    }
}

/// Gate error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GateErrorCode {
    /// Malformed input.
    BadRequest,
    /// Too many nonce requests.
    RateLimited,
    /// Requested resource was not found.
    NotFound,
    /// The key-value store could not be reached.
    StorageUnavailable,
    /// The ledger could not be read.
    LedgerUnavailable,
    /// Unexpected failure.
    InternalServerError,
}

/// Error body returned by every non-2xx gate response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct GateErrorBody {
    /// Always `false`.
    pub ok: bool,
    /// Human-readable error.
    pub error: String,
    /// Machine-readable error code.
    pub code: GateErrorCode,
}

impl GateErrorBody {
    /// Creates a new error body.
    #[must_use]
    pub const fn new(code: GateErrorCode, error: String) -> Self {
        Self {
            ok: false,
            error,
            code,
        }
    }
}

/// Liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HealthResponse {
    /// Always `true`.
    pub success: bool,
}
