//! Lenient deserializers for optional request fields.
//!
//! Browser clients send absent fields as `null`, `""` or omit them entirely;
//! all three mean "not supplied".

use serde::{de::DeserializeOwned, Deserialize, Deserializer};

/// Deserializes `Option<T>`, mapping `null` and empty strings to `None`.
pub(crate) fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => T::deserialize(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Same as [`blank_as_none`] for string fields, additionally trimming whitespace.
pub(crate) fn blank_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}
