//! Error types for instance discovery.

use thiserror::Error;

/// Errors raised while talking to the setup service or validating instances.
///
/// None of these cross the public accessors of [`SetupQuery`](crate::SetupQuery):
/// they are absorbed into "unavailable" there and only show up in logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("setup configuration service is unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("native call `{call}` failed with code {code:#010x}")]
    Native { call: &'static str, code: i32 },

    #[error("malformed instance: {0}")]
    MalformedInstance(String),

    #[error("invalid version string `{0}`")]
    InvalidVersion(String),

    #[error("instance `{instance}` is not installed locally")]
    InstanceState { instance: String },

    #[error("no instance matches major version {major}{}", location_suffix(.location))]
    NoMatchingInstance {
        major: u16,
        location: Option<String>,
    },

    #[error("failed to read package references: {0}")]
    PackageEnumeration(String),
}

fn location_suffix(location: &Option<String>) -> String {
    match location {
        Some(loc) => format!(" at `{}`", loc),
        None => String::new(),
    }
}

impl SetupError {
    /// Build a [`SetupError::Native`] for a failed call.
    pub fn native(call: &'static str, code: i32) -> Self {
        SetupError::Native { call, code }
    }
}
