// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::OsString;

/// Environment variable that, when set to any non-empty value, turns caching off
/// for engines using [`CacheSwitch::FromEnv`].
pub const DISABLE_CACHE_ENV: &str = "MEMORIA_DISABLE_CACHE";

/// Global on/off control for an engine.
///
/// A disabled engine calls the wrapped operation directly and performs no
/// storage I/O at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheSwitch {
    /// Read [`DISABLE_CACHE_ENV`] on every call.
    #[default]
    FromEnv,
    /// Always cache.
    Enabled,
    /// Never cache.
    Disabled,
}

impl CacheSwitch {
    /// Returns `true` if calls should bypass the cache right now.
    #[must_use]
    pub fn is_disabled(self) -> bool {
        match self {
            Self::FromEnv => disabled_by(std::env::var_os(DISABLE_CACHE_ENV)),
            Self::Enabled => false,
            Self::Disabled => true,
        }
    }
}

fn disabled_by(value: Option<OsString>) -> bool {
    value.is_some_and(|value| !value.is_empty())
}
