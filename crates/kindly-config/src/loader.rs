// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/kindly/kindly.toml`
//! 3. `~/.config/kindly/kindly.toml`
//! 4. `./kindly.toml`
//! 5. `KINDLY_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KindlyConfig;

/// Top-level sections, used to map `KINDLY_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &[
    "agent",
    "storage",
    "provider",
    "memory",
    "compression",
    "indexer",
    "retrieval",
    "repetition",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
pub fn load_config() -> Result<KindlyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<KindlyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindlyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KindlyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindlyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KindlyConfig::default()))
        .merge(Toml::file("/etc/kindly/kindly.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("kindly/kindly.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("kindly.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `KINDLY_PROVIDER_API_KEY` maps to `provider.api_key`.
fn env_provider() -> Env {
    Env::prefixed("KINDLY_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
