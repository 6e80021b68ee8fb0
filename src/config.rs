//! Configuration consumed by the resolver.
//!
//! Split into `LayoutConfig` (facts about the target machine that the Type-Layout Oracle needs)
//! and `CheckConfig` (the two check-suppression flags the Failure Sink consults) — "what memory
//! looks like" kept separate from "which obligations we bother to emit". Both are
//! `serde`-deserializable so a caller can load them from the same TOML file the surrounding model
//! checker uses for its own settings.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn is_big_endian(self) -> bool {
        matches!(self, Endianness::Big)
    }
}

/// Facts about the verification target's memory model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Rounding unit for dynamic-struct field windows. Must be a power of two.
    pub word_size: u32,
    /// Size of a pointer, in bytes. Must be a power of two.
    pub pointer_width_bytes: u32,
    pub endianness: Endianness,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig { word_size: 8, pointer_width_bytes: 8, endianness: Endianness::Little }
    }
}

impl LayoutConfig {
    pub fn validated(self) -> Result<Self, ResolverError> {
        if !self.word_size.is_power_of_two() {
            return Err(ResolverError::InvalidLayout {
                field: "word_size",
                value: self.word_size,
            });
        }
        if !self.pointer_width_bytes.is_power_of_two() {
            return Err(ResolverError::InvalidLayout {
                field: "pointer_width_bytes",
                value: self.pointer_width_bytes,
            });
        }
        Ok(self)
    }

    pub fn from_toml(text: &str) -> Result<Self, ResolverError> {
        let cfg: LayoutConfig = toml::from_str(text)?;
        cfg.validated()
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianness.is_big_endian()
    }
}

/// The two check-suppression flags a caller can set to drop categories of obligation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub no_pointer_check: bool,
    pub no_bounds_check: bool,
}

impl CheckConfig {
    pub fn from_toml(text: &str) -> Result<Self, ResolverError> {
        Ok(toml::from_str(text)?)
    }
}

/// Recoverable configuration errors. Everything past a validated `Session`/`LayoutConfig` either
/// succeeds, emits an obligation, or panics on a contract violation — this is the only
/// `Result`-shaped surface this crate exposes.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("invalid layout config: {field} = {value} must be a power of two")]
    InvalidLayout { field: &'static str, value: u32 },
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        assert!(LayoutConfig::default().validated().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_word_size() {
        let cfg = LayoutConfig { word_size: 3, ..LayoutConfig::default() };
        assert!(matches!(cfg.validated(), Err(ResolverError::InvalidLayout { field: "word_size", .. })));
    }

    #[test]
    fn parses_from_toml() {
        let cfg = LayoutConfig::from_toml("word_size = 4\npointer_width_bytes = 4\nendianness = \"big\"\n").unwrap();
        assert_eq!(cfg.word_size, 4);
        assert!(cfg.is_big_endian());
    }
}
