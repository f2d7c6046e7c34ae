//! Algorithm-variant selection.

use core::fmt;
use std::str::FromStr;

/// Environment variable naming the variant to run.
pub const CONFIG_ENV: &str = "STM_CONFIG";

/// Available STM algorithm variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Versioned-lock, encounter-time-locking, undo-logging STM.
    #[default]
    OrecEager,
}

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrecEager" | "orec_eager" => Ok(Variant::OrecEager),
            _ => Err(UnknownVariant),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::OrecEager => write!(f, "OrecEager"),
        }
    }
}

/// A variant name this build does not carry.
#[derive(Debug)]
pub struct UnknownVariant;

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stm variant")
    }
}

impl std::error::Error for UnknownVariant {}

impl Variant {
    /// Variant named by `STM_CONFIG`, or the default when unset or
    /// unrecognized.
    pub fn from_env() -> Variant {
        match std::env::var(CONFIG_ENV) {
            Ok(name) => name.parse().unwrap_or_else(|_| {
                tracing::warn!(%name, "unknown stm variant requested, using default");
                Variant::default()
            }),
            Err(_) => Variant::default(),
        }
    }
}
