//! Kernel variant detection and process-wide selection.
//!
//! Every kernel exists in a portable form and, where the host allows it, in a
//! 128-bit SSE form (x86_64) or a NEON form (aarch64). The variant is picked
//! once per process and never changes afterwards.

use std::{fmt, str::FromStr, sync::OnceLock};

use crate::error::{Result, TrussworkError};

#[cfg(target_arch = "aarch64")]
pub(crate) mod neon;
#[cfg(target_arch = "x86_64")]
pub(crate) mod sse;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    Portable,
    Sse,
    Neon,
}

impl KernelVariant {
    /// The most capable variant this host can run.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::arch::is_x86_feature_detected!("sse2") {
                return Self::Sse;
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return Self::Neon;
            }
        }

        Self::Portable
    }

    pub fn is_available(self) -> bool {
        match self {
            Self::Portable => true,
            #[cfg(target_arch = "x86_64")]
            Self::Sse => std::arch::is_x86_feature_detected!("sse2"),
            #[cfg(target_arch = "aarch64")]
            Self::Neon => std::arch::is_aarch64_feature_detected!("neon"),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    /// Every variant that can run on this host, portable first.
    pub fn available() -> impl Iterator<Item = KernelVariant> {
        [Self::Portable, Self::Sse, Self::Neon]
            .into_iter()
            .filter(|v| v.is_available())
    }
}

impl Default for KernelVariant {
    fn default() -> Self {
        Self::detect()
    }
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Portable => "portable",
            Self::Sse => "sse",
            Self::Neon => "neon",
        };
        f.write_str(name)
    }
}

impl FromStr for KernelVariant {
    type Err = TrussworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portable" => Ok(Self::Portable),
            "sse" => Ok(Self::Sse),
            "neon" => Ok(Self::Neon),
            _ => Err(TrussworkError::UnknownVariant(s.to_owned())),
        }
    }
}

static SELECTED: OnceLock<KernelVariant> = OnceLock::new();

/// Fixes the kernel variant for the rest of the process.
///
/// `None` selects [`KernelVariant::detect`]. Calling again with the variant
/// already in place is a no-op; asking for a different one is an error.
pub fn init(requested: Option<KernelVariant>) -> Result<KernelVariant> {
    let requested = requested.unwrap_or_else(KernelVariant::detect);
    if !requested.is_available() {
        return Err(TrussworkError::UnsupportedVariant(requested));
    }

    let current = *SELECTED.get_or_init(|| {
        log::info!("Selected {} structural kernels", requested);
        requested
    });

    if current != requested {
        return Err(TrussworkError::AlreadyInitialized { current, requested });
    }

    Ok(current)
}

/// The variant the dispatching kernels run, initialising it on first use.
#[inline]
pub fn selected() -> KernelVariant {
    *SELECTED.get_or_init(|| {
        let variant = KernelVariant::detect();
        log::info!("Selected {} structural kernels (detected)", variant);
        variant
    })
}
