//! Ephemeral classification of one playback error event.
//!
//! Faults are consumed synchronously by the recovery controller and never
//! persisted.

use std::fmt::{self, Display};

/// Coarse class of an engine-reported fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FaultClass {
    /// Segment or manifest delivery failed
    Network,
    /// Decode-level media error
    Media,
    /// The source cannot be played on this engine
    Unsupported,
    /// Anything the engine could not classify
    Unknown,
}

impl Display for FaultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultClass::Network => write!(f, "network"),
            FaultClass::Media => write!(f, "media"),
            FaultClass::Unsupported => write!(f, "unsupported"),
            FaultClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// One playback error event as reported by the media engine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamFault {
    pub class: FaultClass,
    pub fatal: bool,
    pub detail: String,
}

impl StreamFault {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Network,
            fatal: false,
            detail: detail.into(),
        }
    }

    pub fn media(detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Media,
            fatal: false,
            detail: detail.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Unsupported,
            fatal: true,
            detail: detail.into(),
        }
    }

    pub fn unknown(fatal: bool, detail: impl Into<String>) -> Self {
        Self {
            class: FaultClass::Unknown,
            fatal,
            detail: detail.into(),
        }
    }
}

impl Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.class, self.detail)
    }
}
