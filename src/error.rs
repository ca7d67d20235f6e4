//! Error taxonomy for the bridge
//!
//! Only wrapper creation, transplant and configuration loading can fail.
//! Gray unmarking and generation tagging are infallible and never surface
//! one of these types.

use crate::heap::{CellId, DomainId};
use crate::native::NativeId;

/// Errors raised by wrapper creation and other fallible bridge operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A live wrapper is already cached for this (native, domain) pair
    DuplicateWrapper { native: NativeId, domain: DomainId },
    /// The heap refused to allocate the requested number of cells
    AllocationFailed { requested: usize, limit: usize },
    /// DOM-binding caches never hold lightweight wrappers
    LightweightDomBinding { native: NativeId },
    /// The domain was never created on this heap
    UnknownDomain(DomainId),
    /// The handle no longer refers to a live cell
    DeadCell(CellId),
    Transplant(TransplantError),
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateWrapper { native, domain } => write!(
                f,
                "native {} already has a live wrapper in domain {}",
                native, domain
            ),
            Self::AllocationFailed { requested, limit } => write!(
                f,
                "cannot allocate {} cell(s): heap limit of {} reached",
                requested, limit
            ),
            Self::LightweightDomBinding { native } => write!(
                f,
                "native {} uses a DOM binding and cannot get a lightweight wrapper",
                native
            ),
            Self::UnknownDomain(domain) => write!(f, "unknown domain {}", domain),
            Self::DeadCell(cell) => write!(f, "{} is no longer live", cell),
            Self::Transplant(err) => write!(f, "transplant failed: {}", err),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transplant(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransplantError> for BridgeError {
    fn from(err: TransplantError) -> Self {
        Self::Transplant(err)
    }
}

/// Reasons a transplant was refused
///
/// Every variant is raised before any heap or cache mutation, so the
/// original object and all of its holders stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransplantError {
    /// A handle no longer refers to a live cell
    DeadObject,
    /// A handle refers to a script or string cell
    NotAnObject,
    /// The source has already been turned into a forwarding proxy
    AlreadyForwarded,
    /// Source and target live in the same domain
    SameDomain,
    UnknownDomain,
    /// The paired objects of a wrapper transplant are in different domains
    DomainMismatch,
    /// An outer handle is not an outer proxy around its inner object
    NotAnOuterProxy,
    /// The supplied target object already carries a payload
    TargetNotBlank,
    /// The supplied target object has a different class than the source
    ClassMismatch,
    /// The native already has a live wrapper cached in the target domain
    CacheConflict,
    AllocationFailed,
}

impl core::fmt::Display for TransplantError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::DeadObject => "object is no longer live",
            Self::NotAnObject => "only objects can be transplanted",
            Self::AlreadyForwarded => "object is already a forwarding proxy",
            Self::SameDomain => "object already lives in the target domain",
            Self::UnknownDomain => "target domain does not exist",
            Self::DomainMismatch => "paired objects live in different domains",
            Self::NotAnOuterProxy => "outer handle is not an outer proxy for its object",
            Self::TargetNotBlank => "target object already holds a payload",
            Self::ClassMismatch => "target object has a different class",
            Self::CacheConflict => "native already has a wrapper in the target domain",
            Self::AllocationFailed => "allocation failed in the target domain",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for TransplantError {}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Serialize(String),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to access config: {}", err),
            Self::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            Self::Serialize(msg) => write!(f, "failed to serialize config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
