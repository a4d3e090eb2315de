use std::fmt;

use crate::ports::PortId;

/// Host-side API errors. Nothing in this enum ever crosses the bridge
/// boundary; every boundary-facing call path returns a structurally
/// valid (possibly empty) envelope instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// An async dispatch reused a port id that is still awaiting its
    /// completion.
    DuplicatePort(PortId),
    /// A completion arrived for a port id with no pending call, or one
    /// that was already completed.
    StrayCompletion(PortId),
    /// The target endpoint's dispatch worker is gone; the call was not
    /// dispatched.
    Shutdown,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::DuplicatePort(port) => {
                write!(f, "port {port} already has a pending call")
            }
            BridgeError::StrayCompletion(port) => {
                write!(f, "stray completion for port {port}")
            }
            BridgeError::Shutdown => write!(f, "bridge dispatch worker is shut down"),
        }
    }
}

impl std::error::Error for BridgeError {}
