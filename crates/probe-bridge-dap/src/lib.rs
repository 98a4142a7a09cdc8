//! probe-bridge-dap: Debug Adapter Protocol client for probe-rs.
//!
//! Transport, wire codec, session state machine and the host-facing
//! bridge that drives a `probe-rs dap-server` through a debug session.

pub mod breakpoint;
pub mod bridge;
pub mod capabilities;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export key types for convenience.
pub use breakpoint::{Breakpoint, BreakpointLocation, BreakpointManager};
pub use bridge::{DapBridge, StepKind};
pub use capabilities::DapCapabilities;
pub use codec::FrameDecoder;
pub use error::DapError;
pub use protocol::*;
pub use registry::SessionRegistry;
pub use session::{
    DapSession, PendingHandle, SessionEvent, SessionId, SessionState, StopSnapshot,
    TerminationReason,
};
pub use transport::{Connection, ConnectionGuard, Target, TransportEvent};
