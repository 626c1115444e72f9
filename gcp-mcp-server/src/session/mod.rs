//! Session bookkeeping
//!
//! Session identifiers are unpredictable, rotate, and expire. The registry is
//! an explicitly constructed object shared through `Arc`; its expiry sweep is
//! a cancellable task tied to the registry's lifetime.

mod registry;
mod sweeper;
pub mod token;

pub use registry::{
    SessionMetadata, SessionRecord, SessionRegistry, SessionStats, DEFAULT_SESSION_LIFETIME,
    DEFAULT_SWEEP_INTERVAL, MAX_ROTATIONS,
};
pub use sweeper::SweeperHandle;
pub use token::{generate_secure_token, generate_session_id};
