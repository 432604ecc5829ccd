//! Session state, aggregation and lifecycle

pub mod aggregator;
pub mod manager;
pub mod sampler;
pub mod state;

pub use aggregator::SummaryBuilder;
pub use manager::SessionManager;
pub use sampler::{FrameSampler, SampleDecision};
pub use state::{SessionPhase, SessionState};
