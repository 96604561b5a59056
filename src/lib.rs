//! sciplan - submit, monitor and collect scientific application runs
//!
//! A [`Plan`] is an ordered set of [`Task`]s. Each task is bound to one
//! [`Runtime`]: `Mock` simulates a run in process, `Remote` submits through
//! a science gateway and reaches the job's on-node agent for file and script
//! operations, falling back to mounted storage while the agent is away.
//!
//! Every operation takes an explicit [`Context`] carrying credentials and
//! the gateway, agent, transport and plan-store collaborators.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod plan;
pub mod progress;
pub mod runtime;
pub mod task;
pub mod transport;
pub mod version;

#[cfg(test)]
mod testing;

pub use context::{Context, Credentials, GatewayProfile};
pub use error::{Error, ErrorCode, Result};
pub use plan::{LaunchReport, Plan, PlanStore, Stage, StageFailure, WaitOutcome};
pub use runtime::{is_terminal, ExperimentState, Runtime, RuntimeOps, Signal};
pub use task::{InputValue, Task};
