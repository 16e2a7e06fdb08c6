//! Lifecycle component tying the session, converters and ports together.
//!
//! An external scheduler calls the [`Lifecycle`] hooks: initialize once,
//! then any number of activate/execute.../deactivate cycles, then finalize.

mod camera;
mod factory;
mod poller;

pub use camera::{AcquisitionStats, DepthCamera};
pub use factory::{ComponentFactory, InstanceGuard, MAX_INSTANCES};
pub use poller::{FramePoller, TickReport};

use crate::config::ConfigError;
use crate::sensor::SessionError;
use std::fmt;
use thiserror::Error;

/// Component lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Created,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentState::Created => "created",
            ComponentState::Inactive => "inactive",
            ComponentState::Active => "active",
            ComponentState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to the lifecycle caller.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("cannot {hook} while component is {state}")]
    InvalidState {
        hook: &'static str,
        state: ComponentState,
    },
    #[error("instance limit reached (max {max})")]
    InstanceLimit { max: usize },
}

/// Hooks invoked by the execution context.
pub trait Lifecycle {
    /// Opens the sensor and creates its generators.
    fn on_initialize(&mut self) -> Result<(), ComponentError>;

    /// Releases the sensor. Never fails once teardown has begun.
    fn on_finalize(&mut self) -> Result<(), ComponentError>;

    /// Applies configuration, reads calibration and starts generation.
    fn on_activated(&mut self) -> Result<(), ComponentError>;

    /// Stops generation.
    fn on_deactivated(&mut self) -> Result<(), ComponentError>;

    /// Runs one tick.
    fn on_execute(&mut self) -> Result<TickReport, ComponentError>;
}
