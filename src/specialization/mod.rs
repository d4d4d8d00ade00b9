//! Specialization: the one-time transition from a pre-warmed placeholder host
//! into a tenant-specialized one.
//!
//! - [`SpecializationCoordinator`]: CAS-guarded, exactly-once driver
//! - [`StandbyEnvironment`], [`Specializer`]: external collaborators
//! - [`spawn_detached`]: host-lifetime execution with an explicitly fresh context

mod coordinator;
mod detached;

pub use coordinator::{
    SpecializationCoordinator, SpecializationState, Specializer, StandbyEnvironment,
};
pub use detached::spawn_detached;
