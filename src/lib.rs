//! A small classical molecular dynamics engine for single-species noble-gas
//! systems: Lennard-Jones / soft-sphere / collision-only potentials, NVT via
//! a Nose-Hoover chain, and NPT via an MTTK isotropic barostat.
//!
//! The crate is organised bottom-up: `constants`, `boundary` and
//! `potential` describe the physics primitives; `state`, `neighbor` and
//! `forces` combine them into a full force evaluation; `placement`,
//! `velocities`, `thermostat`, `barostat`, `observables` and `integrator`
//! build the per-step machinery; `engine` drives the whole thing through
//! its public lifecycle.

pub mod barostat;
pub mod boundary;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod neighbor;
pub mod observables;
pub mod placement;
pub mod potential;
pub mod state;
pub mod thermostat;
pub mod velocities;

pub use config::{Ensemble, SimConfig};
pub use constants::Species;
pub use engine::{Engine, Snapshot};
pub use error::{EngineError, EngineState};
pub use observables::Observables;
