//! # deriv_core
//!
//! Core modeling types for derivative verification: variables, Jacobian
//! blocks, the component interface, and the executable group harness.
//!
//! This crate defines the surface a model must expose to be checked:
//! components declare inputs, outputs, and partials; a [`model::Group`]
//! wires them into an executable chain; [`state::StateGuard`] guarantees
//! that verification sweeps leave the model state exactly as found.
//!
//! The checking engine itself lives in the companion `deriv_check` crate.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod component;
pub mod model;
pub mod state;
pub mod types;

pub use component::{Capabilities, Component, PartialBlocks, PartialDecl};
pub use model::{abs_name, Group, VarSubset};
pub use state::{ModelState, StateGuard, Values};
pub use types::{CheckError, DenseBlock, JacobianBlock, PairKey, VarRole, Variable};
