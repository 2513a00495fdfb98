//! Core data types: variables, pair keys, Jacobian blocks, errors.

mod error;
mod jacobian;
mod pair;
mod variable;

pub use error::CheckError;
pub use jacobian::{DenseBlock, JacobianBlock};
pub use pair::PairKey;
pub use variable::{VarRole, Variable};
