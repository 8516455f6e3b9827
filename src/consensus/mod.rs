//! The block DAG, its admission rules, and the genesis sentinel.

pub mod chain;
pub mod genesis;
pub mod validator;

pub use chain::{ChainState, ChainStore};
pub use validator::{check_op_admission, validate_block, ValidationFailure};
