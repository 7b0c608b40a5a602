//! Common utilities for integration tests
//!
//! Every test binary compiles this module on its own and uses a different
//! subset of it.
#![allow(dead_code)]

pub mod mock_schemes;
pub mod test_helpers;

// Re-export commonly used items
#[allow(unused_imports)]
pub use mock_schemes::{ConstantDrift, Frozen};
#[allow(unused_imports)]
pub use test_helpers::{
    assert_grids_close,
    left_half_config,
    relative_error,
    write_columns,
};
