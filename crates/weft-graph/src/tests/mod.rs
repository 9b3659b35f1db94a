//! Crate-level smoke tests exercising the types together.

mod smoke_tests;
