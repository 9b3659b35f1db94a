//! Crate-internal test suites with access to the private passes.
