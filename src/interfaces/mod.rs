//! Outer surfaces: CSV command files and the batch driver behind the binary.

pub mod batch;
pub mod csv;
