//! Input-side data models: job parameters, structures and potentials.

pub mod args;
pub mod parameters;
pub mod potential;
pub mod structure;
