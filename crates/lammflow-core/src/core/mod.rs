//! Stateless foundation: data models, static lookup tables and file writers.

pub mod io;
pub mod models;
pub mod tables;
