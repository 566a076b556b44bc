//! # lammflow Core Library
//!
//! A typed front-end for the LAMMPS molecular dynamics engine: it compiles a
//! declarative, structured job description into a valid LAMMPS input script,
//! parses the engine's console log, trajectory dump and final-variables side
//! file back into structured records, and layers a restart/recovery state
//! machine on top that can resume a failed or truncated run.
//!
//! ## Architectural Philosophy
//!
//! The library is designed as a stack of pure, independently testable layers:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ParameterSet`,
//!   `Structure`, `Potential`), the static unit/keyword tables LAMMPS
//!   semantics are looked up in, and the data-file writer.
//!
//! - **[`script`]: The Compiler.** Pure block generators, one per logical
//!   input-script section, composed in a fixed order into one script text.
//!
//! - **[`parse`]: The Readers.** Single-pass parsers for the console log,
//!   the per-step trajectory dump and the final-variables side file.
//!
//! - **[`store`]: The Trajectory Store.** Each parsed step packaged as an
//!   independently compressed, randomly addressable record.
//!
//! - **[`workflows`]: The Public API.** The restart/recovery state machine
//!   and the bounded-retry driver that ties compiler, engine and parsers
//!   together for one job lifecycle.
//!
//! LAMMPS itself is an external black box behind the
//! [`workflows::run::LammpsEngine`] trait; this library only speaks its two
//! textual protocols (input-script DSL in, log/dump text out).

pub mod core;
pub mod parse;
pub mod script;
pub mod store;
pub mod workflows;
