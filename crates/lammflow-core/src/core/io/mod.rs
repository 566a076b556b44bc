//! Writers for the file formats the engine reads back.

pub mod data_file;
