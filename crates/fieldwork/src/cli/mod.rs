//! CLI module for odk2osm
//!
//! Argument merging, human and JSON output, and error presentation for the
//! conversion command.

pub mod convert;
pub mod error;
pub mod output;
