//! Error types for the coordination engine

mod constructors;
mod types;

pub use types::{FleetError, FleetResult, OptionExt, ResultExt};
