// rosidl-codegen CLI Library

pub mod cli;
pub mod logging;
pub mod mapping;

pub use cli::{run, Cli};
pub use logging::{init_logging, VerbosityLevel};
