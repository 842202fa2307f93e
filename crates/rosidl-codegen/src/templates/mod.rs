//! Template expansion module
//!
//! Provides template lookup on a search path, handlebars rendering with
//! nested includes and lifecycle hooks, and incremental output writing.

pub mod engine;
pub mod hooks;
pub mod search_path;
pub mod writer;

// Re-export public API
pub use engine::{
    expand_template, ExpandOptions, ExpansionContext, PostProcess, RenderOptions,
    TemplateIncluder, INCLUDE_HELPER,
};
pub use hooks::{ExpansionHooks, TracingHooks};
pub use search_path::{SearchPathGuard, TemplateSearchPath};
pub use writer::{ensure_directory, is_up_to_date, remove_output, write_if_changed, WriteOutcome};
