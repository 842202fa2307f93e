#![warn(missing_docs)]

//! Template-driven source generation from IDL interface descriptions
//!
//! Given a generator-arguments manifest listing IDL files, a template
//! directory and an output directory, renders one or more templates per IDL
//! file and writes the results, leaving unchanged outputs untouched so that
//! incremental builds stay incremental.

pub mod error;
pub mod generator;
pub mod idl;
pub mod manifest;
pub mod naming;
pub mod staleness;
pub mod templates;

// Re-export public API
pub use error::{GenerationError, Result};
pub use generator::{
    generate_files, output_file_name, FileGenerator, GenerateOptions, TemplateMapping,
};
pub use idl::{IdlFile, IdlLocator, IdlParser, SourceIdlParser};
pub use manifest::{
    read_generator_arguments, GenerationManifest, IdlTupleEntry, TypeDescriptionEntry,
};
pub use naming::convert_camel_case_to_lower_case_underscore;
pub use staleness::newest_modification_time;
pub use templates::{
    expand_template, ExpandOptions, ExpansionContext, ExpansionHooks, PostProcess,
    RenderOptions, TemplateIncluder, TemplateSearchPath, TracingHooks, WriteOutcome,
};
