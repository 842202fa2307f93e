// Command-line interface

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rosidl_codegen::{ExpansionContext, FileGenerator, GenerateOptions, RenderOptions};
use serde_json::Value;

use crate::{
    logging::VerbosityLevel,
    mapping::{build_mapping, parse_context_arg, parse_template_arg},
};

/// Generate source files from IDL interface descriptions and templates
#[derive(Parser, Debug)]
#[command(name = "rosidl-codegen")]
#[command(version)]
#[command(about = "Generate source files from IDL interface descriptions and templates")]
pub struct Cli {
    /// Generator-arguments JSON file written by the build system
    #[arg(long, value_name = "FILE")]
    pub generator_arguments_file: PathBuf,

    /// Template and output file pattern, e.g. msg__struct.h.hbs=%s__struct.h
    #[arg(short = 't', long = "template", value_name = "TEMPLATE=PATTERN", value_parser = parse_template_arg)]
    pub templates: Vec<(String, String)>,

    /// YAML or JSON file mapping templates to output file patterns
    #[arg(long, value_name = "FILE")]
    pub mapping_file: Option<PathBuf>,

    /// Extra render context entry; VALUE is parsed as JSON when possible
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_context_arg)]
    pub context: Vec<(String, Value)>,

    /// Keep the IDL file stem's case in output file names
    #[arg(long)]
    pub keep_case: bool,

    /// Render undefined template variables as empty instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Print every targeted output path on stdout
    #[arg(long)]
    pub print_outputs: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Verbosity selected by the flags
    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }
}

/// Run one generation step and return the targeted output paths
pub fn run(cli: &Cli) -> Result<Vec<PathBuf>> {
    let mapping = build_mapping(cli.mapping_file.as_deref(), &cli.templates)?;

    let options = GenerateOptions {
        additional_context: cli.context.iter().cloned().collect(),
        keep_case: cli.keep_case,
        post_process: None,
    };
    let expansion = ExpansionContext::with_options(RenderOptions {
        strict: !cli.lenient,
    });

    let generated = FileGenerator::new()
        .with_expansion(expansion)
        .generate_files(&cli.generator_arguments_file, &mapping, &options)
        .with_context(|| {
            format!(
                "Generation failed for {}",
                cli.generator_arguments_file.display()
            )
        })?;

    if cli.print_outputs {
        for path in &generated {
            println!("{}", path.display());
        }
    }
    Ok(generated)
}
