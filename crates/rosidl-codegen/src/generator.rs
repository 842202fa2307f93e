//! Generation orchestration
//!
//! Drives one generation step: load the manifest, check the template mapping,
//! compute the staleness cutoff, then expand every mapped template for every
//! IDL file. The step is atomic: the first failure aborts the run.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::{
    error::{GenerationError, Result},
    idl::{IdlFile, IdlLocator, IdlParser, SourceIdlParser},
    manifest::{read_generator_arguments, GenerationManifest},
    naming::convert_camel_case_to_lower_case_underscore,
    staleness::newest_modification_time,
    templates::{ExpandOptions, ExpansionContext, PostProcess, WriteOutcome},
};

/// Substitution slot in an output file name pattern
pub const STEM_PLACEHOLDER: &str = "%s";

/// Ordered mapping from template file to output file name pattern
///
/// Patterns contain one `%s` slot that receives the IDL file stem, e.g.
/// `msg__struct.h.hbs` -> `%s__struct.h`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMapping {
    entries: Vec<(String, String)>,
}

impl TemplateMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template and its output pattern
    pub fn with(mut self, template: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.insert(template, pattern);
        self
    }

    /// Add a template and its output pattern, replacing an earlier pattern
    /// for the same template
    pub fn insert(&mut self, template: impl Into<String>, pattern: impl Into<String>) {
        let template = template.into();
        let pattern = pattern.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == template) {
            Some(entry) => entry.1 = pattern,
            None => self.entries.push((template, pattern)),
        }
    }

    /// Iterate over `(template, pattern)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(template, pattern)| (template.as_str(), pattern.as_str()))
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every template exists under `template_dir` and every pattern has
    /// exactly one stem slot
    pub fn validate(&self, template_dir: &Path) -> Result<()> {
        for (template, pattern) in self.iter() {
            if !template_dir.join(template).exists() {
                return Err(GenerationError::configuration(format!(
                    "Could not find template: {}",
                    template
                )));
            }
            if pattern.matches(STEM_PLACEHOLDER).count() != 1 {
                return Err(GenerationError::configuration(format!(
                    "Output pattern '{}' for template '{}' must contain exactly one '{}'",
                    pattern, template, STEM_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }
}

impl<T: Into<String>, P: Into<String>> FromIterator<(T, P)> for TemplateMapping {
    fn from_iter<I: IntoIterator<Item = (T, P)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (template, pattern) in iter {
            mapping.insert(template, pattern);
        }
        mapping
    }
}

/// Substitute `stem` into an output file name pattern
pub fn output_file_name(pattern: &str, stem: &str) -> String {
    pattern.replacen(STEM_PLACEHOLDER, stem, 1)
}

/// Options for a generation run
#[derive(Default)]
pub struct GenerateOptions<'a> {
    /// Extra entries merged into every render context, overriding the
    /// built-in ones on conflict
    pub additional_context: Map<String, Value>,
    /// Use IDL file stems verbatim instead of lower_case_underscore form
    pub keep_case: bool,
    /// Transform applied to every rendered output before it is written
    pub post_process: Option<&'a PostProcess>,
}

/// Lookups derived from a manifest, shared by all IDL files of a run
struct RunInputs<'m> {
    manifest: &'m GenerationManifest,
    minimum_timestamp: Option<SystemTime>,
    type_description_files: HashMap<String, PathBuf>,
    ros_interface_files: HashMap<(String, String), PathBuf>,
}

/// Generates source files from IDL files and templates
#[derive(Debug)]
pub struct FileGenerator<P: IdlParser = SourceIdlParser> {
    parser: P,
    expansion: ExpansionContext,
}

impl FileGenerator<SourceIdlParser> {
    /// Create a generator that exposes raw IDL source to templates
    pub fn new() -> Self {
        Self::with_parser(SourceIdlParser)
    }
}

impl Default for FileGenerator<SourceIdlParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: IdlParser> FileGenerator<P> {
    /// Create a generator using a custom IDL parser
    pub fn with_parser(parser: P) -> Self {
        Self {
            parser,
            expansion: ExpansionContext::new(),
        }
    }

    /// Replace the expansion context (render options, hooks)
    pub fn with_expansion(mut self, expansion: ExpansionContext) -> Self {
        self.expansion = expansion;
        self
    }

    /// Run the generation step described by a generator-arguments file
    ///
    /// Returns every targeted output path, whether or not its content changed.
    pub fn generate_files(
        &self,
        generator_arguments_file: impl AsRef<Path>,
        mapping: &TemplateMapping,
        options: &GenerateOptions<'_>,
    ) -> Result<Vec<PathBuf>> {
        let manifest = read_generator_arguments(generator_arguments_file)?;
        self.generate_from_manifest(&manifest, mapping, options)
    }

    /// Run the generation step described by an already loaded manifest
    pub fn generate_from_manifest(
        &self,
        manifest: &GenerationManifest,
        mapping: &TemplateMapping,
        options: &GenerateOptions<'_>,
    ) -> Result<Vec<PathBuf>> {
        mapping.validate(&manifest.template_dir)?;

        let inputs = RunInputs {
            manifest,
            minimum_timestamp: newest_modification_time(&manifest.target_dependencies)?,
            type_description_files: manifest.type_description_files()?,
            ros_interface_files: manifest.ros_interface_files(),
        };

        let mut generated_files = Vec::new();
        let mut written = 0;
        for entry in &manifest.idl_tuples {
            let (base_dir, relative_path) = entry.split()?;
            let locator = IdlLocator::new(base_dir, relative_path);

            let outcomes = self
                .generate_for_idl(&inputs, &locator, mapping, options)
                .map_err(|e| {
                    error!(
                        idl_file = %locator.absolute_path().display(),
                        error = %e,
                        "Error processing idl file"
                    );
                    e
                })?;

            for (path, outcome) in outcomes {
                if outcome == WriteOutcome::Written {
                    written += 1;
                }
                generated_files.push(path);
            }
        }

        info!(
            package = %manifest.package_name,
            targeted = generated_files.len(),
            written,
            "Generation finished"
        );
        Ok(generated_files)
    }

    fn generate_for_idl(
        &self,
        inputs: &RunInputs<'_>,
        locator: &IdlLocator,
        mapping: &TemplateMapping,
        options: &GenerateOptions<'_>,
    ) -> Result<Vec<(PathBuf, WriteOutcome)>> {
        let manifest = inputs.manifest;
        let relative_path = &locator.relative_path;
        debug!(idl_file = %relative_path.display(), "Processing idl file");

        let idl = self.parser.parse(locator)?;
        let type_description_info = load_type_description(inputs, relative_path)?;
        let type_source_file = type_source_file(inputs, &idl);

        let stem = relative_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GenerationError::configuration(format!(
                    "IDL path '{}' has no file name",
                    relative_path.display()
                ))
            })?;
        let output_stem = if options.keep_case {
            stem
        } else {
            convert_camel_case_to_lower_case_underscore(&stem)
        };
        let output_dir = match relative_path.parent() {
            Some(parent) => manifest.output_dir.join(parent),
            None => manifest.output_dir.clone(),
        };

        let mut outcomes = Vec::with_capacity(mapping.len());
        for (template, pattern) in mapping.iter() {
            let output = output_dir.join(output_file_name(pattern, &output_stem));

            let mut context = Map::new();
            context.insert("package_name".into(), Value::from(manifest.package_name.as_str()));
            context.insert(
                "interface_path".into(),
                Value::from(relative_path.to_string_lossy()),
            );
            context.insert("content".into(), idl.content.clone());
            context.insert("type_description_info".into(), type_description_info.clone());
            context.insert(
                "type_source_file".into(),
                Value::from(type_source_file.to_string_lossy()),
            );
            context.extend(options.additional_context.clone());

            let template_path = manifest.template_dir.join(template);
            let template_dir = template_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| manifest.template_dir.clone());
            let template_name = template_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| template.to_string());

            let outcome = self.expansion.expand(
                &template_name,
                &context,
                &output,
                &ExpandOptions {
                    minimum_timestamp: inputs.minimum_timestamp,
                    template_base_dir: Some(&template_dir),
                    post_process: options.post_process,
                },
            )?;
            outcomes.push((output, outcome));
        }

        Ok(outcomes)
    }
}

/// Run a generation step with the default [`FileGenerator`]
pub fn generate_files(
    generator_arguments_file: impl AsRef<Path>,
    mapping: &TemplateMapping,
    options: &GenerateOptions<'_>,
) -> Result<Vec<PathBuf>> {
    FileGenerator::new().generate_files(generator_arguments_file, mapping, options)
}

fn load_type_description(inputs: &RunInputs<'_>, relative_path: &Path) -> Result<Value> {
    if inputs.type_description_files.is_empty() {
        return Ok(Value::Null);
    }

    let key = relative_path.to_string_lossy();
    let side_file = inputs
        .type_description_files
        .get(key.as_ref())
        .ok_or_else(|| {
            GenerationError::configuration(format!(
                "No type description file listed for '{}'",
                key
            ))
        })?;

    let content = fs::read_to_string(side_file).map_err(|e| GenerationError::io(side_file, e))?;
    serde_json::from_str(&content).map_err(|e| GenerationError::parse(side_file, e))
}

/// Prefer the original interface file (e.g. `msg/Point.msg`) over the IDL
fn type_source_file(inputs: &RunInputs<'_>, idl: &IdlFile) -> PathBuf {
    let relative_path = &idl.locator.relative_path;
    let key = relative_path
        .parent()
        .and_then(Path::file_name)
        .zip(relative_path.file_stem())
        .map(|(dir, stem)| {
            (
                dir.to_string_lossy().into_owned(),
                stem.to_string_lossy().into_owned(),
            )
        });

    key.and_then(|key| inputs.ros_interface_files.get(&key).cloned())
        .unwrap_or_else(|| idl.absolute_path())
}
