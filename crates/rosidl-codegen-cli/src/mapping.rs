// Parsing of template mappings and extra context from the command line

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use rosidl_codegen::TemplateMapping;
use serde_json::Value;

/// Parse a `TEMPLATE=PATTERN` argument
pub fn parse_template_arg(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((template, pattern)) if !template.is_empty() && !pattern.is_empty() => {
            Ok((template.to_string(), pattern.to_string()))
        }
        _ => Err(format!("expected TEMPLATE=PATTERN, got '{}'", arg)),
    }
}

/// Parse a `KEY=VALUE` argument; VALUE is JSON when it parses as JSON
pub fn parse_context_arg(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Load a template mapping from a YAML (or JSON) file, keeping file order
pub fn load_mapping_file(path: &Path) -> Result<TemplateMapping> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file {}", path.display()))?;
    let entries: serde_yaml::Mapping = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse mapping file {}", path.display()))?;

    entries
        .into_iter()
        .map(|(template, pattern)| -> Result<(String, String)> {
            let template = template
                .as_str()
                .ok_or_else(|| anyhow!("Template names in {} must be strings", path.display()))?
                .to_string();
            let pattern = pattern
                .as_str()
                .ok_or_else(|| anyhow!("Output pattern for '{}' must be a string", template))?
                .to_string();
            Ok((template, pattern))
        })
        .collect()
}

/// Combine a mapping file with `--template` flags; flags win on conflict
pub fn build_mapping(
    mapping_file: Option<&Path>,
    templates: &[(String, String)],
) -> Result<TemplateMapping> {
    let mut mapping = match mapping_file {
        Some(path) => load_mapping_file(path)?,
        None => TemplateMapping::new(),
    };
    for (template, pattern) in templates {
        mapping.insert(template.as_str(), pattern.as_str());
    }
    if mapping.is_empty() {
        bail!("No templates given; pass --template TEMPLATE=PATTERN or --mapping-file");
    }
    Ok(mapping)
}
