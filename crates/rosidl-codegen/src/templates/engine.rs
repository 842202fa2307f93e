//! Template expansion
//!
//! Renders templates with handlebars and writes the result incrementally.
//! Templates can include other templates with the `TEMPLATE` helper:
//!
//! ```text
//! {{TEMPLATE "msg__struct.h.hbs" message=content package_name=package_name}}
//! ```
//!
//! The nested template is looked up on the expansion's
//! [`TemplateSearchPath`], rendered against the helper's hash arguments only,
//! and its output is written at the call site.

use std::{fmt, fs, path::Path, sync::Arc, time::SystemTime};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::{
    error::{GenerationError, Result},
    naming::convert_camel_case_to_lower_case_underscore,
    templates::{
        hooks::{ExpansionHooks, TracingHooks},
        search_path::{split_template_path, TemplateSearchPath},
        writer::{self, WriteOutcome},
    },
};

/// Name of the helper templates use to include other templates
pub const INCLUDE_HELPER: &str = "TEMPLATE";

/// Transform applied to rendered text before the write decision
pub type PostProcess = dyn Fn(String) -> String;

/// Render engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Referencing an undefined variable is a render error
    pub strict: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Per-call options for [`ExpansionContext::expand`]
#[derive(Default)]
pub struct ExpandOptions<'a> {
    /// Newest dependency timestamp; outputs not newer than this are rewritten
    pub minimum_timestamp: Option<SystemTime>,
    /// Directory to resolve the template name in; when absent the template
    /// name is itself treated as a path
    pub template_base_dir: Option<&'a Path>,
    /// Applied to the rendered text before it is compared and written
    pub post_process: Option<&'a PostProcess>,
}

/// Capability for rendering a named template with its own context
pub trait TemplateIncluder {
    /// Render `template_name` against `context` and return the text
    fn include(&self, template_name: &str, context: &Map<String, Value>) -> Result<String>;
}

/// Render configuration and hooks shared by every expansion
///
/// Holds no per-call state: each call to [`expand`](Self::expand) gets its
/// own search path, so one context can serve concurrent expansions.
pub struct ExpansionContext {
    hooks: Arc<dyn ExpansionHooks>,
    options: RenderOptions,
}

impl ExpansionContext {
    /// Create a context with default render options and tracing hooks
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    /// Create a context with custom render options
    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            hooks: Arc::new(TracingHooks),
            options,
        }
    }

    /// Replace the lifecycle hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn ExpansionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Expand a template into `output`
    ///
    /// On a render failure any existing file at `output` is removed so that a
    /// stale artifact never outlives a failed regeneration. Failures inside
    /// nested templates surface with their own variant (`TemplateNotFound`,
    /// `IncludeRender`, ...). The output is left untouched when it already
    /// holds the rendered content and is newer than
    /// `options.minimum_timestamp`.
    pub fn expand(
        &self,
        template_name: &str,
        context: &Map<String, Value>,
        output: &Path,
        options: &ExpandOptions<'_>,
    ) -> Result<WriteOutcome> {
        let (base_dir, template_name) = match options.template_base_dir {
            Some(base_dir) => (base_dir.to_path_buf(), template_name.to_string()),
            None => split_template_path(template_name)?,
        };

        let expansion = Expansion::new(self);
        let rendered = {
            let _guard = expansion.search_path.push(base_dir);
            let template_path = expansion.search_path.resolve(&template_name)?;
            expansion.render_file(&template_name, &template_path, context, output)
        };

        let content = match rendered {
            Ok(content) => content,
            Err(err) => {
                if let Err(remove_err) = writer::remove_output(output) {
                    warn!(output = %output.display(), error = %remove_err, "Failed to remove stale output");
                }
                error!(
                    template = %template_name,
                    output = %output.display(),
                    error = %err,
                    "{} when expanding template",
                    err.kind()
                );
                return Err(err);
            }
        };

        let content = match options.post_process {
            Some(post_process) => post_process(content),
            None => content,
        };

        writer::write_if_changed(output, &content, options.minimum_timestamp)
    }
}

/// One top-level expansion in progress, shared with its nested includes
struct Expansion<'a> {
    context: &'a ExpansionContext,
    search_path: TemplateSearchPath,
    /// Error raised by the innermost failing include, handed up through
    /// each enclosing render
    nested_failure: Mutex<Option<GenerationError>>,
}

impl<'a> Expansion<'a> {
    fn new(context: &'a ExpansionContext) -> Self {
        Self {
            context,
            search_path: TemplateSearchPath::new(),
            nested_failure: Mutex::new(None),
        }
    }

    fn render_file(
        &self,
        template_name: &str,
        template_path: &Path,
        context: &Map<String, Value>,
        output: &Path,
    ) -> Result<String> {
        let template = read_template(template_path)?;

        self.context.hooks.before_file(template_name, template_path);
        let rendered = self
            .render(template_path, &template, context)
            .map_err(|e| {
                self.take_nested_failure()
                    .unwrap_or_else(|| GenerationError::Render {
                        template: template_name.to_string(),
                        output: output.to_path_buf(),
                        message: e.to_string(),
                    })
            })?;
        self.context.hooks.after_file(template_name);

        Ok(rendered)
    }

    /// Render `template` with a fresh engine instance bound to this expansion
    ///
    /// The template is registered under its path so engine diagnostics name
    /// the file and position that failed.
    fn render(
        &self,
        template_path: &Path,
        template: &str,
        context: &Map<String, Value>,
    ) -> std::result::Result<String, RenderError> {
        let name = template_path.display().to_string();
        let mut registry = self.registry();
        registry.register_template_string(&name, template)?;
        registry.render(&name, context)
    }

    fn registry(&self) -> Handlebars<'_> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.context.options.strict);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper(INCLUDE_HELPER, Box::new(IncludeHelper { includer: self }));
        registry.register_helper("lower_case_underscore", Box::new(lower_case_underscore_helper));
        registry.register_helper("upper", Box::new(upper_helper));
        registry.register_helper("lower", Box::new(lower_helper));
        registry
    }

    fn record_nested_failure(&self, err: GenerationError) {
        *self.nested_failure.lock() = Some(err);
    }

    fn take_nested_failure(&self) -> Option<GenerationError> {
        self.nested_failure.lock().take()
    }
}

impl TemplateIncluder for Expansion<'_> {
    fn include(&self, template_name: &str, context: &Map<String, Value>) -> Result<String> {
        let template_path = self.search_path.resolve(template_name)?;
        let base_dir = template_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let _guard = self.search_path.push(base_dir);

        let template = read_template(&template_path)?;
        self.context.hooks.before_include(&template_path);
        let rendered = self
            .render(&template_path, &template, context)
            .map_err(|e| match self.take_nested_failure() {
                Some(nested) => nested,
                None => {
                    error!(template = %template_path.display(), error = %e, "Render error in nested template");
                    GenerationError::IncludeRender {
                        template: template_path.clone(),
                        message: e.to_string(),
                    }
                }
            })?;
        self.context.hooks.after_include(&template_path);

        Ok(rendered)
    }
}

impl Default for ExpansionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExpansionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpansionContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Expand a template with a fresh [`ExpansionContext`]
pub fn expand_template(
    template_name: &str,
    context: &Map<String, Value>,
    output: &Path,
    options: &ExpandOptions<'_>,
) -> Result<WriteOutcome> {
    ExpansionContext::new().expand(template_name, context, output, options)
}

fn read_template(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Reading template");
    fs::read_to_string(path).map_err(|e| GenerationError::io(path, e))
}

/// Exposes an [`Expansion`] to templates as the `TEMPLATE` helper
struct IncludeHelper<'a, 'ctx> {
    includer: &'a Expansion<'ctx>,
}

impl HelperDef for IncludeHelper<'_, '_> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let template_name = h
            .param(0)
            .and_then(|v| v.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(INCLUDE_HELPER, 0))?;

        let context: Map<String, Value> = h
            .hash()
            .iter()
            .map(|(key, value)| (key.to_string(), value.value().clone()))
            .collect();

        match self.includer.include(template_name, &context) {
            Ok(rendered) => {
                out.write(&rendered)?;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.includer.record_nested_failure(e);
                Err(RenderErrorReason::Other(message).into())
            }
        }
    }
}

fn lower_case_underscore_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&convert_camel_case_to_lower_case_underscore(param))?;
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&param.to_lowercase())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("context must be an object"),
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl ExpansionHooks for RecordingHooks {
        fn before_file(&self, template_name: &str, _: &Path) {
            self.events.lock().push(format!("before_file:{}", template_name));
        }

        fn after_file(&self, template_name: &str) {
            self.events.lock().push(format!("after_file:{}", template_name));
        }

        fn before_include(&self, template_path: &Path) {
            let name = template_path.file_name().unwrap().to_string_lossy();
            self.events.lock().push(format!("before_include:{}", name));
        }

        fn after_include(&self, template_path: &Path) {
            let name = template_path.file_name().unwrap().to_string_lossy();
            self.events.lock().push(format!("after_include:{}", name));
        }
    }

    #[test]
    fn test_expand_renders_without_escaping() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "#include <{{header}}>\n").unwrap();
        let output = dir.path().join("out/t.h");

        let outcome = ExpansionContext::new()
            .expand(
                "t.hbs",
                &context(json!({"header": "pkg/msg/point.h"})),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&output).unwrap(), "#include <pkg/msg/point.h>\n");
    }

    #[test]
    fn test_expand_legacy_path_convention() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "{{name}}").unwrap();
        let output = dir.path().join("t.txt");
        let template = dir.path().join("t.hbs");

        expand_template(
            template.to_str().unwrap(),
            &context(json!({"name": "Point"})),
            &output,
            &ExpandOptions::default(),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "Point");
    }

    #[test]
    fn test_nested_include_uses_only_hash_context() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("outer.hbs"),
            "begin {{TEMPLATE \"inner.hbs\" type=name}} end",
        )
        .unwrap();
        fs::write(dir.path().join("inner.hbs"), "[{{type}}]").unwrap();
        let output = dir.path().join("out.txt");

        ExpansionContext::new()
            .expand(
                "outer.hbs",
                &context(json!({"name": "Point"})),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "begin [Point] end");
    }

    #[test]
    fn test_nested_include_does_not_inherit_parent_context() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("outer.hbs"), "{{TEMPLATE \"inner.hbs\"}}").unwrap();
        fs::write(dir.path().join("inner.hbs"), "{{name}}").unwrap();
        let output = dir.path().join("out.txt");

        let result = ExpansionContext::new().expand(
            "outer.hbs",
            &context(json!({"name": "Point"})),
            &output,
            &ExpandOptions {
                template_base_dir: Some(dir.path()),
                ..Default::default()
            },
        );

        match result {
            Err(GenerationError::IncludeRender { template, .. }) => {
                assert_eq!(template, dir.path().join("inner.hbs"));
            }
            other => panic!("expected IncludeRender, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_include_resolves_next_to_including_template() {
        let root = TempDir::new().unwrap();
        let sub = root.path().join("detail");
        fs::create_dir_all(&sub).unwrap();
        fs::write(root.path().join("top.hbs"), "{{TEMPLATE \"detail/mid.hbs\"}}").unwrap();
        fs::write(sub.join("mid.hbs"), "mid:{{TEMPLATE \"leaf.hbs\"}}").unwrap();
        fs::write(sub.join("leaf.hbs"), "detail-leaf").unwrap();
        fs::write(root.path().join("leaf.hbs"), "root-leaf").unwrap();
        let output = root.path().join("out.txt");

        let expansion = ExpansionContext::new();
        expansion
            .expand(
                "top.hbs",
                &Map::new(),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(root.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "mid:detail-leaf");
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let dir = TempDir::new().unwrap();
        let expansion = ExpansionContext::new();
        let result = expansion.expand(
            "missing.hbs",
            &Map::new(),
            &dir.path().join("out.txt"),
            &ExpandOptions {
                template_base_dir: Some(dir.path()),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(GenerationError::TemplateNotFound(_))));
    }

    #[test]
    fn test_render_failure_removes_existing_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "{{undefined_variable}}").unwrap();
        let output = dir.path().join("out.txt");
        fs::write(&output, "previous generation").unwrap();

        let expansion = ExpansionContext::new();
        let result = expansion.expand(
            "t.hbs",
            &Map::new(),
            &output,
            &ExpandOptions {
                template_base_dir: Some(dir.path()),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(GenerationError::Render { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_nested_template_keeps_its_variant() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.hbs"), "{{TEMPLATE \"b.hbs\"}}").unwrap();
        fs::write(dir.path().join("b.hbs"), "{{TEMPLATE \"c.hbs\"}}").unwrap();
        fs::write(dir.path().join("c.hbs"), "{{TEMPLATE \"missing.hbs\"}}").unwrap();
        let output = dir.path().join("out.txt");
        fs::write(&output, "previous generation").unwrap();

        let err = ExpansionContext::new()
            .expand(
                "a.hbs",
                &Map::new(),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, GenerationError::TemplateNotFound(ref name) if name == "missing.hbs"));
        assert!(!output.exists());
    }

    #[test]
    fn test_strict_failure_two_levels_down_is_include_render() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.hbs"), "a:{{TEMPLATE \"b.hbs\"}}").unwrap();
        fs::write(dir.path().join("b.hbs"), "b:{{TEMPLATE \"c.hbs\"}}").unwrap();
        fs::write(dir.path().join("c.hbs"), "c:\n{{undefined}}").unwrap();
        let output = dir.path().join("out.txt");
        fs::write(&output, "previous generation").unwrap();

        let err = ExpansionContext::new()
            .expand(
                "a.hbs",
                &Map::new(),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        match err {
            GenerationError::IncludeRender { template, message } => {
                assert_eq!(template, dir.path().join("c.hbs"));
                assert!(message.contains("line 2"), "{}", message);
            }
            other => panic!("expected IncludeRender, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_render_error_names_template_and_position() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "ok\n  {{undefined_variable}}").unwrap();

        let err = ExpansionContext::new()
            .expand(
                "t.hbs",
                &Map::new(),
                &dir.path().join("out.txt"),
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        match err {
            GenerationError::Render { message, .. } => {
                let template_path = dir.path().join("t.hbs").display().to_string();
                assert!(message.contains(&template_path), "{}", message);
                assert!(message.contains("line 2, col 3"), "{}", message);
            }
            other => panic!("expected Render, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_expansions_keep_separate_search_paths() {
        struct Rendezvous(Barrier);

        impl ExpansionHooks for Rendezvous {
            fn before_file(&self, _: &str, _: &Path) {
                self.0.wait();
            }
        }

        let root = TempDir::new().unwrap();
        for side in ["a", "b"] {
            let dir = root.path().join(side);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("outer.hbs"), "{{TEMPLATE \"leaf.hbs\"}}").unwrap();
            fs::write(dir.join("leaf.hbs"), format!("{}-leaf", side)).unwrap();
        }

        let expansion =
            ExpansionContext::new().with_hooks(Arc::new(Rendezvous(Barrier::new(2))));
        std::thread::scope(|scope| {
            for side in ["a", "b"] {
                let expansion = &expansion;
                let root = root.path();
                scope.spawn(move || {
                    expansion
                        .expand(
                            "outer.hbs",
                            &Map::new(),
                            &root.join(format!("{}.txt", side)),
                            &ExpandOptions {
                                template_base_dir: Some(&root.join(side)),
                                ..Default::default()
                            },
                        )
                        .unwrap();
                });
            }
        });

        assert_eq!(fs::read_to_string(root.path().join("a.txt")).unwrap(), "a-leaf");
        assert_eq!(fs::read_to_string(root.path().join("b.txt")).unwrap(), "b-leaf");
    }

    #[test]
    fn test_lenient_mode_renders_missing_as_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "[{{undefined_variable}}]").unwrap();
        let output = dir.path().join("out.txt");

        ExpansionContext::with_options(RenderOptions { strict: false })
            .expand(
                "t.hbs",
                &Map::new(),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "[]");
    }

    #[test]
    fn test_post_process_applied_before_write() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.hbs"), "value = {{v}}").unwrap();
        let output = dir.path().join("out.txt");
        let append_newline = |content: String| content + "\n";

        ExpansionContext::new()
            .expand(
                "t.hbs",
                &context(json!({"v": 3})),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    post_process: Some(&append_newline),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "value = 3\n");
    }

    #[test]
    fn test_builtin_helpers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("t.hbs"),
            "{{lower_case_underscore name}} {{upper name}} {{lower name}}",
        )
        .unwrap();
        let output = dir.path().join("out.txt");

        ExpansionContext::new()
            .expand(
                "t.hbs",
                &context(json!({"name": "CameraInfo"})),
                &output,
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "camera_info CAMERAINFO camerainfo");
    }

    #[test]
    fn test_lifecycle_hooks_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("outer.hbs"), "{{TEMPLATE \"inner.hbs\"}}").unwrap();
        fs::write(dir.path().join("inner.hbs"), "x").unwrap();
        let hooks = Arc::new(RecordingHooks::default());

        ExpansionContext::new()
            .with_hooks(hooks.clone())
            .expand(
                "outer.hbs",
                &Map::new(),
                &dir.path().join("out.txt"),
                &ExpandOptions {
                    template_base_dir: Some(dir.path()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            *hooks.events.lock(),
            vec![
                "before_file:outer.hbs",
                "before_include:inner.hbs",
                "after_include:inner.hbs",
                "after_file:outer.hbs",
            ]
        );
    }
}
