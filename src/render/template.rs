//! HTML templates rendered with `minijinja`.
//!
//! A [`TemplateFactory`] compiles a set of named templates into an
//! environment; [`TemplateRender`] caches that environment and executes one
//! template per call. Output is HTML-escaped unless a template marks a value
//! `|safe`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use super::{RenderError, respond};
use crate::response::Response;

type Filter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Compilation options shared by every template of a factory.
#[derive(Clone, Default)]
pub struct TemplateOptions {
    delimiters: Option<(String, String)>,
    filters: Vec<(String, Filter)>,
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variable delimiters, `{{` and `}}` unless set.
    pub fn delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.delimiters = Some((left.into(), right.into()));
        self
    }

    /// Registers a string filter, used as `{{ value|name }}`.
    pub fn filter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.filters.push((name.into(), Arc::new(f)));
        self
    }

    /// An empty environment configured with these options.
    pub fn environment(&self) -> Result<Environment<'static>, RenderError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        if let Some((left, right)) = &self.delimiters {
            let syntax = SyntaxConfig::builder()
                .variable_delimiters(left.clone(), right.clone())
                .build()?;
            env.set_syntax(syntax);
        }
        for (name, filter) in &self.filters {
            let filter = Arc::clone(filter);
            env.add_filter(name.clone(), move |value: String| filter(&value));
        }
        Ok(env)
    }
}

impl fmt::Debug for TemplateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<_> = self.filters.iter().map(|(name, _)| name).collect();
        f.debug_struct("TemplateOptions")
            .field("delimiters", &self.delimiters)
            .field("filters", &filters)
            .finish()
    }
}

/// Source of a compiled template set.
pub trait TemplateFactory: Send + Sync {
    fn create(&self) -> Result<Environment<'static>, RenderError>;
}

// ── StaticTemplateFactory ────────────────────────────────────────────────────

/// Templates held in memory, usually `include_str!`-ed sources.
#[derive(Clone, Debug, Default)]
pub struct StaticTemplateFactory {
    options: TemplateOptions,
    templates: Vec<(String, String)>,
}

impl StaticTemplateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.push((name.into(), source.into()));
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }
}

impl TemplateFactory for StaticTemplateFactory {
    fn create(&self) -> Result<Environment<'static>, RenderError> {
        let mut env = self.options.environment()?;
        for (name, source) in &self.templates {
            env.add_template_owned(name.clone(), source.clone())?;
        }
        Ok(env)
    }
}

// ── DiskTemplateFactory ──────────────────────────────────────────────────────

/// Templates read from a directory tree.
///
/// Every file under [`directory`](Self::directory) (default `templates`)
/// whose name ends in one of the [`extensions`](Self::extensions) (default
/// `.tmpl`) is compiled. A template is named by its path relative to the
/// directory, without the extension and with `/` separators:
/// `templates/users/show.tmpl` is `users/show`.
#[derive(Clone, Debug)]
pub struct DiskTemplateFactory {
    options: TemplateOptions,
    directory: PathBuf,
    extensions: Vec<String>,
}

impl DiskTemplateFactory {
    pub fn new() -> Self {
        Self {
            options: TemplateOptions::default(),
            directory: PathBuf::from("templates"),
            extensions: vec![String::from(".tmpl")],
        }
    }

    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    fn template_name(&self, relative: &Path) -> Option<String> {
        let relative = relative.to_str()?;
        let stem = self
            .extensions
            .iter()
            .find_map(|ext| relative.strip_suffix(ext.as_str()))?;
        Some(stem.replace(std::path::MAIN_SEPARATOR, "/"))
    }

    fn load_dir(&self, dir: &Path, env: &mut Environment<'static>) -> Result<(), RenderError> {
        let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.path());
        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.load_dir(&path, env)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.directory) else {
                continue;
            };
            if let Some(name) = self.template_name(relative) {
                debug!(template = %name, path = %path.display(), "compiling template");
                let source = fs::read_to_string(&path)?;
                env.add_template_owned(name, source)?;
            }
        }
        Ok(())
    }
}

impl Default for DiskTemplateFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateFactory for DiskTemplateFactory {
    fn create(&self) -> Result<Environment<'static>, RenderError> {
        let mut env = self.options.environment()?;
        self.load_dir(&self.directory, &mut env)?;
        Ok(env)
    }
}

// ── TemplateRender ───────────────────────────────────────────────────────────

/// Executes named templates. Defaults to `text/html; charset=UTF-8`.
///
/// Templates are compiled on first use and reused afterwards. In
/// [`development`](Self::development) mode they are recompiled on every
/// render so edits show up without a restart. Call
/// [`compile_templates`](Self::compile_templates) at startup to surface
/// syntax errors early.
///
/// ```rust
/// use http::StatusCode;
/// use plumb::render::{StaticTemplateFactory, TemplateRender};
///
/// let render = TemplateRender::new(
///     StaticTemplateFactory::new().template("hello", "<p>Hello {{ name }}</p>"),
/// );
/// let res = render
///     .render(StatusCode::OK, "hello", &serde_json::json!({ "name": "<you>" }))
///     .unwrap();
/// assert_eq!(res.body().as_ref(), b"<p>Hello &lt;you&gt;</p>");
/// ```
#[derive(Clone)]
pub struct TemplateRender {
    content_type: String,
    charset: String,
    development: bool,
    factory: Arc<dyn TemplateFactory>,
    compiled: Arc<RwLock<Option<Arc<Environment<'static>>>>>,
}

impl TemplateRender {
    pub fn new(factory: impl TemplateFactory + 'static) -> Self {
        Self {
            content_type: String::from("text/html"),
            charset: String::from(super::DEFAULT_CHARSET),
            development: false,
            factory: Arc::new(factory),
            compiled: Arc::default(),
        }
    }

    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = value.into();
        self
    }

    pub fn charset(mut self, value: impl Into<String>) -> Self {
        self.charset = value.into();
        self
    }

    /// Recompile templates on every render. Default `false`.
    pub fn development(mut self, value: bool) -> Self {
        self.development = value;
        self
    }

    /// Compiles the templates unless a compiled set is cached and
    /// development mode is off.
    pub fn compile_templates(&self) -> Result<Arc<Environment<'static>>, RenderError> {
        if !self.development {
            if let Some(env) = self.compiled.read().as_ref() {
                return Ok(Arc::clone(env));
            }
        }
        let env = Arc::new(self.factory.create()?);
        *self.compiled.write() = Some(Arc::clone(&env));
        Ok(env)
    }

    pub fn render<C>(&self, status: StatusCode, name: &str, context: &C) -> Result<Response, RenderError>
    where
        C: Serialize + ?Sized,
    {
        let env = self.compile_templates()?;
        let html = env.get_template(name)?.render(context)?;
        Ok(respond(status, &self.content_type, &self.charset, html))
    }
}

impl fmt::Debug for TemplateRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRender")
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn body(res: &Response) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    #[test]
    fn renders_a_static_template() {
        let render = TemplateRender::new(
            StaticTemplateFactory::new().template("hello", "Hello {{ name }}!"),
        );
        let res = render.render(StatusCode::OK, "hello", &json!({ "name": "world" })).unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/html; charset=UTF-8"));
        assert_eq!(body(&res), "Hello world!");
    }

    #[test]
    fn output_is_html_escaped() {
        let render = TemplateRender::new(
            StaticTemplateFactory::new().template("page", "<b>{{ text }}</b>{{ raw|safe }}"),
        );
        let ctx = json!({ "text": "<script>", "raw": "<i>ok</i>" });
        let res = render.render(StatusCode::OK, "page", &ctx).unwrap();
        assert_eq!(body(&res), "<b>&lt;script&gt;</b><i>ok</i>");
    }

    #[test]
    fn templates_can_include_each_other() {
        let factory = StaticTemplateFactory::new()
            .template("layout", "<main>{% block content %}{% endblock %}</main>")
            .template("index", r#"{% extends "layout" %}{% block content %}hi{% endblock %}"#);
        let res = TemplateRender::new(factory).render(StatusCode::OK, "index", &()).unwrap();
        assert_eq!(body(&res), "<main>hi</main>");
    }

    #[test]
    fn custom_delimiters_and_filters() {
        let options = TemplateOptions::new()
            .delimiters("[[", "]]")
            .filter("shout", |s| s.to_uppercase());
        let factory = StaticTemplateFactory::new()
            .options(options)
            .template("greet", "{{ kept }} [[ name|shout ]]");
        let res = TemplateRender::new(factory)
            .render(StatusCode::OK, "greet", &json!({ "name": "bob" }))
            .unwrap();
        assert_eq!(body(&res), "{{ kept }} BOB");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let render = TemplateRender::new(StaticTemplateFactory::new());
        let err = render.render(StatusCode::OK, "missing", &()).unwrap_err();
        assert!(matches!(err, RenderError::Template(_)));
    }

    #[test]
    fn syntax_errors_surface_at_compile_time() {
        let render = TemplateRender::new(StaticTemplateFactory::new().template("bad", "{% if %}"));
        assert!(matches!(render.compile_templates(), Err(RenderError::Template(_))));
    }

    struct Counting(Arc<AtomicUsize>);

    impl TemplateFactory for Counting {
        fn create(&self) -> Result<Environment<'static>, RenderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            StaticTemplateFactory::new().template("t", "x").create()
        }
    }

    #[test]
    fn compiled_templates_are_cached() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = TemplateRender::new(Counting(Arc::clone(&count)));
        for _ in 0..3 {
            render.render(StatusCode::OK, "t", &()).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn development_mode_recompiles_every_time() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = TemplateRender::new(Counting(Arc::clone(&count))).development(true);
        for _ in 0..3 {
            render.render(StatusCode::OK, "t", &()).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn disk_factory_names_templates_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.tmpl", "index {{ n }}");
        write(dir.path(), "users/show.tmpl", "user {{ n }}");
        write(dir.path(), "notes.txt", "not a template");

        let render = TemplateRender::new(DiskTemplateFactory::new().directory(dir.path()));
        let ctx = json!({ "n": 1 });
        assert_eq!(body(&render.render(StatusCode::OK, "index", &ctx).unwrap()), "index 1");
        assert_eq!(body(&render.render(StatusCode::OK, "users/show", &ctx).unwrap()), "user 1");
        assert!(render.render(StatusCode::OK, "notes", &ctx).is_err());
    }

    #[test]
    fn disk_factory_extensions_are_configurable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", "A");
        write(dir.path(), "b.tmpl", "B");

        let factory = DiskTemplateFactory::new().directory(dir.path()).extensions([".html"]);
        let render = TemplateRender::new(factory);
        assert_eq!(body(&render.render(StatusCode::OK, "a", &()).unwrap()), "A");
        assert!(render.render(StatusCode::OK, "b", &()).is_err());
    }

    #[test]
    fn development_mode_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "page.tmpl", "v1");
        let render = TemplateRender::new(DiskTemplateFactory::new().directory(dir.path()))
            .development(true);
        assert_eq!(body(&render.render(StatusCode::OK, "page", &()).unwrap()), "v1");
        write(dir.path(), "page.tmpl", "v2");
        assert_eq!(body(&render.render(StatusCode::OK, "page", &()).unwrap()), "v2");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let factory = DiskTemplateFactory::new().directory("/definitely/not/here");
        assert!(matches!(factory.create(), Err(RenderError::Io(_))));
    }
}
