//! The engine: configuration, template loading and rendering.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::context::Context;
use crate::error::{CompileError, Error, RenderError, ResourceError};
use crate::introspect::{Introspector, Uberspector};
use crate::render::diagnostics::{Diagnostics, LogDiagnostics};
use crate::render::events::{EventCartridge, EventHandler};
use crate::render::output::Output;
use crate::render::Renderer;
use crate::template::Template;

/// Loads templates and included resources by name.
pub trait ResourceLoader: Send + Sync {
    fn read_to_string(&self, name: &str) -> Result<String, ResourceError>;
}

/// Reads resources from files below a root directory.
///
/// Names are relative paths; names that would escape the root are rejected.
#[derive(Debug, Clone)]
pub struct FileResourceLoader {
    root: PathBuf,
}

impl FileResourceLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> FileResourceLoader {
        FileResourceLoader { root: root.into() }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn read_to_string(&self, name: &str) -> Result<String, ResourceError> {
        let relative = Path::new(name);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_root {
            return Err(ResourceError::new(
                name,
                "resource names must be relative paths inside the template root",
            ));
        }
        let path = self.root.join(relative);
        std::fs::read_to_string(&path)
            .map_err(|err| ResourceError::new(name, format!("{}: {err}", path.display())))
    }
}

/// Serves resources from memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryResourceLoader {
    resources: HashMap<String, String>,
}

impl MemoryResourceLoader {
    pub fn new() -> MemoryResourceLoader {
        Default::default()
    }

    pub fn with<N: Into<String>, S: Into<String>>(mut self, name: N, source: S) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert<N: Into<String>, S: Into<String>>(&mut self, name: N, source: S) {
        self.resources.insert(name.into(), source.into());
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn read_to_string(&self, name: &str) -> Result<String, ResourceError> {
        self.resources
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::new(name, "no such resource"))
    }
}

/// Compiles and renders templates.
///
/// An engine is `Send + Sync`; one engine and the templates it compiles can serve
///     any number of concurrent renders.
pub struct Engine {
    config: Config,
    introspector: Arc<dyn Introspector>,
    loader: Box<dyn ResourceLoader>,
    diagnostics: Arc<dyn Diagnostics>,
    events: EventCartridge,
    templates: RwLock<HashMap<String, Template>>,
    evaluated: RwLock<HashMap<(String, String), Template>>,
}

/// Maximum number of `#evaluate` sources kept compiled by one engine.
const EVALUATE_CACHE_CAPACITY: usize = 512;

impl Default for Engine {
    fn default() -> Self {
        Engine::builder().build()
    }
}

impl Engine {
    pub fn new() -> Engine {
        Default::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn introspector(&self) -> &dyn Introspector {
        self.introspector.as_ref()
    }

    pub fn diagnostics(&self) -> &dyn Diagnostics {
        self.diagnostics.as_ref()
    }

    pub(crate) fn events(&self) -> &EventCartridge {
        &self.events
    }

    pub(crate) fn loader(&self) -> &dyn ResourceLoader {
        self.loader.as_ref()
    }

    /// Compile template source.
    pub fn compile(&self, name: &str, source: &str) -> Result<Template, CompileError> {
        Template::compile(name, source, &self.config)
    }

    /// Compile the source of an `#evaluate`.
    ///
    /// The same source at the same place is compiled once, so its nodes keep their
    ///     identity and accessors cached for them in a context are reused.
    pub(crate) fn compile_evaluated(
        &self,
        name: &str,
        source: &str,
    ) -> Result<Template, CompileError> {
        let key = (name.to_string(), source.to_string());
        if let Some(template) = self.evaluated.read().get(&key) {
            return Ok(template.clone());
        }
        let template = self.compile(name, source)?;
        let mut evaluated = self.evaluated.write();
        if evaluated.len() >= EVALUATE_CACHE_CAPACITY {
            log::debug!(
                target: "weft::parse",
                "#evaluate cache is full; {name} is compiled without caching"
            );
            return Ok(template);
        }
        Ok(evaluated.entry(key).or_insert(template).clone())
    }

    /// Load and compile the named template from the resource loader.
    ///
    /// Compiled templates are cached by name unless
    ///     [cache_templates](Config::cache_templates) is off.
    pub fn get_template(&self, name: &str) -> Result<Template, Error> {
        if self.config.cache_templates {
            if let Some(template) = self.templates.read().get(name) {
                return Ok(template.clone());
            }
        }
        let source = self.loader.read_to_string(name)?;
        let template = self.compile(name, &source)?;
        log::debug!(target: "weft::parse", "compiled template {name}");
        if !self.config.cache_templates {
            return Ok(template);
        }
        Ok(self
            .templates
            .write()
            .entry(name.to_string())
            .or_insert(template)
            .clone())
    }

    /// Render a template into an output sink.
    pub fn render(
        &self,
        template: &Template,
        ctx: &mut dyn Context,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        Renderer::new(self).render_template(template, ctx, out)?;
        Ok(())
    }

    pub fn render_to_string(
        &self,
        template: &Template,
        ctx: &mut dyn Context,
    ) -> Result<String, RenderError> {
        let mut s = String::new();
        self.render(template, ctx, &mut s)?;
        Ok(s)
    }

    /// Compile and render source in one step.
    pub fn evaluate(&self, name: &str, source: &str, ctx: &mut dyn Context) -> Result<String, Error> {
        let template = self.compile(name, source)?;
        Ok(self.render_to_string(&template, ctx)?)
    }
}

/// Builder for an [Engine].
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    introspector: Option<Arc<dyn Introspector>>,
    loader: Option<Box<dyn ResourceLoader>>,
    diagnostics: Option<Arc<dyn Diagnostics>>,
    events: EventCartridge,
}

impl EngineBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    pub fn resource_loader<L: ResourceLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn event_handler<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        self.events.push(Box::new(handler));
        self
    }

    /// Build the engine.
    ///
    /// Without an explicit resource loader, templates are read from
    ///     [template_root](Config::template_root) if it is set.
    pub fn build(self) -> Engine {
        let loader = match (self.loader, &self.config.template_root) {
            (Some(loader), _) => loader,
            (None, Some(root)) => Box::new(FileResourceLoader::new(root.clone())),
            (None, None) => Box::new(MemoryResourceLoader::new()),
        };
        Engine {
            config: self.config,
            introspector: self
                .introspector
                .unwrap_or_else(|| Arc::new(Uberspector::default())),
            loader,
            diagnostics: self.diagnostics.unwrap_or_else(|| Arc::new(LogDiagnostics)),
            events: self.events,
            templates: RwLock::new(HashMap::new()),
            evaluated: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapContext;

    fn engine() -> Engine {
        Engine::builder()
            .resource_loader(MemoryResourceLoader::new().with("hello", "Hello $name"))
            .build()
    }

    #[test]
    fn get_template_caches_by_name() {
        let engine = engine();
        let a = engine.get_template("hello").unwrap();
        let b = engine.get_template("hello").unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn get_template_without_cache_recompiles() {
        let engine = Engine::builder()
            .config(Config::default().with_cache_templates(false))
            .resource_loader(MemoryResourceLoader::new().with("t", "x"))
            .build();
        let a = engine.get_template("t").unwrap();
        let b = engine.get_template("t").unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn missing_template_is_a_resource_error() {
        match engine().get_template("nope") {
            Err(Error::Resource(err)) => assert_eq!(err.name, "nope"),
            other => panic!("expected a resource error, got {other:?}"),
        }
    }

    #[test]
    fn render_loaded_template() {
        let engine = engine();
        let template = engine.get_template("hello").unwrap();
        let mut ctx = MapContext::new().with("name", "World");
        assert_eq!(
            engine.render_to_string(&template, &mut ctx).unwrap(),
            "Hello World"
        );
    }

    #[test]
    fn file_loader_rejects_escaping_names() {
        let loader = FileResourceLoader::new("/tmp");
        assert!(loader.read_to_string("../etc/passwd").is_err());
        assert!(loader.read_to_string("/etc/passwd").is_err());
    }

    #[test]
    fn file_loader_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.wft"), "#set($a = 1)$a").unwrap();
        let engine = Engine::builder()
            .config(Config::default().with_template_root(dir.path()))
            .build();
        let template = engine.get_template("page.wft").unwrap();
        let mut ctx = MapContext::new();
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "1");
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Template>();
    }
}
