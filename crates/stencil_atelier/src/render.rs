//! Template rendering.
//!
//! [`Renderer`] owns the collaborators and the parsed-view cache. Each call
//! to [`Renderer::render`] walks the AST with a fresh [`Frame`], which
//! tracks the stack of views being rendered and the sections a child view
//! handed to its layout.

use std::{cell::RefCell, rc::Rc};

use stencil_armature::parse_with_options;
use stencil_carton::{escape_html, hash_str, CompactString, FxHashMap, SmallVec};
use stencil_relief::{
    AssetKind, AssetNode, CompilerError, ErrorNode, Expr, ForEachNode, Node, RootNode,
    SectionBody, Value, YieldNode,
};

use crate::{
    collaborators::{
        AssetResolver, CsrfProvider, EmptySession, NoAssets, NoCsrf, SessionStore, ViewLoader,
    },
    context::Context,
    errors::RenderError,
    expression::{to_output, Evaluator},
    functions::{FunctionRegistry, FunctionResult},
    options::RenderOptions,
};

/// Name used for source rendered with [`Renderer::render_source`].
pub const INLINE_VIEW: &str = "<inline>";

/// A parsed template and the errors found while parsing it.
#[derive(Debug)]
pub struct ParsedView {
    pub path: String,
    pub root: RootNode,
    pub errors: Vec<CompilerError>,
}

struct CachedView {
    hash: u64,
    view: Rc<ParsedView>,
}

/// Renders views by name.
///
/// ```
/// use serde_json::json;
/// use stencil_atelier::{MemoryViewLoader, Renderer};
///
/// let loader = MemoryViewLoader::new().with_view("hello", "Hello, {{ $name }}!");
/// let renderer = Renderer::new(loader);
/// let html = renderer.render("hello", json!({"name": "Ana"})).unwrap();
/// assert_eq!(html, "Hello, Ana!");
/// ```
pub struct Renderer {
    loader: Box<dyn ViewLoader>,
    pub(crate) csrf: Box<dyn CsrfProvider>,
    pub(crate) session: Box<dyn SessionStore>,
    pub(crate) assets: Box<dyn AssetResolver>,
    pub(crate) functions: FunctionRegistry,
    pub(crate) options: RenderOptions,
    cache: RefCell<FxHashMap<CompactString, CachedView>>,
}

impl Renderer {
    pub fn new(loader: impl ViewLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            csrf: Box::new(NoCsrf),
            session: Box::new(EmptySession),
            assets: Box::new(NoAssets),
            functions: FunctionRegistry::with_builtins(),
            options: RenderOptions::default(),
            cache: RefCell::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self.cache.get_mut().clear();
        self
    }

    pub fn with_csrf(mut self, csrf: impl CsrfProvider + 'static) -> Self {
        self.csrf = Box::new(csrf);
        self
    }

    pub fn with_session(mut self, session: impl SessionStore + 'static) -> Self {
        self.session = Box::new(session);
        self
    }

    pub fn with_assets(mut self, assets: impl AssetResolver + 'static) -> Self {
        self.assets = Box::new(assets);
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Add a host function on top of the current registry.
    pub fn register_function<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> FunctionResult + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render a view with the given data.
    pub fn render(&self, view: &str, data: impl Into<Context>) -> Result<String, RenderError> {
        let mut ctx = data.into();
        self.render_with(view, &mut ctx)
    }

    /// Render a view against a caller-owned context. Loop bindings made
    /// by the view remain in `ctx` afterwards.
    pub fn render_with(&self, view: &str, ctx: &mut Context) -> Result<String, RenderError> {
        tracing::debug!(view, "rendering view");
        Frame::new(self).render_page(view, ctx)
    }

    /// Render template source that does not come from the loader. It may
    /// still include and extend loaded views.
    pub fn render_source(&self, source: &str, ctx: &mut Context) -> Result<String, RenderError> {
        let parsed = self.compile(INLINE_VIEW, INLINE_VIEW, source);
        self.check(INLINE_VIEW, &parsed)?;
        Frame::new(self).render_root(&parsed.root, ctx)
    }

    /// Load and parse a view, reusing the cached AST while its source is
    /// unchanged.
    pub(crate) fn load(&self, name: &str) -> Result<Rc<ParsedView>, RenderError> {
        let view = self
            .loader
            .load(name)
            .map_err(|e| RenderError::from_load(name, e))?;
        let hash = hash_str(&view.source);

        let cached = self
            .cache
            .borrow()
            .get(name)
            .filter(|c| c.hash == hash)
            .map(|c| Rc::clone(&c.view));
        let parsed = match cached {
            Some(parsed) => parsed,
            None => {
                let parsed = Rc::new(self.compile(name, &view.path, &view.source));
                self.cache.borrow_mut().insert(
                    CompactString::from(name),
                    CachedView {
                        hash,
                        view: Rc::clone(&parsed),
                    },
                );
                parsed
            }
        };

        self.check(name, &parsed)?;
        Ok(parsed)
    }

    fn compile(&self, name: &str, path: &str, source: &str) -> ParsedView {
        let (root, errors) = parse_with_options(source, &self.options.parser);
        if !self.options.strict {
            for error in &errors {
                let (line, column) = error
                    .loc
                    .map_or((0, 0), |loc| (loc.start.line, loc.start.column));
                tracing::warn!(view = name, path, line, column, "{}", error.message);
            }
        }
        ParsedView {
            path: path.to_string(),
            root,
            errors,
        }
    }

    fn check(&self, name: &str, parsed: &ParsedView) -> Result<(), RenderError> {
        if self.options.strict && !parsed.errors.is_empty() {
            return Err(RenderError::Parse {
                view: name.to_string(),
                errors: parsed.errors.clone(),
            });
        }
        Ok(())
    }
}

/// How `@section` nodes render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionMode {
    /// The view went through the layout resolver; sections were collected
    /// separately and render nothing in place.
    Extracted,
    /// Included views: section markers are dropped, bodies render in place.
    Inline,
}

/// State for one render call.
pub(crate) struct Frame<'r> {
    pub(crate) renderer: &'r Renderer,
    pub(crate) evaluator: Evaluator<'r>,
    stack: SmallVec<[CompactString; 8]>,
    /// Sections handed down by the child view, visible to `@yield`
    pub(crate) sections: FxHashMap<String, String>,
}

impl<'r> Frame<'r> {
    fn new(renderer: &'r Renderer) -> Self {
        Self {
            renderer,
            evaluator: Evaluator::new(&renderer.functions, renderer.session.as_ref()),
            stack: SmallVec::new(),
            sections: FxHashMap::default(),
        }
    }

    /// Push a view onto the stack, failing on re-entry or excessive depth.
    pub(crate) fn enter(&mut self, name: &str) -> Result<(), RenderError> {
        if let Some(first) = self.stack.iter().position(|v| v.as_str() == name) {
            let mut chain: Vec<&str> = self.stack[first..].iter().map(|v| v.as_str()).collect();
            chain.push(name);
            return Err(RenderError::CircularReference {
                chain: chain.join(" -> "),
            });
        }
        let max = self.renderer.options.max_depth;
        if self.stack.len() >= max {
            return Err(RenderError::DepthExceeded { max });
        }
        self.stack.push(CompactString::from(name));
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn render_nodes(
        &mut self,
        nodes: &[Node],
        ctx: &mut Context,
        mode: SectionMode,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node, ctx, mode, out)?;
        }
        Ok(())
    }

    fn render_node(
        &mut self,
        node: &Node,
        ctx: &mut Context,
        mode: SectionMode,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match node {
            Node::Text(text) => out.push_str(&text.content),
            Node::Interpolation(interp) => {
                let value = self.evaluator.eval(&interp.expr, ctx);
                let text = to_output(&value);
                if interp.escape {
                    out.push_str(&escape_html(&text));
                } else {
                    out.push_str(&text);
                }
            }
            Node::If(node) => {
                let branch = if self.evaluator.eval_condition(&node.condition, ctx) {
                    Some(&node.consequent)
                } else {
                    node.alternate.as_ref()
                };
                if let Some(children) = branch {
                    self.render_nodes(children, ctx, mode, out)?;
                }
            }
            Node::ForEach(node) => self.render_foreach(node, ctx, mode, out)?,
            Node::Include(node) => self.render_include(&node.view, ctx, out)?,
            Node::Error(node) => self.render_error(node, ctx, mode, out)?,
            Node::Yield(node) => self.render_yield(node, ctx, out),
            Node::Section(section) => {
                if let (SectionMode::Inline, SectionBody::Block(children)) = (mode, &section.body) {
                    self.render_nodes(children, ctx, mode, out)?;
                }
            }
            Node::Extends(_) => {}
            Node::Csrf(_) => out.push_str(&self.renderer.csrf.field()),
            Node::Asset(node) => self.render_asset(node, ctx, out),
        }
        Ok(())
    }

    /// Bindings are written into the caller's context and keep their
    /// last-iteration values.
    fn render_foreach(
        &mut self,
        node: &ForEachNode,
        ctx: &mut Context,
        mode: SectionMode,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match self.evaluator.eval(&node.source, ctx) {
            Value::Array(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    if let Some(key) = &node.key {
                        ctx.insert(key.as_str(), index);
                    }
                    ctx.insert(node.item.as_str(), item);
                    self.render_nodes(&node.body, ctx, mode, out)?;
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    if let Some(name) = &node.key {
                        ctx.insert(name.as_str(), key);
                    }
                    ctx.insert(node.item.as_str(), item);
                    self.render_nodes(&node.body, ctx, mode, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn render_include(
        &mut self,
        view: &Expr,
        ctx: &mut Context,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let name = self.evaluator.eval_to_string(view, ctx);
        if name.is_empty() {
            tracing::warn!("@include without a view name");
            return Ok(());
        }
        let parsed = match self.renderer.load(&name) {
            Ok(parsed) => parsed,
            Err(RenderError::ViewNotFound { path, .. }) => {
                tracing::warn!(view = %name, %path, "included view not found");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.enter(&name)?;
        let result = self.render_nodes(&parsed.root.children, ctx, SectionMode::Inline, out);
        self.leave();
        result
    }

    /// The message for `field`, from the context's `errors` map or the
    /// session. The first entry of a list of messages is used.
    fn error_message(&self, field: &str, ctx: &Context) -> Option<Value> {
        let message = match ctx.get("errors") {
            Some(Value::Object(errors)) => errors.get(field).cloned(),
            _ => self.renderer.session.errors().remove(field),
        }?;
        match message {
            Value::Null => None,
            Value::Array(items) => items.into_iter().next(),
            other => Some(other),
        }
    }

    fn render_error(
        &mut self,
        node: &ErrorNode,
        ctx: &mut Context,
        mode: SectionMode,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let field = self.evaluator.eval_to_string(&node.field, ctx);
        let Some(message) = self.error_message(&field, ctx) else {
            return Ok(());
        };

        let mut scoped = ctx.clone();
        scoped.insert("message", message);
        if node.inline {
            // Rendered like the block form, then trimmed to one trailing space
            let mut body = String::new();
            self.render_nodes(&node.body, &mut scoped, mode, &mut body)?;
            out.push_str(body.trim());
            out.push(' ');
        } else {
            self.render_nodes(&node.body, &mut scoped, mode, out)?;
        }
        Ok(())
    }

    fn render_yield(&self, node: &YieldNode, ctx: &Context, out: &mut String) {
        let name = self.evaluator.eval_to_string(&node.name, ctx);
        if let Some(content) = self.sections.get(&name) {
            out.push_str(content);
        } else if let Some(Value::String(value)) = ctx.get(&name) {
            out.push_str(value);
        } else if let Some(default) = &node.default {
            out.push_str(&self.evaluator.eval_to_string(default, ctx));
        }
    }

    fn render_asset(&self, node: &AssetNode, ctx: &Context, out: &mut String) {
        let paths: Vec<String> = match self.evaluator.eval(&node.paths, ctx) {
            Value::Array(items) => items.iter().map(|v| to_output(v).into_owned()).collect(),
            other => vec![to_output(&other).into_owned()],
        };
        let assets = self.renderer.assets.as_ref();
        if node.kind == AssetKind::Vite {
            out.push_str(&assets.client_script());
        }
        for path in paths.iter().filter(|p| !p.is_empty()) {
            out.push_str(&assets.css_tags(path));
            out.push_str(&assets.script_tag(path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryViewLoader;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingLoader {
        inner: MemoryViewLoader,
        loads: Rc<Cell<usize>>,
    }

    impl ViewLoader for CountingLoader {
        fn load(&self, name: &str) -> Result<crate::ViewSource, crate::LoadError> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load(name)
        }
    }

    #[test]
    fn test_parsed_views_are_cached() {
        let loads = Rc::new(Cell::new(0));
        let renderer = Renderer::new(CountingLoader {
            inner: MemoryViewLoader::from([("home", "{{ $n }}")]),
            loads: Rc::clone(&loads),
        });
        assert_eq!(renderer.render("home", json!({"n": 1})).unwrap(), "1");
        assert_eq!(renderer.render("home", json!({"n": 2})).unwrap(), "2");
        assert_eq!(loads.get(), 2);
        assert_eq!(renderer.cache.borrow().len(), 1);
    }

    #[test]
    fn test_cycle_chain_starts_at_reentry() {
        let renderer = Renderer::new(MemoryViewLoader::from([
            ("page", "@include('a')"),
            ("a", "@include('b')"),
            ("b", "@include('a')"),
        ]));
        let err = renderer.render("page", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "circular view reference: a -> b -> a");
    }

    #[test]
    fn test_depth_limit() {
        let renderer = Renderer::new(MemoryViewLoader::from([
            ("one", "@include('two')"),
            ("two", "@include('three')"),
            ("three", "done"),
        ]))
        .with_options(RenderOptions {
            max_depth: 2,
            ..RenderOptions::default()
        });
        assert!(matches!(
            renderer.render("one", json!({})),
            Err(RenderError::DepthExceeded { max: 2 })
        ));
    }

    #[test]
    fn test_render_source_uses_loader_for_includes() {
        let renderer = Renderer::new(MemoryViewLoader::from([("nav", "<nav>{{ $title }}</nav>")]));
        let mut ctx = Context::from_value(json!({"title": "Home"}));
        let html = renderer
            .render_source("@include('nav')<main/>", &mut ctx)
            .unwrap();
        assert_eq!(html, "<nav>Home</nav><main/>");
    }
}
