//! Layout inheritance: `@extends`, `@section` and `@yield`.
//!
//! A page view is rendered in two parts. Every `@section` in its tree is
//! collected and compiled on its own; everything else forms the body. If
//! the page extends a layout, the layout is rendered as a page in turn,
//! with the compiled sections visible to its `@yield`s and copied into its
//! context.

use stencil_carton::FxHashMap;
use stencil_relief::{Node, RootNode, SectionBody, SectionNode};

use crate::{
    context::Context,
    errors::RenderError,
    render::{Frame, SectionMode},
};

/// Name of the section that replaces the page body in the layout.
pub const CONTENT_SECTION: &str = "content";

/// The layout-relevant parts of a view: its first `@extends` and every
/// `@section`, in document order.
#[derive(Debug, Default)]
pub struct PageParts<'t> {
    pub extends: Option<&'t str>,
    pub sections: Vec<&'t SectionNode>,
}

impl<'t> PageParts<'t> {
    pub fn collect(nodes: &'t [Node]) -> Self {
        let mut parts = Self::default();
        parts.visit(nodes);
        parts
    }

    fn visit(&mut self, nodes: &'t [Node]) {
        for node in nodes {
            match node {
                Node::Extends(extends) => {
                    if self.extends.is_none() {
                        self.extends = Some(extends.layout.as_str());
                    }
                }
                Node::Section(section) => {
                    self.sections.push(section);
                    if let SectionBody::Block(children) = &section.body {
                        self.visit(children);
                    }
                }
                Node::If(node) => {
                    self.visit(&node.consequent);
                    if let Some(alternate) = &node.alternate {
                        self.visit(alternate);
                    }
                }
                Node::ForEach(node) => self.visit(&node.body),
                Node::Error(node) => self.visit(&node.body),
                _ => {}
            }
        }
    }
}

impl Frame<'_> {
    /// Load and render a view as a page, resolving its layout chain.
    pub(crate) fn render_page(
        &mut self,
        name: &str,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        let parsed = self.renderer.load(name)?;
        self.enter(name)?;
        let result = self.render_root(&parsed.root, ctx);
        self.leave();
        result
    }

    pub(crate) fn render_root(
        &mut self,
        root: &RootNode,
        ctx: &mut Context,
    ) -> Result<String, RenderError> {
        let parts = PageParts::collect(&root.children);

        let mut body = String::new();
        self.render_nodes(&root.children, ctx, SectionMode::Extracted, &mut body)?;

        let Some(layout) = parts.extends else {
            return Ok(body);
        };

        // First definition of a name wins
        let mut sections: FxHashMap<String, String> = FxHashMap::default();
        for section in &parts.sections {
            if sections.contains_key(section.name.as_str()) {
                continue;
            }
            let content = match &section.body {
                SectionBody::Block(children) => {
                    let mut content = String::new();
                    self.render_nodes(children, ctx, SectionMode::Extracted, &mut content)?;
                    content
                }
                SectionBody::Inline(expr) => self.evaluator.eval_to_string(expr, ctx),
            };
            sections.insert(section.name.to_string(), content);
        }

        // Sections from further down the chain override this view's own
        let inherited = std::mem::take(&mut self.sections);
        sections.extend(inherited.iter().map(|(k, v)| (k.clone(), v.clone())));
        sections
            .entry(CONTENT_SECTION.to_string())
            .or_insert(body);

        let mut layout_ctx = ctx.clone();
        for (name, content) in &sections {
            layout_ctx.insert(name.as_str(), content.as_str());
        }

        tracing::debug!(layout, sections = sections.len(), "resolving layout");
        self.sections = sections;
        let result = self.render_page(layout, &mut layout_ctx);
        self.sections = inherited;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_armature::parse;

    #[test]
    fn test_collect_sections_everywhere() {
        let (root, errors) = parse(
            "@extends('layouts.app')@extends('other')\
             @section('title', 'Home')\
             @if($x)@section('sidebar')side@endsection@endif\
             @section('content')@section('inner')in@endsection body@endsection",
        );
        assert!(errors.is_empty());
        let parts = PageParts::collect(&root.children);
        assert_eq!(parts.extends, Some("layouts.app"));
        let names: Vec<&str> = parts.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["title", "sidebar", "content", "inner"]);
    }

    #[test]
    fn test_no_layout() {
        let (root, _) = parse("<p>plain</p>");
        let parts = PageParts::collect(&root.children);
        assert_eq!(parts.extends, None);
        assert!(parts.sections.is_empty());
    }
}
