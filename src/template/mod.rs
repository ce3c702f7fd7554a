//! Section template runtime
//!
//! A section template is literal markup with embedded expressions written as
//! `{{ expr }}` (or `${ expr }`, the template-literal spelling used by older
//! section markup). Expressions are parsed into a small AST ([`Expr`]) and
//! evaluated against the section's customization object, which is the only
//! scope they can read. Results are stringified and HTML-escaped before
//! substitution.
//!
//! [`TemplateRenderer::render`] never fails: on any evaluation error it logs
//! a warning and hands back the template text unchanged.

mod eval;
mod expr;

pub use eval::{stringify, truthy};
pub use expr::{parse_expression, CompareOp, Expr, Literal, LogicalOp};

use crate::dom::{self, Node};
use crate::BuilderConfig;
use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a template could not be evaluated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    #[error("unterminated expression starting at offset {0}")]
    Unterminated(usize),

    #[error("field '{0}' is not defined")]
    MissingField(String),

    #[error("cannot substitute a value of type {0}")]
    UnexpectedType(&'static str),

    #[error("expression nesting exceeds the limit of {0}")]
    DepthLimit(usize),

    #[error("template has more than {0} expressions")]
    ExpressionLimit(usize),
}

/// A piece of a compiled template
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'t> {
    Literal(&'t str),
    Expression { expr: Expr, offset: usize },
}

/// A template split into literal text and parsed expressions
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate<'t> {
    pub segments: Vec<Segment<'t>>,
}

/// Split `template` into segments, parsing every expression.
pub fn compile(
    template: &str,
    depth_limit: usize,
    expression_limit: usize,
) -> Result<CompiledTemplate<'_>, EvalError> {
    let mut segments = Vec::new();
    let mut expressions = 0usize;
    let mut rest = 0usize;

    while let Some((open, open_len, close)) = next_opening(&template[rest..]) {
        let start = rest + open;
        let body_start = start + open_len;
        let body_len = find_close(&template[body_start..], close)
            .ok_or(EvalError::Unterminated(start))?;
        if open > 0 {
            segments.push(Segment::Literal(&template[rest..start]));
        }
        expressions += 1;
        if expressions > expression_limit {
            return Err(EvalError::ExpressionLimit(expression_limit));
        }
        let body = &template[body_start..body_start + body_len];
        let expr = parse_expression(body, depth_limit).map_err(|e| match e {
            EvalError::Syntax { message, offset } => EvalError::Syntax {
                message,
                offset: body_start + offset,
            },
            other => other,
        })?;
        segments.push(Segment::Expression {
            expr,
            offset: start,
        });
        rest = body_start + body_len + close.len();
    }
    if rest < template.len() {
        segments.push(Segment::Literal(&template[rest..]));
    }
    Ok(CompiledTemplate { segments })
}

/// Locate the next `{{` or `${`; returns (position, opener length, closer).
fn next_opening(s: &str) -> Option<(usize, usize, &'static str)> {
    let braces = s.find("{{").map(|p| (p, 2, "}}"));
    let dollar = s.find("${").map(|p| (p, 2, "}"));
    match (braces, dollar) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Find `close` outside of quoted strings.
fn find_close(s: &str, close: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
        } else if s[i..].starts_with(close) {
            return Some(i);
        }
    }
    None
}

/// Output of rendering one section
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSection {
    pub nodes: Vec<Node>,
    /// True when evaluation failed and the raw template text was used
    pub degraded: bool,
}

/// Evaluates section templates against customization data
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    depth_limit: usize,
    expression_limit: usize,
    strict_fields: bool,
    strip_scripts: bool,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(&BuilderConfig::default())
    }
}

impl TemplateRenderer {
    pub fn new(config: &BuilderConfig) -> Self {
        Self {
            depth_limit: config.expression_depth_limit,
            expression_limit: config.expression_limit,
            strict_fields: config.strict_fields,
            strip_scripts: config.strip_scripts,
        }
    }

    /// Render, reporting the first evaluation error
    pub fn try_render(&self, template: &str, data: &Map<String, Value>) -> Result<String, EvalError> {
        let compiled = compile(template, self.depth_limit, self.expression_limit)?;
        let scope = eval::Scope {
            data: Some(data),
            strict: self.strict_fields,
        };
        let mut out = String::with_capacity(template.len());
        for segment in &compiled.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expression { expr, .. } => {
                    let value = eval::evaluate(expr, &scope)?;
                    out.push_str(&dom::escape_html(&stringify(&value)?));
                }
            }
        }
        Ok(out)
    }

    /// Render a template, falling back to the unevaluated template text on
    /// any failure.
    pub fn render(&self, template: &str, data: &Map<String, Value>) -> String {
        self.render_checked(template, data).0
    }

    fn render_checked(&self, template: &str, data: &Map<String, Value>) -> (String, bool) {
        match self.try_render(template, data) {
            Ok(markup) => (markup, false),
            Err(e) => {
                warn!("Template render error: {}", e);
                (template.to_string(), true)
            }
        }
    }

    /// Render a template and parse the result into nodes
    pub fn render_section(&self, template: &str, data: &Map<String, Value>) -> RenderedSection {
        let (markup, degraded) = self.render_checked(template, data);
        let mut nodes = dom::parse_fragment(&markup);
        if self.strip_scripts {
            dom::strip_active_content(&mut nodes);
        }
        RenderedSection { nodes, degraded }
    }
}
