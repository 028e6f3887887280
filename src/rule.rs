//! Mapping rules: how one field gets its value from a document.
//!
//! A field lists one or more rules; the first to produce a non-empty value
//! wins. There are two kinds:
//!
//! - [`MappingRule::Path`]: a path expression evaluated against the document.
//!   The result is trimmed.
//! - [`MappingRule::Template`]: a literal string, optionally with `${name}`
//!   placeholders expanded from a [`VariableSource`]. `${filename}` is the
//!   source identifier of the record being built.
//!
//! Rules hold no mutable state. Usage counting is done by the owning
//! [`MappingTable`](crate::MappingTable).

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use roxmltree::Document;
use tracing::{debug, error};

use crate::config::VariableSource;
use crate::error::{MapperError, Result};
use crate::namespace::NamespaceContext;
use crate::record::FacetRecord;
use crate::xpath::{XPath, XPathError};

/// Upper bound on placeholder substitutions for one template.
pub const MAX_EXPANSION_PASSES: usize = 256;

/// Variable name that expands to the record's source identifier.
pub const FILENAME_VARIABLE: &str = "filename";

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid");
}

/// Everything a rule may consult while evaluating.
#[derive(Clone, Copy)]
pub struct RuleContext<'r, 'input> {
    /// The parsed input document
    pub document: &'r Document<'input>,
    /// Prefix bindings for path expressions
    pub namespaces: &'r NamespaceContext,
    /// Values for `${name}` placeholders
    pub variables: Option<&'r dyn VariableSource>,
    /// The record under construction
    pub record: Option<&'r FacetRecord>,
}

impl fmt::Debug for RuleContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("namespaces", self.namespaces)
            .field("has_variables", &self.variables.is_some())
            .field("record", &self.record.map(FacetRecord::source))
            .finish_non_exhaustive()
    }
}

/// A path expression rule. The expression is compiled once; a compile
/// failure is kept and reported each time the rule is evaluated.
#[derive(Debug, Clone)]
pub struct PathRule {
    source: String,
    compiled: std::result::Result<XPath, XPathError>,
}

/// A literal string rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRule {
    template: String,
    expand: bool,
}

/// One way of computing a field value.
#[derive(Debug, Clone)]
pub enum MappingRule {
    /// Evaluate a path expression
    Path(PathRule),
    /// Return a (possibly expanded) literal
    Template(TemplateRule),
}

impl MappingRule {
    /// Create a path rule, compiling `expression`.
    ///
    /// Compile errors are logged here and the rule evaluates to the empty
    /// string.
    #[must_use]
    pub fn path(expression: &str) -> Self {
        let compiled = XPath::compile(expression);
        if let Err(e) = &compiled {
            error!(expression, error = %e, "cannot compile path expression");
        }
        MappingRule::Path(PathRule {
            source: expression.to_string(),
            compiled,
        })
    }

    /// Create a template rule. Placeholders are only expanded when `expand`
    /// is set.
    #[must_use]
    pub fn template(template: &str, expand: bool) -> Self {
        MappingRule::Template(TemplateRule {
            template: template.to_string(),
            expand,
        })
    }

    /// Evaluate the rule. Failures are logged and yield the empty string.
    #[must_use]
    pub fn evaluate(&self, ctx: &RuleContext<'_, '_>) -> String {
        match self {
            MappingRule::Path(rule) => rule.evaluate(ctx),
            MappingRule::Template(rule) => rule.evaluate(ctx),
        }
    }
}

impl PathRule {
    /// The expression text.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.source
    }

    fn evaluate(&self, ctx: &RuleContext<'_, '_>) -> String {
        let compiled = match &self.compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                error!(expression = %self.source, error = %e, "skipping uncompilable path expression");
                return String::new();
            }
        };
        match compiled.evaluate_string(ctx.document, ctx.namespaces) {
            Ok(value) => value.trim().to_string(),
            Err(e) => {
                error!(expression = %self.source, error = %e, "path expression failed");
                String::new()
            }
        }
    }
}

impl TemplateRule {
    /// The template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Whether placeholders are expanded.
    #[must_use]
    pub fn expands(&self) -> bool {
        self.expand
    }

    fn evaluate(&self, ctx: &RuleContext<'_, '_>) -> String {
        if !self.expand {
            return self.template.clone();
        }
        match expand(&self.template, ctx.variables, ctx.record) {
            Ok(value) => value,
            Err(e) => {
                error!(template = %self.template, error = %e, "template expansion failed");
                String::new()
            }
        }
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingRule::Path(rule) => write!(f, "XPath '{}'", rule.source),
            MappingRule::Template(rule) => write!(f, "'{}'", rule.template),
        }
    }
}

/// Expand `${name}` placeholders in `template`.
///
/// Each pass finds the leftmost placeholder and replaces every occurrence of
/// it. `${filename}` is the record's source when a record is given; any other
/// name is looked up in `variables` and undefined names expand to nothing.
/// Text that merely looks like `$name` is left alone.
///
/// # Errors
///
/// Returns [`MapperError::Expansion`] if a value contains its own placeholder
/// or expansion does not finish within [`MAX_EXPANSION_PASSES`] passes.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use facetmap::rule::expand;
///
/// let mut vars = HashMap::new();
/// vars.insert("site".to_string(), "example.org".to_string());
///
/// let text = expand("https://${site}/${missing}", Some(&vars), None)?;
/// assert_eq!(text, "https://example.org/");
/// # Ok::<(), facetmap::MapperError>(())
/// ```
pub fn expand(
    template: &str,
    variables: Option<&dyn VariableSource>,
    record: Option<&FacetRecord>,
) -> Result<String> {
    let mut text = template.to_string();

    for _ in 0..MAX_EXPANSION_PASSES {
        let found = PLACEHOLDER
            .captures(&text)
            .map(|c| (c[0].to_string(), c[1].to_string()));
        let Some((placeholder, name)) = found else {
            return Ok(text);
        };

        let value = match record {
            Some(record) if name == FILENAME_VARIABLE => record.source(),
            _ => variables
                .and_then(|vars| vars.variable(&name))
                .unwrap_or_default(),
        };
        if value.contains(&placeholder) {
            return Err(MapperError::Expansion(format!(
                "value of {placeholder} contains {placeholder}"
            )));
        }

        debug!(placeholder = %placeholder, value, "expanding");
        text = text.replace(&placeholder, value);
    }

    if PLACEHOLDER.is_match(&text) {
        Err(MapperError::Expansion(format!(
            "placeholders remain after {MAX_EXPANSION_PASSES} passes in '{template}'"
        )))
    } else {
        Ok(text)
    }
}
