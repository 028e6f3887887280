//! Namespace-aware path expressions evaluated over parsed XML documents.
//!
//! Mapping rules locate values with XPath 1.0 expressions. This module
//! provides a compiler ([`XPath::compile`]) and an evaluator that runs a
//! compiled expression against a [`roxmltree::Document`], resolving prefixed
//! names through a [`NamespaceContext`].
//!
//! Supported:
//!
//! - all XPath 1.0 axes except `namespace::`, abbreviated steps (`.`, `..`,
//!   `@`, `//`), wildcards and `prefix:*`, node type tests
//! - predicates, unions, boolean/comparison/arithmetic operators
//! - the XPath 1.0 core function library (except `id()` and `lang()`)
//! - the XPath 2.0 string functions commonly used in mapping tables:
//!   `string-join`, `upper-case`, `lower-case`, `ends-with`, `matches`,
//!   `replace`, `exists`, `empty`
//! - the XPath 2.0 conditional `if (...) then ... else ...`
//!
//! Not supported: XPath 2.0 sequences of atomic values, so `(a, b)`
//! sequence expressions are a syntax error and sequence-returning functions
//! such as `tokenize()` are unknown functions.
//!
//! The result of an expression is converted to a string with XPath
//! `string()` semantics: a node-set yields the string value of its first node
//! in document order.
//!
//! # Examples
//!
//! ```
//! use facetmap::namespace::NamespaceContext;
//! use facetmap::xpath::XPath;
//!
//! let xml = r#"<record xmlns:dc="http://purl.org/dc/elements/1.1/">
//!     <dc:title>  A title  </dc:title>
//! </record>"#;
//! let doc = roxmltree::Document::parse(xml)?;
//!
//! let mut ns = NamespaceContext::new();
//! ns.bind("dc", "http://purl.org/dc/elements/1.1/");
//!
//! let expr = XPath::compile("normalize-space(/record/dc:title)")?;
//! assert_eq!(expr.evaluate_string(&doc, &ns)?, "A title");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod ast;
mod eval;
mod functions;
mod lexer;
mod parser;

use std::fmt;

use roxmltree::Document;
use thiserror::Error;

use crate::namespace::NamespaceContext;

pub use ast::{Axis, NodeTest, QName};

/// Errors raised while compiling or evaluating a path expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    /// The expression text is not valid XPath.
    #[error("syntax error at offset {offset} in '{expression}': {message}")]
    Syntax {
        /// The full expression text
        expression: String,
        /// Byte offset of the offending token
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// An axis name that does not exist.
    #[error("unknown axis '{0}'")]
    UnknownAxis(String),

    /// A function that is not part of the supported library.
    #[error("unknown function '{0}()'")]
    UnknownFunction(String),

    /// A function called with the wrong number of arguments.
    #[error("function {name}() expects {expected} argument(s), got {found}")]
    Arity {
        /// Function name
        name: String,
        /// Human readable expected count, e.g. "1 or 2"
        expected: String,
        /// Number of arguments supplied
        found: usize,
    },

    /// A prefix used in a name test has no binding in the namespace context.
    #[error("namespace prefix '{0}' is not bound")]
    UnboundPrefix(String),

    /// A `$variable` reference; rule expressions have no variable bindings.
    #[error("variable ${0} is not defined")]
    UndefinedVariable(String),

    /// An operand of the wrong type, e.g. a union of strings.
    #[error("type error: {0}")]
    Type(String),

    /// A malformed regular expression passed to `matches()` or `replace()`.
    #[error("invalid regular expression '{pattern}': {message}")]
    Regex {
        /// The pattern as written
        pattern: String,
        /// Regex compiler message
        message: String,
    },
}

/// A compiled path expression.
///
/// Compilation happens once, when the mapping table is loaded; the compiled
/// form is immutable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: ast::Expr,
}

impl XPath {
    /// Compile `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::Syntax`] for malformed expressions and
    /// [`XPathError::UnknownAxis`] for unknown axis names.
    pub fn compile(expression: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(expression)?;
        Ok(Self {
            source: expression.to_string(),
            expr,
        })
    }

    /// The expression text this was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `document` and convert the result to a string.
    ///
    /// The string is returned as computed; callers that want trimmed values
    /// trim it themselves.
    ///
    /// # Errors
    ///
    /// Returns an error for unbound prefixes, unknown functions, wrong
    /// argument counts, type errors and malformed regular expressions.
    pub fn evaluate_string(
        &self,
        document: &Document<'_>,
        namespaces: &NamespaceContext,
    ) -> Result<String, XPathError> {
        let evaluator = eval::Evaluator::new(namespaces);
        let value = evaluator.evaluate(&self.expr, document.root())?;
        Ok(value.into_string())
    }

    /// Evaluate against `document` and convert the result to a boolean.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate_string`](Self::evaluate_string).
    pub fn evaluate_boolean(
        &self,
        document: &Document<'_>,
        namespaces: &NamespaceContext,
    ) -> Result<bool, XPathError> {
        let evaluator = eval::Evaluator::new(namespaces);
        let value = evaluator.evaluate(&self.expr, document.root())?;
        Ok(value.to_boolean())
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DC: &str = "http://purl.org/dc/elements/1.1/";

    const RECORD: &str = r#"<?xml version="1.0"?>
<record xmlns="http://example.org/record" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:title xml:lang="en">  The Sound of Finnish  </dc:title>
  <dc:title xml:lang="fi">Suomen äänet</dc:title>
  <dc:creator>Virtanen, Aino</dc:creator>
  <dc:creator>Korhonen, Eero</dc:creator>
  <dc:subject>phonetics</dc:subject>
  <dc:subject>vowel harmony</dc:subject>
  <dc:date>2013-05-02</dc:date>
  <size unit="MB">12</size>
  <size unit="MB">30</size>
  <plain>no namespace here</plain>
  <!-- a comment -->
</record>"#;

    fn namespaces() -> NamespaceContext {
        let mut ns = NamespaceContext::new();
        ns.bind("dc", DC);
        ns.bind("r", "http://example.org/record");
        ns
    }

    fn eval(expression: &str) -> Result<String, XPathError> {
        let doc = Document::parse(RECORD).unwrap();
        XPath::compile(expression)?.evaluate_string(&doc, &namespaces())
    }

    #[test]
    fn test_first_node_string_value() {
        assert_eq!(eval("//dc:creator").unwrap(), "Virtanen, Aino");
        assert_eq!(eval("/r:record/dc:title").unwrap(), "  The Sound of Finnish  ");
    }

    #[test]
    fn test_default_namespace_needs_prefix() {
        assert_eq!(eval("/record/dc:date").unwrap(), "");
        assert_eq!(eval("/r:record/dc:date").unwrap(), "2013-05-02");
        assert_eq!(eval("//plain").unwrap(), "");
        assert_eq!(eval("//r:plain").unwrap(), "no namespace here");
    }

    #[test]
    fn test_attribute_predicates() {
        assert_eq!(eval("//dc:title[@xml:lang='fi']").unwrap(), "Suomen äänet");
        assert_eq!(eval("//r:size[1]/@unit").unwrap(), "MB");
        assert_eq!(eval("//r:size[last()]").unwrap(), "30");
        assert_eq!(eval("//r:size[. > 20]").unwrap(), "30");
    }

    #[test]
    fn test_positional_predicates() {
        assert_eq!(eval("//dc:creator[2]").unwrap(), "Korhonen, Eero");
        assert_eq!(eval("(//dc:subject)[2]").unwrap(), "vowel harmony");
        assert_eq!(eval("//dc:creator[position() = 3]").unwrap(), "");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("normalize-space(//dc:title)").unwrap(), "The Sound of Finnish");
        assert_eq!(
            eval("string-join(//dc:subject, ',')").unwrap(),
            "phonetics,vowel harmony"
        );
        assert_eq!(
            eval("concat(//dc:date, ' / ', count(//dc:creator))").unwrap(),
            "2013-05-02 / 2"
        );
        assert_eq!(eval("substring-before(//dc:date, '-')").unwrap(), "2013");
        assert_eq!(eval("upper-case(//dc:subject[1])").unwrap(), "PHONETICS");
    }

    #[test]
    fn test_numbers_and_booleans() {
        assert_eq!(eval("sum(//r:size)").unwrap(), "42");
        assert_eq!(eval("sum(//r:size) div 4").unwrap(), "10.5");
        assert_eq!(eval("count(//dc:title) = 2").unwrap(), "true");
        assert_eq!(eval("number('abc')").unwrap(), "NaN");
    }

    #[test]
    fn test_union_is_document_ordered() {
        assert_eq!(eval("//dc:date | //dc:creator").unwrap(), "Virtanen, Aino");
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(eval("//dc:publisher").unwrap(), "");
    }

    #[test]
    fn test_unbound_prefix_is_error() {
        assert_eq!(
            eval("//foo:bar"),
            Err(XPathError::UnboundPrefix("foo".to_string()))
        );
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            XPath::compile("//dc:title["),
            Err(XPathError::Syntax { .. })
        ));
        assert!(matches!(
            XPath::compile("sideways::x"),
            Err(XPathError::UnknownAxis(_))
        ));
        assert!(matches!(XPath::compile("'open"), Err(XPathError::Syntax { .. })));
    }

    #[test]
    fn test_conditional() {
        assert_eq!(
            eval("if (//dc:date) then 'dated' else 'undated'").unwrap(),
            "dated"
        );
        assert_eq!(
            eval("if (//dc:rights) then 'restricted' else //dc:date").unwrap(),
            "2013-05-02"
        );
    }

    #[test]
    fn test_sequence_constructs_are_rejected() {
        assert!(matches!(
            XPath::compile("//dc:subject[. = ('a', 'b')]"),
            Err(XPathError::Syntax { .. })
        ));
        assert_eq!(
            eval("tokenize(//dc:date, '-')"),
            Err(XPathError::UnknownFunction("tokenize".to_string()))
        );
    }

    #[test]
    fn test_unknown_function_fails_at_evaluation() {
        assert_eq!(
            eval("frobnicate(//dc:date)"),
            Err(XPathError::UnknownFunction("frobnicate".to_string()))
        );
    }

    #[test]
    fn test_display_is_source() {
        let expr = XPath::compile("//dc:title").unwrap();
        assert_eq!(expr.to_string(), "//dc:title");
        assert_eq!(expr.as_str(), "//dc:title");
    }

    #[test]
    fn test_evaluate_boolean() {
        let doc = Document::parse(RECORD).unwrap();
        let ns = namespaces();
        assert!(XPath::compile("//dc:date")
            .unwrap()
            .evaluate_boolean(&doc, &ns)
            .unwrap());
        assert!(!XPath::compile("//dc:rights")
            .unwrap()
            .evaluate_boolean(&doc, &ns)
            .unwrap());
    }
}
