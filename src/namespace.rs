//! Namespace prefix bindings used when evaluating path expressions.
//!
//! A [`NamespaceContext`] is filled from the `<namespaces>` section of a
//! mapping table and is read-only afterwards. Qualified names such as
//! `dc:title` in a rule are resolved through it.
//!
//! # Reverse lookup
//!
//! Several prefixes may legitimately be bound to the same URI, e.g.
//!
//! ```text
//! <parent xmlns:prefix1="http://example.org/ns">
//!   <child xmlns:prefix2="http://example.org/ns"/>
//! </parent>
//! ```
//!
//! This context keeps only one prefix per URI (the one bound last). Forward
//! lookup is exact; [`NamespaceContext::resolve_prefix`] and
//! [`NamespaceContext::prefixes`] return at most one prefix.
//!
//! # Examples
//!
//! ```
//! use facetmap::namespace::{NamespaceContext, XML_NS_URI};
//!
//! let mut ns = NamespaceContext::new();
//! ns.bind("dc", "http://purl.org/dc/elements/1.1/");
//!
//! assert_eq!(ns.resolve_uri("dc"), "http://purl.org/dc/elements/1.1/");
//! assert_eq!(ns.resolve_prefix("http://purl.org/dc/elements/1.1/"), Some("dc"));
//! assert_eq!(ns.resolve_uri("xml"), XML_NS_URI);
//! assert_eq!(ns.resolve_uri("unbound"), "");
//! ```

use std::collections::HashMap;

use tracing::debug;

/// The prefix reserved by XML for [`XML_NS_URI`].
pub const XML_NS_PREFIX: &str = "xml";

/// The namespace bound to the `xml` prefix by definition.
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// The attribute name reserved for namespace declarations.
pub const XMLNS_ATTRIBUTE: &str = "xmlns";

/// The namespace bound to the `xmlns` prefix by definition.
pub const XMLNS_ATTRIBUTE_NS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Prefix <-> URI bindings for path expression evaluation.
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    prefix_to_uri: HashMap<String, String>,
    uri_to_prefix: HashMap<String, String>,
}

impl NamespaceContext {
    /// Create an empty context. The `xml` and `xmlns` prefixes resolve even
    /// when nothing has been bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri`, replacing any earlier binding of the prefix.
    ///
    /// The reverse entry for `uri` is overwritten as well, so the last prefix
    /// bound to a URI is the one [`resolve_prefix`](Self::resolve_prefix)
    /// returns.
    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        debug!(prefix = %prefix, uri = %uri, "binding namespace");
        self.uri_to_prefix.insert(uri.clone(), prefix.clone());
        self.prefix_to_uri.insert(prefix, uri);
    }

    /// Look up the URI bound to `prefix`.
    ///
    /// Falls back to the URIs fixed by the XML specification for `xml` and
    /// `xmlns`, and to the empty string for any other unbound prefix.
    #[must_use]
    pub fn resolve_uri(&self, prefix: &str) -> &str {
        if let Some(uri) = self.prefix_to_uri.get(prefix) {
            return uri;
        }
        match prefix {
            XML_NS_PREFIX => XML_NS_URI,
            XMLNS_ATTRIBUTE => XMLNS_ATTRIBUTE_NS_URI,
            _ => "",
        }
    }

    /// Look up the prefix bound to `uri`, or `None` if there is none.
    #[must_use]
    pub fn resolve_prefix(&self, uri: &str) -> Option<&str> {
        if let Some(prefix) = self.uri_to_prefix.get(uri) {
            return Some(prefix);
        }
        match uri {
            XML_NS_URI => Some(XML_NS_PREFIX),
            XMLNS_ATTRIBUTE_NS_URI => Some(XMLNS_ATTRIBUTE),
            _ => None,
        }
    }

    /// All prefixes bound to `uri`. Yields at most one item.
    pub fn prefixes<'a>(&'a self, uri: &str) -> impl Iterator<Item = &'a str> {
        self.resolve_prefix(uri).into_iter()
    }

    /// Number of explicit bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefix_to_uri.len()
    }

    /// Returns `true` if nothing has been bound explicitly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix_to_uri.is_empty()
    }
}
