//! Syntax tree for compiled path expressions.

use std::fmt;

/// A possibly prefixed name as written in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    /// Namespace prefix, resolved through the namespace context
    pub prefix: Option<String>,
    /// Local part
    pub local: String,
}

impl QName {
    /// An unprefixed name.
    #[must_use]
    pub fn local(local: &str) -> Self {
        Self {
            prefix: None,
            local: local.to_string(),
        }
    }

    /// A `prefix:local` name.
    #[must_use]
    pub fn prefixed(prefix: &str, local: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            local: local.to_string(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Location step axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `ancestor::`
    Ancestor,
    /// `ancestor-or-self::`
    AncestorOrSelf,
    /// `attribute::` or `@`
    Attribute,
    /// `child::` (the default axis)
    Child,
    /// `descendant::`
    Descendant,
    /// `descendant-or-self::`
    DescendantOrSelf,
    /// `following::`
    Following,
    /// `following-sibling::`
    FollowingSibling,
    /// `namespace::` (parsed, always empty)
    Namespace,
    /// `parent::` or `..`
    Parent,
    /// `preceding::`
    Preceding,
    /// `preceding-sibling::`
    PrecedingSibling,
    /// `self::` or `.`
    SelfNode,
}

impl Axis {
    /// Look up an axis by its XPath name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "namespace" => Self::Namespace,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfNode,
            _ => return None,
        })
    }
}

/// What a location step selects on its axis.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// A named element or attribute
    Name(QName),
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`, optionally with a target literal
    ProcessingInstruction(Option<String>),
    /// `node()`
    AnyNode,
}

/// One step of a location path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// The `descendant-or-self::node()` step that `//` abbreviates.
    pub fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

/// Where a location path starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathStart {
    /// The document root (`/...`)
    Root,
    /// The context node (relative path)
    Context,
    /// The node-set produced by a filter expression (`(...)/...`)
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arithmetic(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path { start: PathStart, steps: Vec<Step> },
    Filter { base: Box<Expr>, predicates: Vec<Expr> },
    Literal(String),
    Number(f64),
    Variable(String),
    Function { name: String, args: Vec<Expr> },
    /// `if (condition) then a else b`
    If { condition: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
}
