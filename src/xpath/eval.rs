//! Evaluation of compiled expressions over a `roxmltree` document.

use std::iter::successors;

use roxmltree::Node;

use super::ast::{ArithOp, Axis, CompareOp, Expr, NodeTest, PathStart, Step};
use super::functions;
use super::XPathError;
use crate::namespace::{NamespaceContext, XML_NS_PREFIX, XML_NS_URI};

/// A node in the XPath data model: a tree node, or the `index`th attribute
/// of an element (`roxmltree` attributes are not nodes).
#[derive(Debug, Clone, Copy)]
pub(crate) enum XNode<'a, 'input: 'a> {
    Tree(Node<'a, 'input>),
    Attribute(Node<'a, 'input>, usize),
}

impl<'a, 'input: 'a> XNode<'a, 'input> {
    /// Sort key giving document order; attributes follow their element.
    fn order_key(&self) -> (u32, usize) {
        match *self {
            XNode::Tree(node) => (node.id().get(), 0),
            XNode::Attribute(owner, index) => (owner.id().get(), index + 1),
        }
    }

    fn owner(&self) -> Node<'a, 'input> {
        match *self {
            XNode::Tree(node) | XNode::Attribute(node, _) => node,
        }
    }

    pub fn string_value(&self) -> String {
        match *self {
            XNode::Tree(node) => {
                if node.is_text() || node.is_comment() {
                    node.text().unwrap_or_default().to_string()
                } else if node.is_pi() {
                    node.pi()
                        .and_then(|pi| pi.value)
                        .unwrap_or_default()
                        .to_string()
                } else {
                    node.descendants()
                        .filter(Node::is_text)
                        .filter_map(|text| text.text())
                        .collect()
                }
            }
            XNode::Attribute(owner, index) => owner
                .attributes()
                .nth(index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn local_name(&self) -> String {
        match *self {
            XNode::Tree(node) if node.is_element() => node.tag_name().name().to_string(),
            XNode::Tree(node) => node
                .pi()
                .map(|pi| pi.target.to_string())
                .unwrap_or_default(),
            XNode::Attribute(owner, index) => owner
                .attributes()
                .nth(index)
                .map(|attr| attr.name().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn namespace_uri(&self) -> Option<String> {
        match *self {
            XNode::Tree(node) if node.is_element() => {
                node.tag_name().namespace().map(str::to_string)
            }
            XNode::Tree(_) => None,
            XNode::Attribute(owner, index) => owner
                .attributes()
                .nth(index)
                .and_then(|attr| attr.namespace().map(str::to_string)),
        }
    }

    /// The name as written in the document, using the prefix in scope.
    pub fn qualified_name(&self) -> String {
        let local = self.local_name();
        let Some(uri) = self.namespace_uri() else {
            return local;
        };
        let prefix = if uri == XML_NS_URI {
            Some(XML_NS_PREFIX)
        } else {
            self.owner().lookup_prefix(&uri)
        };
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
            _ => local,
        }
    }

    fn has_name(&self, uri: Option<&str>, local: &str) -> bool {
        match *self {
            XNode::Tree(node) => {
                node.is_element()
                    && node.tag_name().name() == local
                    && node.tag_name().namespace() == uri
            }
            XNode::Attribute(owner, index) => owner
                .attributes()
                .nth(index)
                .is_some_and(|attr| attr.name() == local && attr.namespace() == uri),
        }
    }
}

/// Intermediate result of an expression.
#[derive(Debug, Clone)]
pub(crate) enum Value<'a, 'input: 'a> {
    Nodes(Vec<XNode<'a, 'input>>),
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, 'input: 'a> Value<'a, 'input> {
    /// XPath `string()` conversion.
    pub fn into_string(self) -> String {
        match self {
            Value::Text(text) => text,
            other => other.to_string_value(),
        }
    }

    pub fn to_string_value(&self) -> String {
        match self {
            Value::Nodes(nodes) => nodes.first().map(XNode::string_value).unwrap_or_default(),
            Value::Text(text) => text.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// XPath `number()` conversion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(text) => parse_number(text),
            Value::Nodes(_) => parse_number(&self.to_string_value()),
        }
    }

    /// XPath `boolean()` conversion.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Text(text) => !text.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    pub fn into_nodes(self, operation: &str) -> Result<Vec<XNode<'a, 'input>>, XPathError> {
        match self {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(XPathError::Type(format!("{operation} requires a node-set"))),
        }
    }
}

/// Parse a string as an XPath number: optional minus sign, digits, at most one
/// decimal point. Anything else is `NaN`.
pub(crate) fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Format a number the way XPath `string()` does.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// XPath `round()`: halves round towards positive infinity.
pub(crate) fn xpath_round(n: f64) -> f64 {
    (n + 0.5).floor()
}

/// Evaluation context: the node plus its position in the current node-set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a, 'input: 'a> {
    pub node: XNode<'a, 'input>,
    pub position: usize,
    pub size: usize,
}

/// Node tests with their prefixes already resolved.
enum Matcher<'t> {
    Any,
    Text,
    Comment,
    ProcessingInstruction(Option<&'t str>),
    Principal,
    Namespace(&'t str),
    Name { uri: Option<&'t str>, local: &'t str },
}

pub(crate) struct Evaluator<'c> {
    namespaces: &'c NamespaceContext,
}

impl<'c> Evaluator<'c> {
    pub fn new(namespaces: &'c NamespaceContext) -> Self {
        Self { namespaces }
    }

    /// Evaluate `expr` with the document root as context node.
    pub fn evaluate<'a, 'input: 'a>(
        &self,
        expr: &Expr,
        root: Node<'a, 'input>,
    ) -> Result<Value<'a, 'input>, XPathError> {
        let context = Context {
            node: XNode::Tree(root),
            position: 1,
            size: 1,
        };
        self.eval(expr, &context)
    }

    pub fn eval<'a, 'input: 'a>(
        &self,
        expr: &Expr,
        ctx: &Context<'a, 'input>,
    ) -> Result<Value<'a, 'input>, XPathError> {
        match expr {
            Expr::Or(lhs, rhs) => Ok(Value::Boolean(
                self.eval(lhs, ctx)?.to_boolean() || self.eval(rhs, ctx)?.to_boolean(),
            )),
            Expr::And(lhs, rhs) => Ok(Value::Boolean(
                self.eval(lhs, ctx)?.to_boolean() && self.eval(rhs, ctx)?.to_boolean(),
            )),
            Expr::Compare(op, lhs, rhs) => {
                let left = self.eval(lhs, ctx)?;
                let right = self.eval(rhs, ctx)?;
                Ok(Value::Boolean(compare(*op, &left, &right)))
            }
            Expr::Arithmetic(op, lhs, rhs) => {
                let a = self.eval(lhs, ctx)?.to_number();
                let b = self.eval(rhs, ctx)?.to_number();
                Ok(Value::Number(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                }))
            }
            Expr::Negate(operand) => Ok(Value::Number(-self.eval(operand, ctx)?.to_number())),
            Expr::Union(lhs, rhs) => {
                let mut nodes = self.eval(lhs, ctx)?.into_nodes("union")?;
                nodes.extend(self.eval(rhs, ctx)?.into_nodes("union")?);
                sort_document_order(&mut nodes);
                Ok(Value::Nodes(nodes))
            }
            Expr::Path { start, steps } => {
                let mut nodes = match start {
                    PathStart::Root => vec![XNode::Tree(ctx.node.owner().document().root())],
                    PathStart::Context => vec![ctx.node],
                    PathStart::Expr(base) => self.eval(base, ctx)?.into_nodes("path step")?,
                };
                for step in steps {
                    nodes = self.apply_step(&nodes, step)?;
                }
                Ok(Value::Nodes(nodes))
            }
            Expr::Filter { base, predicates } => {
                let mut nodes = self.eval(base, ctx)?.into_nodes("predicate")?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::Nodes(nodes))
            }
            Expr::Literal(text) => Ok(Value::Text(text.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Variable(name) => Err(XPathError::UndefinedVariable(name.clone())),
            Expr::Function { name, args } => functions::call(self, name, args, ctx),
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition, ctx)?.to_boolean() {
                    self.eval(then, ctx)
                } else {
                    self.eval(otherwise, ctx)
                }
            }
        }
    }

    fn resolve(&self, prefix: &str) -> Result<&'c str, XPathError> {
        let uri = self.namespaces.resolve_uri(prefix);
        if uri.is_empty() {
            Err(XPathError::UnboundPrefix(prefix.to_string()))
        } else {
            Ok(uri)
        }
    }

    fn matcher<'t>(&'t self, test: &'t NodeTest) -> Result<Matcher<'t>, XPathError> {
        Ok(match test {
            NodeTest::AnyNode => Matcher::Any,
            NodeTest::Text => Matcher::Text,
            NodeTest::Comment => Matcher::Comment,
            NodeTest::ProcessingInstruction(target) => {
                Matcher::ProcessingInstruction(target.as_deref())
            }
            NodeTest::Wildcard => Matcher::Principal,
            NodeTest::PrefixWildcard(prefix) => Matcher::Namespace(self.resolve(prefix)?),
            NodeTest::Name(name) => Matcher::Name {
                uri: match &name.prefix {
                    Some(prefix) => Some(self.resolve(prefix)?),
                    None => None,
                },
                local: &name.local,
            },
        })
    }

    fn apply_step<'a, 'input: 'a>(
        &self,
        input: &[XNode<'a, 'input>],
        step: &Step,
    ) -> Result<Vec<XNode<'a, 'input>>, XPathError> {
        let matcher = self.matcher(&step.test)?;
        let attribute_axis = step.axis == Axis::Attribute;

        let mut output = Vec::new();
        for &node in input {
            let mut selected: Vec<XNode<'a, 'input>> = axis_nodes(node, step.axis)
                .into_iter()
                .filter(|candidate| matches(&matcher, *candidate, attribute_axis))
                .collect();
            for predicate in &step.predicates {
                selected = self.filter(selected, predicate)?;
            }
            output.extend(selected);
        }

        sort_document_order(&mut output);
        Ok(output)
    }

    /// Apply one predicate. `nodes` must be in axis order so that positions
    /// are proximity positions.
    fn filter<'a, 'input: 'a>(
        &self,
        nodes: Vec<XNode<'a, 'input>>,
        predicate: &Expr,
    ) -> Result<Vec<XNode<'a, 'input>>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Number(n) => is_position(n, index + 1),
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }
}

#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn is_position(n: f64, position: usize) -> bool {
    n == position as f64
}

fn matches(matcher: &Matcher<'_>, node: XNode<'_, '_>, attribute_axis: bool) -> bool {
    let principal = match node {
        XNode::Tree(tree) => !attribute_axis && tree.is_element(),
        XNode::Attribute(..) => attribute_axis,
    };
    match matcher {
        Matcher::Any => true,
        Matcher::Text => matches!(node, XNode::Tree(tree) if tree.is_text()),
        Matcher::Comment => matches!(node, XNode::Tree(tree) if tree.is_comment()),
        Matcher::ProcessingInstruction(target) => match node {
            XNode::Tree(tree) => tree
                .pi()
                .is_some_and(|pi| target.map_or(true, |t| t == pi.target)),
            XNode::Attribute(..) => false,
        },
        Matcher::Principal => principal,
        Matcher::Namespace(uri) => principal && node.namespace_uri().as_deref() == Some(*uri),
        Matcher::Name { uri, local } => principal && node.has_name(*uri, local),
    }
}

/// Nodes on `axis` from `node`, in axis order (reverse axes nearest first).
fn axis_nodes<'a, 'input: 'a>(node: XNode<'a, 'input>, axis: Axis) -> Vec<XNode<'a, 'input>> {
    let tree = match node {
        XNode::Tree(tree) => tree,
        XNode::Attribute(owner, _) => {
            return match axis {
                Axis::SelfNode => vec![node],
                Axis::Parent => vec![XNode::Tree(owner)],
                Axis::Ancestor => ancestors_or_self(owner),
                Axis::AncestorOrSelf => {
                    let mut nodes = vec![node];
                    nodes.extend(ancestors_or_self(owner));
                    nodes
                }
                Axis::Following => {
                    let mut nodes = descendants(owner);
                    nodes.extend(following(owner));
                    nodes
                }
                Axis::Preceding => preceding(owner),
                _ => Vec::new(),
            };
        }
    };

    match axis {
        Axis::Child => tree.children().map(XNode::Tree).collect(),
        Axis::Descendant => descendants(tree),
        Axis::DescendantOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(descendants(tree));
            nodes
        }
        Axis::SelfNode => vec![node],
        Axis::Parent => tree.parent().map(XNode::Tree).into_iter().collect(),
        Axis::Ancestor => tree.parent().map_or_else(Vec::new, ancestors_or_self),
        Axis::AncestorOrSelf => ancestors_or_self(tree),
        Axis::FollowingSibling => successors(tree.next_sibling(), Node::next_sibling)
            .map(XNode::Tree)
            .collect(),
        Axis::PrecedingSibling => successors(tree.prev_sibling(), Node::prev_sibling)
            .map(XNode::Tree)
            .collect(),
        Axis::Following => following(tree),
        Axis::Preceding => preceding(tree),
        Axis::Attribute if tree.is_element() => (0..tree.attributes().count())
            .map(|index| XNode::Attribute(tree, index))
            .collect(),
        Axis::Attribute | Axis::Namespace => Vec::new(),
    }
}

/// Proper descendants in document order.
fn descendants<'a, 'input: 'a>(node: Node<'a, 'input>) -> Vec<XNode<'a, 'input>> {
    node.descendants()
        .filter(|d| *d != node)
        .map(XNode::Tree)
        .collect()
}

fn ancestors_or_self<'a, 'input: 'a>(node: Node<'a, 'input>) -> Vec<XNode<'a, 'input>> {
    successors(Some(node), Node::parent).map(XNode::Tree).collect()
}

fn following<'a, 'input: 'a>(node: Node<'a, 'input>) -> Vec<XNode<'a, 'input>> {
    let mut nodes = Vec::new();
    for ancestor in successors(Some(node), Node::parent) {
        for sibling in successors(ancestor.next_sibling(), Node::next_sibling) {
            nodes.push(XNode::Tree(sibling));
            nodes.extend(descendants(sibling));
        }
    }
    nodes
}

fn preceding<'a, 'input: 'a>(node: Node<'a, 'input>) -> Vec<XNode<'a, 'input>> {
    let ancestors: Vec<Node<'a, 'input>> = successors(node.parent(), Node::parent).collect();
    let mut nodes: Vec<XNode<'a, 'input>> = node
        .document()
        .root()
        .descendants()
        .take_while(|d| *d != node)
        .filter(|d| !ancestors.contains(d))
        .map(XNode::Tree)
        .collect();
    nodes.reverse();
    nodes
}

pub(crate) fn sort_document_order(nodes: &mut Vec<XNode<'_, '_>>) {
    nodes.sort_by_key(XNode::order_key);
    nodes.dedup_by_key(|node| node.order_key());
}

fn compare(op: CompareOp, lhs: &Value<'_, '_>, rhs: &Value<'_, '_>) -> bool {
    match (lhs, rhs) {
        (Value::Nodes(left), Value::Nodes(right)) => {
            let right: Vec<Value<'_, '_>> = right
                .iter()
                .map(|node| Value::Text(node.string_value()))
                .collect();
            left.iter().any(|node| {
                let left = Value::Text(node.string_value());
                right.iter().any(|r| compare_atomic(op, &left, r))
            })
        }
        (Value::Nodes(nodes), other) => compare_node_set(op, nodes, other, false),
        (other, Value::Nodes(nodes)) => compare_node_set(op, nodes, other, true),
        _ => compare_atomic(op, lhs, rhs),
    }
}

/// Existential comparison of a node-set with a single value. `swapped` means
/// the node-set was the right-hand operand.
fn compare_node_set(
    op: CompareOp,
    nodes: &[XNode<'_, '_>],
    other: &Value<'_, '_>,
    swapped: bool,
) -> bool {
    let ordered = |atom: &Value<'_, '_>| {
        if swapped {
            compare_atomic(op, other, atom)
        } else {
            compare_atomic(op, atom, other)
        }
    };
    match other {
        Value::Boolean(_) => ordered(&Value::Boolean(!nodes.is_empty())),
        Value::Number(_) => nodes
            .iter()
            .any(|node| ordered(&Value::Number(parse_number(&node.string_value())))),
        _ => nodes
            .iter()
            .any(|node| ordered(&Value::Text(node.string_value()))),
    }
}

fn compare_atomic(op: CompareOp, a: &Value<'_, '_>, b: &Value<'_, '_>) -> bool {
    match op {
        CompareOp::Eq => atomic_equals(a, b),
        CompareOp::Ne => !atomic_equals(a, b),
        CompareOp::Lt => a.to_number() < b.to_number(),
        CompareOp::Le => a.to_number() <= b.to_number(),
        CompareOp::Gt => a.to_number() > b.to_number(),
        CompareOp::Ge => a.to_number() >= b.to_number(),
    }
}

#[allow(clippy::float_cmp)]
fn atomic_equals(a: &Value<'_, '_>, b: &Value<'_, '_>) -> bool {
    if matches!(a, Value::Boolean(_)) || matches!(b, Value::Boolean(_)) {
        a.to_boolean() == b.to_boolean()
    } else if matches!(a, Value::Number(_)) || matches!(b, Value::Number(_)) {
        a.to_number() == b.to_number()
    } else {
        a.to_string_value() == b.to_string_value()
    }
}
