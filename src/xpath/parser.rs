//! Recursive descent parser producing [`Expr`] trees.
//!
//! Grammar follows XPath 1.0 section 3 (`OrExpr` down to `PrimaryExpr`).
//! Because operators are only looked for after a complete operand, `*`,
//! `and`, `or`, `div` and `mod` need no lexical disambiguation.

use super::ast::{ArithOp, Axis, CompareOp, Expr, NodeTest, PathStart, QName, Step};
use super::lexer::{tokenize, Spanned, Token};
use super::XPathError;

const NODE_TYPES: [&str; 4] = ["node", "text", "comment", "processing-instruction"];

/// Parse a complete expression.
pub(crate) fn parse(expression: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        pos: 0,
    };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected token after end of expression"));
    }
    Ok(expr)
}

struct Parser<'s> {
    expression: &'s str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Name(QName { prefix: None, local })) if local == keyword => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), XPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> XPathError {
        let offset = self
            .tokens
            .get(self.pos)
            .map_or(self.expression.len(), |s| s.offset);
        XPathError::Syntax {
            expression: self.expression.to_string(),
            offset,
            message: message.to_string(),
        }
    }

    fn expr(&mut self) -> Result<Expr, XPathError> {
        let conditional = matches!(
            (self.peek(), self.peek_at(1)),
            (Some(Token::Name(QName { prefix: None, local })), Some(Token::LParen)) if local == "if"
        );
        if conditional {
            return self.if_expr();
        }
        self.or_expr()
    }

    /// `if (condition) then expr else expr`, the XPath 2.0 conditional.
    fn if_expr(&mut self) -> Result<Expr, XPathError> {
        self.pos += 2;
        let condition = self.expr()?;
        self.expect(&Token::RParen, "')' after condition")?;
        if !self.eat_keyword("then") {
            return Err(self.error("expected 'then'"));
        }
        let then = self.expr()?;
        if !self.eat_keyword("else") {
            return Err(self.error("expected 'else'"));
        }
        let otherwise = self.expr()?;
        Ok(Expr::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.equality_expr()?;
        while self.eat_keyword("and") {
            let rhs = self.equality_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.relational_expr()?;
        loop {
            let op = if self.eat(&Token::Equal) {
                CompareOp::Eq
            } else if self.eat(&Token::NotEqual) {
                CompareOp::Ne
            } else {
                break;
            };
            let rhs = self.relational_expr()?;
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => CompareOp::Lt,
                Some(Token::LessEqual) => CompareOp::Le,
                Some(Token::Greater) => CompareOp::Gt,
                Some(Token::GreaterEqual) => CompareOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.additive_expr()?;
            lhs = Expr::Compare(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                ArithOp::Add
            } else if self.eat(&Token::Minus) {
                ArithOp::Sub
            } else {
                break;
            };
            let rhs = self.multiplicative_expr()?;
            lhs = Expr::Arithmetic(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = if self.eat(&Token::Star) {
                ArithOp::Mul
            } else if self.eat_keyword("div") {
                ArithOp::Div
            } else if self.eat_keyword("mod") {
                ArithOp::Mod
            } else {
                break;
            };
            let rhs = self.unary_expr()?;
            lhs = Expr::Arithmetic(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut lhs = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let rhs = self.path_expr()?;
            lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Slash) {
            let steps = if self.starts_step() {
                self.relative_path()?
            } else {
                Vec::new()
            };
            return Ok(Expr::Path {
                start: PathStart::Root,
                steps,
            });
        }

        if self.eat(&Token::DoubleSlash) {
            let mut steps = vec![Step::descendant_or_self()];
            steps.extend(self.relative_path()?);
            return Ok(Expr::Path {
                start: PathStart::Root,
                steps,
            });
        }

        if self.starts_step() {
            let steps = self.relative_path()?;
            return Ok(Expr::Path {
                start: PathStart::Context,
                steps,
            });
        }

        let base = self.filter_expr()?;
        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                break;
            }
        }

        if steps.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Path {
                start: PathStart::Expr(Box::new(base)),
                steps,
            })
        }
    }

    /// Whether the next token begins a location step rather than a filter
    /// expression.
    fn starts_step(&self) -> bool {
        match self.peek() {
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::PrefixWildcard(_)) => {
                true
            }
            Some(Token::Name(name)) => match self.peek_at(1) {
                Some(Token::LParen) => {
                    name.prefix.is_none() && NODE_TYPES.contains(&name.local.as_str())
                }
                _ => true,
            },
            _ => false,
        }
    }

    /// The axis name if the next tokens are `name ::`.
    fn axis_ahead(&self) -> Option<QName> {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Name(name)), Some(Token::DoubleColon)) => Some(name.clone()),
            _ => None,
        }
    }

    fn relative_path(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = vec![self.step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        Ok(steps)
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(name) = self.axis_ahead() {
            let axis = match &name.prefix {
                None => Axis::from_name(&name.local),
                Some(_) => None,
            }
            .ok_or_else(|| XPathError::UnknownAxis(name.to_string()))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Wildcard),
            Some(Token::PrefixWildcard(prefix)) => Ok(NodeTest::PrefixWildcard(prefix)),
            Some(Token::Name(name)) => {
                let is_type_test = name.prefix.is_none()
                    && NODE_TYPES.contains(&name.local.as_str())
                    && self.peek() == Some(&Token::LParen);
                if !is_type_test {
                    return Ok(NodeTest::Name(name));
                }
                self.pos += 1;
                let test = match name.local.as_str() {
                    "node" => NodeTest::AnyNode,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RParen, "')' after node type test")?;
                Ok(test)
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected a node test"))
            }
            None => Err(self.error("expected a node test")),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(&Token::RBracket, "']' to close predicate")?;
        }
        Ok(predicates)
    }

    fn filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                base: Box::new(primary),
                predicates,
            })
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.advance() {
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::Literal(text)) => Ok(Expr::Literal(text)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                if self.peek() == Some(&Token::Comma) {
                    return Err(self.error("sequence expressions are not supported"));
                }
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let args = self.arguments()?;
                let name = match name.prefix.as_deref() {
                    None | Some("fn") => name.local,
                    Some(_) => name.to_string(),
                };
                Ok(Expr::Function { name, args })
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected an expression"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "',' or ')' in argument list")?;
            return Ok(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_step(axis: Axis, prefix: Option<&str>, local: &str) -> Step {
        Step {
            axis,
            test: NodeTest::Name(match prefix {
                Some(p) => QName::prefixed(p, local),
                None => QName::local(local),
            }),
            predicates: Vec::new(),
        }
    }

    #[test]
    fn test_abbreviated_descendant() {
        let expr = parse("//dc:title").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                start: PathStart::Root,
                steps: vec![
                    Step::descendant_or_self(),
                    name_step(Axis::Child, Some("dc"), "title"),
                ],
            }
        );
    }

    #[test]
    fn test_root_only() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                start: PathStart::Root,
                steps: Vec::new(),
            }
        );
    }

    #[test]
    fn test_star_is_operator_after_operand() {
        let expr = parse("2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Arithmetic(
                ArithOp::Mul,
                Box::new(Expr::Number(2.0)),
                Box::new(Expr::Number(3.0)),
            )
        );
        // ...and a wildcard in step position
        assert!(matches!(
            parse("/*").unwrap(),
            Expr::Path { ref steps, .. } if steps[0].test == NodeTest::Wildcard
        ));
    }

    #[test]
    fn test_keyword_names_as_elements() {
        let expr = parse("div/mod").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                start: PathStart::Context,
                steps: vec![
                    name_step(Axis::Child, None, "div"),
                    name_step(Axis::Child, None, "mod"),
                ],
            }
        );
    }

    #[test]
    fn test_conditional() {
        assert_eq!(
            parse("if (a) then 'y' else 'n'").unwrap(),
            Expr::If {
                condition: Box::new(Expr::Path {
                    start: PathStart::Context,
                    steps: vec![name_step(Axis::Child, None, "a")],
                }),
                then: Box::new(Expr::Literal("y".to_string())),
                otherwise: Box::new(Expr::Literal("n".to_string())),
            }
        );
        // an element named `if` is still a step
        assert!(matches!(parse("if/x").unwrap(), Expr::Path { .. }));
        assert!(matches!(
            parse("if (a) then 'y'"),
            Err(XPathError::Syntax { .. })
        ));
    }

    #[test]
    fn test_sequence_is_rejected() {
        let err = parse("//x[. = ('1', '2')]").unwrap_err();
        assert!(matches!(
            err,
            XPathError::Syntax { ref message, .. } if message.contains("sequence")
        ));
    }

    #[test]
    fn test_explicit_axes() {
        let expr = parse("ancestor-or-self::x/@y").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                start: PathStart::Context,
                steps: vec![
                    name_step(Axis::AncestorOrSelf, None, "x"),
                    name_step(Axis::Attribute, None, "y"),
                ],
            }
        );
    }

    #[test]
    fn test_node_type_tests() {
        let expr = parse("a/text()").unwrap();
        let Expr::Path { steps, .. } = expr else {
            panic!("expected a path");
        };
        assert_eq!(steps[1].test, NodeTest::Text);

        let expr = parse("processing-instruction('xml-stylesheet')").unwrap();
        let Expr::Path { steps, .. } = expr else {
            panic!("expected a path");
        };
        assert_eq!(
            steps[0].test,
            NodeTest::ProcessingInstruction(Some("xml-stylesheet".to_string()))
        );
    }

    #[test]
    fn test_function_call_with_fn_prefix() {
        let expr = parse("fn:string-join(//a, ', ')").unwrap();
        let Expr::Function { name, args } = expr else {
            panic!("expected a function call");
        };
        assert_eq!(name, "string-join");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_filter_then_path() {
        let expr = parse("(//a)[1]/b").unwrap();
        assert!(matches!(
            expr,
            Expr::Path {
                start: PathStart::Expr(_),
                ..
            }
        ));
    }

    #[test]
    fn test_precedence() {
        // and binds tighter than or
        let expr = parse("a or b and c").unwrap();
        assert!(matches!(expr, Expr::Or(_, ref rhs) if matches!(**rhs, Expr::And(_, _))));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse("//a["),
            Err(XPathError::Syntax { offset: 4, .. })
        ));
        assert!(matches!(parse("a b"), Err(XPathError::Syntax { offset: 2, .. })));
        assert!(matches!(parse("f(1,"), Err(XPathError::Syntax { .. })));
        assert!(matches!(parse(""), Err(XPathError::Syntax { .. })));
    }
}
