//! The function library.

use regex::Regex;

use super::ast::Expr;
use super::eval::{parse_number, xpath_round, Context, Evaluator, Value, XNode};
use super::XPathError;

fn check_arity(name: &str, found: usize, min: usize, max: Option<usize>) -> Result<(), XPathError> {
    let in_range = found >= min && max.map_or(true, |max| found <= max);
    if in_range {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => min.to_string(),
        Some(max) if max == min + 1 => format!("{min} or {max}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    Err(XPathError::Arity {
        name: name.to_string(),
        expected,
        found,
    })
}

fn compile_regex(pattern: &str) -> Result<Regex, XPathError> {
    Regex::new(pattern).map_err(|e| XPathError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Call the function `name` with unevaluated `args`.
///
/// Arity is checked before any argument is evaluated.
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub(super) fn call<'a, 'input: 'a>(
    ev: &Evaluator<'_>,
    name: &str,
    args: &[Expr],
    ctx: &Context<'a, 'input>,
) -> Result<Value<'a, 'input>, XPathError> {
    let arity = |min: usize, max: Option<usize>| check_arity(name, args.len(), min, max);
    let arg = |i: usize| ev.eval(&args[i], ctx);
    let string_arg = |i: usize| arg(i).map(Value::into_string);
    let number_arg = |i: usize| arg(i).map(|v| v.to_number());
    let string_or_context = |i: usize| {
        if args.len() > i {
            string_arg(i)
        } else {
            Ok(ctx.node.string_value())
        }
    };

    match name {
        // node-set functions
        "last" => {
            arity(0, Some(0))?;
            Ok(Value::Number(ctx.size as f64))
        }
        "position" => {
            arity(0, Some(0))?;
            Ok(Value::Number(ctx.position as f64))
        }
        "count" => {
            arity(1, Some(1))?;
            let nodes = arg(0)?.into_nodes("count()")?;
            Ok(Value::Number(nodes.len() as f64))
        }
        "local-name" | "name" | "namespace-uri" => {
            arity(0, Some(1))?;
            let node = if args.is_empty() {
                Some(ctx.node)
            } else {
                arg(0)?.into_nodes(name)?.first().copied()
            };
            let text = node
                .map(|node| match name {
                    "local-name" => node.local_name(),
                    "name" => node.qualified_name(),
                    _ => node.namespace_uri().unwrap_or_default(),
                })
                .unwrap_or_default();
            Ok(Value::Text(text))
        }

        // string functions
        "string" => {
            arity(0, Some(1))?;
            Ok(Value::Text(string_or_context(0)?))
        }
        "concat" => {
            arity(2, None)?;
            let mut joined = String::new();
            for i in 0..args.len() {
                joined.push_str(&string_arg(i)?);
            }
            Ok(Value::Text(joined))
        }
        "starts-with" => {
            arity(2, Some(2))?;
            let (text, prefix) = (string_arg(0)?, string_arg(1)?);
            Ok(Value::Boolean(text.starts_with(prefix.as_str())))
        }
        "ends-with" => {
            arity(2, Some(2))?;
            let (text, suffix) = (string_arg(0)?, string_arg(1)?);
            Ok(Value::Boolean(text.ends_with(suffix.as_str())))
        }
        "contains" => {
            arity(2, Some(2))?;
            let (text, needle) = (string_arg(0)?, string_arg(1)?);
            Ok(Value::Boolean(text.contains(needle.as_str())))
        }
        "substring-before" => {
            arity(2, Some(2))?;
            let (text, needle) = (string_arg(0)?, string_arg(1)?);
            let before = text
                .split_once(needle.as_str())
                .map(|(before, _)| before.to_string());
            Ok(Value::Text(before.unwrap_or_default()))
        }
        "substring-after" => {
            arity(2, Some(2))?;
            let (text, needle) = (string_arg(0)?, string_arg(1)?);
            let after = text
                .split_once(needle.as_str())
                .map(|(_, after)| after.to_string());
            Ok(Value::Text(after.unwrap_or_default()))
        }
        "substring" => {
            arity(2, Some(3))?;
            let text = string_arg(0)?;
            let start = xpath_round(number_arg(1)?);
            let end = if args.len() == 3 {
                start + xpath_round(number_arg(2)?)
            } else {
                f64::INFINITY
            };
            // positions are 1-based; NaN bounds select nothing
            let selected = text
                .chars()
                .enumerate()
                .filter(|(i, _)| {
                    let position = (i + 1) as f64;
                    position >= start && position < end
                })
                .map(|(_, c)| c)
                .collect();
            Ok(Value::Text(selected))
        }
        "string-length" => {
            arity(0, Some(1))?;
            Ok(Value::Number(string_or_context(0)?.chars().count() as f64))
        }
        "normalize-space" => {
            arity(0, Some(1))?;
            let text = string_or_context(0)?;
            Ok(Value::Text(
                text.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => {
            arity(3, Some(3))?;
            let text = string_arg(0)?;
            let from: Vec<char> = string_arg(1)?.chars().collect();
            let to: Vec<char> = string_arg(2)?.chars().collect();
            let translated = text
                .chars()
                .filter_map(|c| match from.iter().position(|&f| f == c) {
                    Some(index) => to.get(index).copied(),
                    None => Some(c),
                })
                .collect();
            Ok(Value::Text(translated))
        }
        "upper-case" => {
            arity(1, Some(1))?;
            Ok(Value::Text(string_arg(0)?.to_uppercase()))
        }
        "lower-case" => {
            arity(1, Some(1))?;
            Ok(Value::Text(string_arg(0)?.to_lowercase()))
        }
        "string-join" => {
            arity(1, Some(2))?;
            let items: Vec<String> = match arg(0)? {
                Value::Nodes(nodes) => nodes.iter().map(XNode::string_value).collect(),
                other => vec![other.into_string()],
            };
            let separator = if args.len() == 2 {
                string_arg(1)?
            } else {
                String::new()
            };
            Ok(Value::Text(items.join(&separator)))
        }
        "matches" => {
            arity(2, Some(2))?;
            let text = string_arg(0)?;
            let regex = compile_regex(&string_arg(1)?)?;
            Ok(Value::Boolean(regex.is_match(&text)))
        }
        "replace" => {
            arity(3, Some(3))?;
            let text = string_arg(0)?;
            let regex = compile_regex(&string_arg(1)?)?;
            let replacement = string_arg(2)?;
            Ok(Value::Text(
                regex.replace_all(&text, replacement.as_str()).into_owned(),
            ))
        }

        // boolean functions
        "boolean" => {
            arity(1, Some(1))?;
            Ok(Value::Boolean(arg(0)?.to_boolean()))
        }
        "not" => {
            arity(1, Some(1))?;
            Ok(Value::Boolean(!arg(0)?.to_boolean()))
        }
        "true" => {
            arity(0, Some(0))?;
            Ok(Value::Boolean(true))
        }
        "false" => {
            arity(0, Some(0))?;
            Ok(Value::Boolean(false))
        }
        "exists" | "empty" => {
            arity(1, Some(1))?;
            let present = match arg(0)? {
                Value::Nodes(nodes) => !nodes.is_empty(),
                _ => true,
            };
            Ok(Value::Boolean(if name == "exists" { present } else { !present }))
        }

        // number functions
        "number" => {
            arity(0, Some(1))?;
            if args.is_empty() {
                Ok(Value::Number(parse_number(&ctx.node.string_value())))
            } else {
                Ok(Value::Number(number_arg(0)?))
            }
        }
        "sum" => {
            arity(1, Some(1))?;
            let nodes = arg(0)?.into_nodes("sum()")?;
            let total = nodes
                .iter()
                .map(|node| parse_number(&node.string_value()))
                .sum();
            Ok(Value::Number(total))
        }
        "floor" => {
            arity(1, Some(1))?;
            Ok(Value::Number(number_arg(0)?.floor()))
        }
        "ceiling" => {
            arity(1, Some(1))?;
            Ok(Value::Number(number_arg(0)?.ceil()))
        }
        "round" => {
            arity(1, Some(1))?;
            Ok(Value::Number(xpath_round(number_arg(0)?)))
        }

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}
