//! Source-literal serialization of property values.
//!
//! `serialize_prop_value` maps every value of the property domain to a
//! source expression, and `parse_prop_value` reads such an expression back.
//! The pair is the round-trip contract exported projects depend on:
//! `serialize(parse(serialize(v))) == serialize(v)`.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{ArrayExpressionElement, Expression, ObjectPropertyKind, PropertyKey, PropertyKind};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::operator::UnaryOperator;
use regex::Regex;
use serde_json::{Number, Value};
use std::fmt::Write;

use crate::document::ComponentInstance;
use crate::error::{SerializationError, ValueParseError};
use crate::PropertyBag;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref ATTRIBUTE_NAME: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$-]*$").unwrap();
}

const PROTO_KEY: &str = "__proto__";

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE → SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Double-quoted string literal body. Every character that a source literal
/// cannot hold verbatim is escaped, so the literal decodes to `s` exactly.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape_js_string(s))
}

/// Source expression for a property value.
pub fn serialize_prop_value(value: &Value) -> Result<String, SerializationError> {
    let mut out = String::new();
    write_value(value, "", &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, path: &str, out: &mut String) -> Result<(), SerializationError> {
    match value {
        Value::Null => {
            return Err(SerializationError::NullValue {
                path: path.to_string(),
            })
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&quote(s)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, &format!("{}[{}]", path, i), out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return Ok(());
            }
            out.push_str("{ ");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if key == PROTO_KEY {
                    // A plain `__proto__:` key sets the prototype instead.
                    out.push_str(&format!("[{}]", quote(key)));
                } else if IDENTIFIER.is_match(key) {
                    out.push_str(key);
                } else {
                    out.push_str(&quote(key));
                }
                out.push_str(": ");
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                write_value(item, &child, out)?;
            }
            out.push_str(" }");
        }
    }
    Ok(())
}

/// A string that reads back unchanged from a plain `name="..."` attribute.
fn is_plain_attribute_text(s: &str) -> bool {
    !s.chars()
        .any(|c| matches!(c, '"' | '\\' | '&' | '{' | '}' | '<' | '>') || c.is_control())
}

/// Attribute value text: `"text"` for plain strings, `{expr}` for everything else.
pub fn attribute_value(value: &Value) -> Result<String, SerializationError> {
    match value {
        Value::String(s) if is_plain_attribute_text(s) => Ok(format!("\"{}\"", s)),
        other => Ok(format!("{{{}}}", serialize_prop_value(other)?)),
    }
}

/// Self-closing markup element for `type_id` with one attribute per property.
pub fn emit_markup(type_id: &str, properties: &PropertyBag) -> Result<String, SerializationError> {
    let mut line = format!("<{}", type_id);
    for (key, value) in properties {
        if !ATTRIBUTE_NAME.is_match(key) {
            return Err(SerializationError::InvalidAttributeName { key: key.clone() });
        }
        let text = attribute_value(value).map_err(|e| match e {
            SerializationError::NullValue { path } if path.is_empty() => {
                SerializationError::NullValue { path: key.clone() }
            }
            SerializationError::NullValue { path } if path.starts_with('[') => {
                SerializationError::NullValue {
                    path: format!("{}{}", key, path),
                }
            }
            SerializationError::NullValue { path } => SerializationError::NullValue {
                path: format!("{}.{}", key, path),
            },
            other => other,
        })?;
        let _ = write!(line, " {}={}", key, text);
    }
    line.push_str(" />");
    Ok(line)
}

pub fn emit_instance_markup(instance: &ComponentInstance) -> Result<String, SerializationError> {
    emit_markup(&instance.type_id, &instance.properties)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE → VALUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a source expression produced by `serialize_prop_value`.
pub fn parse_prop_value(text: &str) -> Result<Value, ValueParseError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    let expr = Parser::new(&allocator, text, source_type)
        .parse_expression()
        .map_err(|errors| {
            ValueParseError::Syntax(
                errors
                    .first()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| text.to_string()),
            )
        })?;
    expr_to_value(&expr, text)
}

/// Parse attribute value text as emitted by `attribute_value`.
pub fn parse_attribute_value(text: &str) -> Result<Value, ValueParseError> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        return parse_prop_value(inner);
    }
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Ok(Value::String(inner.to_string()));
    }
    Err(ValueParseError::Syntax(text.to_string()))
}

fn unsupported(expr: &Expression, source: &str) -> ValueParseError {
    let span = expr.span();
    ValueParseError::Unsupported(
        source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
            .to_string(),
    )
}

fn number_value(value: f64, raw: Option<&str>, negate: bool) -> Option<Value> {
    let raw = raw.unwrap_or_default();
    let is_integer_literal = !raw.is_empty()
        && raw.chars().all(|c| c.is_ascii_digit() || c == '_');
    if is_integer_literal {
        let digits: String = raw.chars().filter(|c| *c != '_').collect();
        if negate {
            if let Ok(i) = format!("-{}", digits).parse::<i64>() {
                return Some(Value::from(i));
            }
        } else if let Ok(u) = digits.parse::<u64>() {
            return Some(Value::from(u));
        }
    }
    let value = if negate { -value } else { value };
    Number::from_f64(value).map(Value::Number)
}

fn expr_to_value(expr: &Expression, source: &str) -> Result<Value, ValueParseError> {
    match expr {
        Expression::StringLiteral(s) => Ok(Value::String(s.value.to_string())),
        Expression::BooleanLiteral(b) => Ok(Value::Bool(b.value)),
        Expression::NumericLiteral(n) => {
            number_value(n.value, n.raw.as_ref().map(|r| r.as_str()), false)
                .ok_or_else(|| unsupported(expr, source))
        }
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::UnaryNegation => {
            match &unary.argument {
                Expression::NumericLiteral(n) => {
                    number_value(n.value, n.raw.as_ref().map(|r| r.as_str()), true)
                        .ok_or_else(|| unsupported(expr, source))
                }
                _ => Err(unsupported(expr, source)),
            }
        }
        Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => {
            let text = tpl
                .quasis
                .first()
                .and_then(|q| q.value.cooked.as_ref())
                .map(|c| c.to_string())
                .unwrap_or_default();
            Ok(Value::String(text))
        }
        Expression::ParenthesizedExpression(paren) => expr_to_value(&paren.expression, source),
        Expression::ArrayExpression(array) => {
            let mut items = Vec::with_capacity(array.elements.len());
            for element in &array.elements {
                match element {
                    ArrayExpressionElement::SpreadElement(_) | ArrayExpressionElement::Elision(_) => {
                        return Err(unsupported(expr, source));
                    }
                    other => match other.as_expression() {
                        Some(e) => items.push(expr_to_value(e, source)?),
                        None => return Err(unsupported(expr, source)),
                    },
                }
            }
            Ok(Value::Array(items))
        }
        Expression::ObjectExpression(object) => {
            let mut map = PropertyBag::new();
            for property in &object.properties {
                let ObjectPropertyKind::ObjectProperty(prop) = property else {
                    return Err(unsupported(expr, source));
                };
                if prop.kind != PropertyKind::Init || prop.method {
                    return Err(unsupported(expr, source));
                }
                let key = match &prop.key {
                    PropertyKey::StringLiteral(s) if prop.computed => s.value.to_string(),
                    _ if prop.computed => return Err(unsupported(expr, source)),
                    PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                    PropertyKey::StringLiteral(s) => s.value.to_string(),
                    _ => return Err(unsupported(expr, source)),
                };
                if key == PROTO_KEY && !prop.computed {
                    return Err(unsupported(expr, source));
                }
                map.insert(key, expr_to_value(&prop.value, source)?);
            }
            Ok(Value::Object(map))
        }
        _ => Err(unsupported(expr, source)),
    }
}
