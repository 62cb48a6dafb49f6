//! Unit interpreter
//!
//! Evaluates a `CompiledUnit` against a property bag to produce render output.
//! Semantics follow JavaScript closely enough for presentational components:
//! truthiness, `+` concatenation, loose and strict equality, array and string
//! helpers, `Math`, and initial values of host hooks.
//!
//! Evaluation is bounded by a step budget and a call-depth limit. Functions
//! see the bindings of their caller, so callbacks passed to `map` and friends
//! observe the component locals they were written next to.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RenderError;
use crate::scope::SAFE_GLOBALS;
use crate::unit::{
    ArrayItem, BinaryOp, CompiledUnit, Evaluated, LogicalOp, ObjectItem, RenderNode, TagKind,
    UnaryOp, UnitAttribute, UnitExpr, UnitFunction, UnitNode, UnitPattern, UnitStmt,
};
use crate::PropertyBag;

pub const STEP_BUDGET: usize = 100_000;
pub const DEPTH_LIMIT: usize = 48;

/// Props never forwarded to rendered elements.
const RESERVED_PROPS: &[&str] = &["key", "ref"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub steps: usize,
    pub depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            steps: STEP_BUDGET,
            depth: DEPTH_LIMIT,
        }
    }
}

type EvalResult<T> = Result<T, RenderError>;

enum Flow {
    Normal,
    Return(Evaluated),
}

impl CompiledUnit {
    /// Render the unit with `props`.
    pub fn instantiate(&self, props: &PropertyBag) -> Result<Vec<RenderNode>, RenderError> {
        self.instantiate_with_limits(props, Limits::default())
    }

    pub fn instantiate_with_limits(
        &self,
        props: &PropertyBag,
        limits: Limits,
    ) -> Result<Vec<RenderNode>, RenderError> {
        let mut interp = Interpreter::new(self, limits);
        interp.init_constants()?;

        let props = Evaluated::Map(
            props
                .iter()
                .map(|(k, v)| (k.clone(), Evaluated::from(v)))
                .collect(),
        );
        let result = interp.call_function(&self.factory, vec![props])?;

        let mut out = Vec::new();
        collect_nodes(result, &mut out);
        Ok(out)
    }
}

struct Interpreter<'u> {
    unit: &'u CompiledUnit,
    limits: Limits,
    steps: usize,
    depth: usize,
    frames: Vec<HashMap<String, Evaluated>>,
}

impl<'u> Interpreter<'u> {
    fn new(unit: &'u CompiledUnit, limits: Limits) -> Self {
        Self {
            unit,
            limits,
            steps: 0,
            depth: 0,
            frames: vec![HashMap::new()],
        }
    }

    fn init_constants(&mut self) -> EvalResult<()> {
        let unit = self.unit;
        for (pattern, init) in &unit.constants {
            let value = self.eval(init)?;
            self.bind(pattern, value)?;
        }
        Ok(())
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.limits.steps {
            return Err(RenderError::StepBudgetExceeded {
                type_id: self.unit.type_id.clone(),
                budget: self.limits.steps,
            });
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Evaluated {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return v.clone();
            }
        }
        if let Some(f) = self.unit.helpers.get(name) {
            return Evaluated::Function(Arc::clone(f));
        }
        match name {
            "NaN" => Evaluated::Number(f64::NAN),
            "Infinity" => Evaluated::Number(f64::INFINITY),
            "undefined" => Evaluated::Undefined,
            _ if SAFE_GLOBALS.contains(name) || self.unit.capabilities.contains(name) => {
                Evaluated::Builtin(name.to_string())
            }
            _ => Evaluated::Undefined,
        }
    }

    fn declare(&mut self, name: &str, value: Evaluated) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Functions & statements
    // ───────────────────────────────────────────────────────────────────────────

    fn call_function(&mut self, function: &UnitFunction, args: Vec<Evaluated>) -> EvalResult<Evaluated> {
        self.depth += 1;
        if self.depth > self.limits.depth {
            return Err(RenderError::DepthExceeded {
                type_id: self.unit.type_id.clone(),
                limit: self.limits.depth,
            });
        }

        self.frames.push(HashMap::new());
        let mut args = args.into_iter();
        for param in &function.params {
            let value = args.next().unwrap_or(Evaluated::Undefined);
            self.bind(param, value)?;
        }
        let flow = self.exec_block(&function.body)?;
        self.frames.pop();
        self.depth -= 1;

        Ok(match flow {
            Flow::Return(v) => v,
            Flow::Normal => Evaluated::Undefined,
        })
    }

    fn call_value(&mut self, callee: Evaluated, args: Vec<Evaluated>) -> EvalResult<Evaluated> {
        match callee {
            Evaluated::Function(f) => self.call_function(&f, args),
            Evaluated::Builtin(name) => self.call_builtin(&name, args),
            _ => Ok(Evaluated::Undefined),
        }
    }

    fn exec_block(&mut self, stmts: &[UnitStmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            self.tick()?;
            match stmt {
                UnitStmt::Let { pattern, init } => {
                    let value = match init {
                        Some(e) => self.eval(e)?,
                        None => Evaluated::Undefined,
                    };
                    self.bind(pattern, value)?;
                }
                UnitStmt::If {
                    test,
                    consequent,
                    alternate,
                } => {
                    let branch = if truthy(&self.eval(test)?) {
                        consequent
                    } else {
                        alternate
                    };
                    if let Flow::Return(v) = self.exec_block(branch)? {
                        return Ok(Flow::Return(v));
                    }
                }
                UnitStmt::Return(e) => {
                    let value = match e {
                        Some(e) => self.eval(e)?,
                        None => Evaluated::Undefined,
                    };
                    return Ok(Flow::Return(value));
                }
                UnitStmt::Effect(_) => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn bind(&mut self, pattern: &UnitPattern, value: Evaluated) -> EvalResult<()> {
        match pattern {
            UnitPattern::Ident(name) => self.declare(name, value),
            UnitPattern::Object { properties, rest } => {
                for (key, sub) in properties {
                    let v = get_member(&value, key);
                    self.bind(sub, v)?;
                }
                if let Some(rest) = rest {
                    let remaining = match &value {
                        Evaluated::Map(m) => m
                            .iter()
                            .filter(|(k, _)| !properties.iter().any(|(p, _)| p == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                        _ => IndexMap::new(),
                    };
                    self.declare(rest, Evaluated::Map(remaining));
                }
            }
            UnitPattern::Array { elements, rest } => {
                let items = match value {
                    Evaluated::List(items) => items,
                    Evaluated::Str(s) => s.chars().map(|c| Evaluated::Str(c.to_string())).collect(),
                    _ => Vec::new(),
                };
                for (i, element) in elements.iter().enumerate() {
                    if let Some(p) = element {
                        let v = items.get(i).cloned().unwrap_or(Evaluated::Undefined);
                        self.bind(p, v)?;
                    }
                }
                if let Some(rest) = rest {
                    let tail = items.iter().skip(elements.len()).cloned().collect();
                    self.declare(rest, Evaluated::List(tail));
                }
            }
            UnitPattern::WithDefault { pattern, default } => {
                let value = if matches!(value, Evaluated::Undefined) {
                    self.eval(default)?
                } else {
                    value
                };
                self.bind(pattern, value)?;
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────────

    fn eval(&mut self, expr: &UnitExpr) -> EvalResult<Evaluated> {
        self.tick()?;
        let value = match expr {
            UnitExpr::Undefined | UnitExpr::Opaque(_) => Evaluated::Undefined,
            UnitExpr::Null => Evaluated::Null,
            UnitExpr::Bool(b) => Evaluated::Bool(*b),
            UnitExpr::Number(n) => Evaluated::Number(*n),
            UnitExpr::Str(s) => Evaluated::Str(s.clone()),
            UnitExpr::Ident(name) => self.lookup(name),
            UnitExpr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = exprs.get(i) {
                        out.push_str(&to_js_string(&self.eval(e)?));
                    }
                }
                Evaluated::Str(out)
            }
            UnitExpr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Item(e) => out.push(self.eval(e)?),
                        ArrayItem::Spread(e) => match self.eval(e)? {
                            Evaluated::List(inner) => out.extend(inner),
                            Evaluated::Str(s) => {
                                out.extend(s.chars().map(|c| Evaluated::Str(c.to_string())))
                            }
                            _ => {}
                        },
                    }
                }
                Evaluated::List(out)
            }
            UnitExpr::Object(items) => {
                let mut out = IndexMap::new();
                for item in items {
                    match item {
                        ObjectItem::Property(key, e) => {
                            let v = self.eval(e)?;
                            out.insert(key.clone(), v);
                        }
                        ObjectItem::Spread(e) => match self.eval(e)? {
                            Evaluated::Map(inner) => out.extend(inner),
                            Evaluated::List(inner) => out.extend(
                                inner.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)),
                            ),
                            _ => {}
                        },
                    }
                }
                Evaluated::Map(out)
            }
            UnitExpr::Member { object, property } => {
                let object = self.eval(object)?;
                let property = to_js_string(&self.eval(property)?);
                get_member(&object, &property)
            }
            UnitExpr::Unary { op, arg } => {
                let v = self.eval(arg)?;
                match op {
                    UnaryOp::Not => Evaluated::Bool(!truthy(&v)),
                    UnaryOp::Negate => Evaluated::Number(-to_number(&v)),
                    UnaryOp::Plus => Evaluated::Number(to_number(&v)),
                    UnaryOp::TypeOf => Evaluated::Str(type_of(&v).to_string()),
                }
            }
            UnitExpr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, &l, &r)
            }
            UnitExpr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                let take_left = match op {
                    LogicalOp::And => !truthy(&l),
                    LogicalOp::Or => truthy(&l),
                    LogicalOp::Coalesce => !matches!(l, Evaluated::Undefined | Evaluated::Null),
                };
                if take_left {
                    l
                } else {
                    self.eval(right)?
                }
            }
            UnitExpr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval(test)?) {
                    self.eval(consequent)?
                } else {
                    self.eval(alternate)?
                }
            }
            UnitExpr::Call { callee, args } => {
                let mut evaluated_args = Vec::with_capacity(args.len());
                match callee.as_ref() {
                    UnitExpr::Member { object, property } => {
                        let object = self.eval(object)?;
                        let method = to_js_string(&self.eval(property)?);
                        for a in args {
                            evaluated_args.push(self.eval(a)?);
                        }
                        self.call_method(object, &method, evaluated_args)?
                    }
                    other => {
                        let callee = self.eval(other)?;
                        for a in args {
                            evaluated_args.push(self.eval(a)?);
                        }
                        self.call_value(callee, evaluated_args)?
                    }
                }
            }
            UnitExpr::Function(f) => Evaluated::Function(Arc::clone(f)),
            UnitExpr::Markup(node) => {
                let mut nodes = self.render_node(node)?;
                if nodes.len() == 1 {
                    Evaluated::Node(Box::new(nodes.remove(0)))
                } else {
                    Evaluated::List(nodes.into_iter().map(|n| Evaluated::Node(Box::new(n))).collect())
                }
            }
        };
        Ok(value)
    }

    /// `padStart`/`padEnd`. Every padded character costs a step.
    fn pad_string(&mut self, s: &str, method: &str, args: &[Evaluated]) -> EvalResult<Evaluated> {
        let width = args.first().map(to_number).unwrap_or(0.0);
        let width = if width.is_finite() && width > 0.0 { width as usize } else { 0 };
        let fill = match args.get(1) {
            None | Some(Evaluated::Undefined) => " ".to_string(),
            Some(other) => to_js_string(other),
        };
        let len = s.chars().count();
        if width <= len || fill.is_empty() {
            return Ok(Evaluated::Str(s.to_string()));
        }
        let mut pad = String::new();
        for c in fill.chars().cycle().take(width - len) {
            self.tick()?;
            pad.push(c);
        }
        Ok(Evaluated::Str(if method == "padStart" {
            format!("{}{}", pad, s)
        } else {
            format!("{}{}", s, pad)
        }))
    }

    fn call_method(&mut self, object: Evaluated, method: &str, args: Vec<Evaluated>) -> EvalResult<Evaluated> {
        match object {
            Evaluated::List(items) => self.call_list_method(items, method, args),
            Evaluated::Str(s) if method == "padStart" || method == "padEnd" => self.pad_string(&s, method, &args),
            Evaluated::Str(s) => Ok(call_string_method(&s, method, &args)),
            Evaluated::Number(n) => Ok(match method {
                "toFixed" => {
                    let digits = args.first().map(to_number).unwrap_or(0.0).clamp(0.0, 20.0) as usize;
                    Evaluated::Str(format!("{:.*}", digits, n))
                }
                "toString" | "toLocaleString" => Evaluated::Str(format_number(n)),
                _ => Evaluated::Undefined,
            }),
            Evaluated::Map(ref m) => match m.get(method) {
                Some(callee @ (Evaluated::Function(_) | Evaluated::Builtin(_))) => {
                    self.call_value(callee.clone(), args)
                }
                _ => Ok(Evaluated::Undefined),
            },
            Evaluated::Builtin(namespace) => self.call_builtin(&format!("{}.{}", namespace, method), args),
            _ => Ok(Evaluated::Undefined),
        }
    }

    fn call_list_method(&mut self, items: Vec<Evaluated>, method: &str, args: Vec<Evaluated>) -> EvalResult<Evaluated> {
        let mut args = args.into_iter();
        let first = args.next().unwrap_or(Evaluated::Undefined);
        let second = args.next();

        Ok(match method {
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.call_value(first.clone(), vec![item, Evaluated::Number(i as f64)])?);
                }
                Evaluated::List(out)
            }
            "filter" => {
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let keep = self.call_value(first.clone(), vec![item.clone(), Evaluated::Number(i as f64)])?;
                    if truthy(&keep) {
                        out.push(item);
                    }
                }
                Evaluated::List(out)
            }
            "find" => {
                for (i, item) in items.into_iter().enumerate() {
                    let hit = self.call_value(first.clone(), vec![item.clone(), Evaluated::Number(i as f64)])?;
                    if truthy(&hit) {
                        return Ok(item);
                    }
                }
                Evaluated::Undefined
            }
            "some" | "every" => {
                let want = method == "some";
                for (i, item) in items.into_iter().enumerate() {
                    let r = self.call_value(first.clone(), vec![item, Evaluated::Number(i as f64)])?;
                    if truthy(&r) == want {
                        return Ok(Evaluated::Bool(want));
                    }
                }
                Evaluated::Bool(!want)
            }
            "join" => {
                let sep = match first {
                    Evaluated::Undefined => ",".to_string(),
                    other => to_js_string(&other),
                };
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        Evaluated::Undefined | Evaluated::Null => String::new(),
                        other => to_js_string(other),
                    })
                    .collect();
                Evaluated::Str(parts.join(&sep))
            }
            "slice" => {
                let (start, end) = slice_bounds(items.len(), &first, second.as_ref());
                Evaluated::List(items[start..end].to_vec())
            }
            "includes" => Evaluated::Bool(items.iter().any(|v| strict_equals(v, &first))),
            "indexOf" => Evaluated::Number(
                items
                    .iter()
                    .position(|v| strict_equals(v, &first))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            ),
            "concat" => {
                let mut out = items;
                for extra in std::iter::once(first).chain(second).chain(args) {
                    match extra {
                        Evaluated::List(inner) => out.extend(inner),
                        Evaluated::Undefined => {}
                        other => out.push(other),
                    }
                }
                Evaluated::List(out)
            }
            "reverse" => Evaluated::List(items.into_iter().rev().collect()),
            _ => Evaluated::Undefined,
        })
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Evaluated>) -> EvalResult<Evaluated> {
        let first = args.first().cloned().unwrap_or(Evaluated::Undefined);
        let numbers = || args.iter().map(to_number).collect::<Vec<f64>>();

        Ok(match name {
            "useState" => {
                let initial = match first {
                    f @ (Evaluated::Function(_) | Evaluated::Builtin(_)) => self.call_value(f, vec![])?,
                    other => other,
                };
                Evaluated::List(vec![initial, Evaluated::Builtin("setState".to_string())])
            }
            "useRef" => Evaluated::Map(IndexMap::from([("current".to_string(), first)])),
            "useMemo" => self.call_value(first, vec![])?,
            "useCallback" => first,
            "String" => Evaluated::Str(if args.is_empty() {
                String::new()
            } else {
                to_js_string(&first)
            }),
            "Number" => Evaluated::Number(if args.is_empty() { 0.0 } else { to_number(&first) }),
            "Boolean" => Evaluated::Bool(truthy(&first)),
            "parseInt" => Evaluated::Number(parse_leading_number(&to_js_string(&first), true)),
            "parseFloat" => Evaluated::Number(parse_leading_number(&to_js_string(&first), false)),
            "isNaN" => Evaluated::Bool(to_number(&first).is_nan()),
            "Math.max" => Evaluated::Number(numbers().into_iter().fold(f64::NEG_INFINITY, f64::max)),
            "Math.min" => Evaluated::Number(numbers().into_iter().fold(f64::INFINITY, f64::min)),
            "Math.round" => Evaluated::Number((to_number(&first) + 0.5).floor()),
            "Math.floor" => Evaluated::Number(to_number(&first).floor()),
            "Math.ceil" => Evaluated::Number(to_number(&first).ceil()),
            "Math.abs" => Evaluated::Number(to_number(&first).abs()),
            "Math.sqrt" => Evaluated::Number(to_number(&first).sqrt()),
            "Math.pow" => {
                let n = numbers();
                Evaluated::Number(n.first().copied().unwrap_or(f64::NAN).powf(n.get(1).copied().unwrap_or(f64::NAN)))
            }
            "JSON.stringify" => match serde_json::to_string(&first) {
                Ok(s) => Evaluated::Str(s),
                Err(_) => Evaluated::Undefined,
            },
            "Object.keys" | "Object.values" | "Object.entries" => match first {
                Evaluated::Map(m) => Evaluated::List(
                    m.into_iter()
                        .map(|(k, v)| match name {
                            "Object.keys" => Evaluated::Str(k),
                            "Object.values" => v,
                            _ => Evaluated::List(vec![Evaluated::Str(k), v]),
                        })
                        .collect(),
                ),
                _ => Evaluated::List(Vec::new()),
            },
            "Array.isArray" => Evaluated::Bool(matches!(first, Evaluated::List(_))),
            "Array.from" => {
                let items = match &first {
                    Evaluated::List(items) => items.clone(),
                    Evaluated::Str(s) => s.chars().map(|c| Evaluated::Str(c.to_string())).collect(),
                    Evaluated::Map(_) => {
                        let len = to_number(&get_member(&first, "length"));
                        let len = if len.is_finite() && len > 0.0 { len as usize } else { 0 };
                        // Each slot costs a step so huge lengths hit the budget.
                        let mut out = Vec::new();
                        for _ in 0..len {
                            self.tick()?;
                            out.push(Evaluated::Undefined);
                        }
                        out
                    }
                    _ => Vec::new(),
                };
                match args.get(1) {
                    Some(mapper) => self.call_list_method(items, "map", vec![mapper.clone()])?,
                    None => Evaluated::List(items),
                }
            }
            _ => Evaluated::Undefined,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Markup
    // ───────────────────────────────────────────────────────────────────────────

    fn render_node(&mut self, node: &UnitNode) -> EvalResult<Vec<RenderNode>> {
        self.tick()?;
        match node {
            UnitNode::Text(value) => Ok(vec![RenderNode::Text {
                value: value.clone(),
            }]),
            UnitNode::Expression(e) => {
                let value = self.eval(e)?;
                let mut out = Vec::new();
                collect_nodes(value, &mut out);
                Ok(out)
            }
            UnitNode::Fragment(children) => self.render_children(children),
            UnitNode::Element {
                tag,
                kind,
                attributes,
                children,
            } => {
                let mut props = IndexMap::new();
                for attr in attributes {
                    match attr {
                        UnitAttribute::Named { name, value } => {
                            let v = self.eval(value)?;
                            props.insert(name.clone(), v);
                        }
                        UnitAttribute::Spread(e) => {
                            if let Evaluated::Map(m) = self.eval(e)? {
                                props.extend(m);
                            }
                        }
                    }
                }
                let children = self.render_children(children)?;

                if *kind == TagKind::Local {
                    if let callee @ Evaluated::Function(_) = self.lookup(tag) {
                        if !children.is_empty() {
                            props.insert(
                                "children".to_string(),
                                Evaluated::List(children.into_iter().map(|n| Evaluated::Node(Box::new(n))).collect()),
                            );
                        }
                        let result = self.call_value(callee, vec![Evaluated::Map(props)])?;
                        let mut out = Vec::new();
                        collect_nodes(result, &mut out);
                        return Ok(out);
                    }
                }

                props.retain(|k, v| !RESERVED_PROPS.contains(&k.as_str()) && v.is_renderable_prop());
                Ok(vec![RenderNode::Element {
                    tag: tag.clone(),
                    kind: *kind,
                    props,
                    children,
                }])
            }
        }
    }

    fn render_children(&mut self, children: &[UnitNode]) -> EvalResult<Vec<RenderNode>> {
        let mut out = Vec::new();
        for child in children {
            out.extend(self.render_node(child)?);
        }
        Ok(out)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE SEMANTICS
// ═══════════════════════════════════════════════════════════════════════════════

fn collect_nodes(value: Evaluated, out: &mut Vec<RenderNode>) {
    match value {
        Evaluated::Node(node) => out.push(*node),
        Evaluated::List(items) => {
            for item in items {
                collect_nodes(item, out);
            }
        }
        Evaluated::Str(s) => out.push(RenderNode::Text { value: s }),
        Evaluated::Number(n) => out.push(RenderNode::Text {
            value: format_number(n),
        }),
        _ => {}
    }
}

fn get_member(object: &Evaluated, property: &str) -> Evaluated {
    match object {
        Evaluated::Map(m) => m.get(property).cloned().unwrap_or(Evaluated::Undefined),
        Evaluated::List(items) => match property {
            "length" => Evaluated::Number(items.len() as f64),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Evaluated::Undefined),
        },
        Evaluated::Str(s) => match property {
            "length" => Evaluated::Number(s.chars().count() as f64),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Evaluated::Str(c.to_string()))
                .unwrap_or(Evaluated::Undefined),
        },
        Evaluated::Builtin(namespace) => match (namespace.as_str(), property) {
            ("Math", "PI") => Evaluated::Number(std::f64::consts::PI),
            ("Math", "E") => Evaluated::Number(std::f64::consts::E),
            _ => Evaluated::Builtin(format!("{}.{}", namespace, property)),
        },
        _ => Evaluated::Undefined,
    }
}

fn call_string_method(s: &str, method: &str, args: &[Evaluated]) -> Evaluated {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Evaluated::Undefined);
    let arg_str = |i: usize| to_js_string(&arg(i));

    match method {
        "toUpperCase" => Evaluated::Str(s.to_uppercase()),
        "toLowerCase" => Evaluated::Str(s.to_lowercase()),
        "trim" => Evaluated::Str(s.trim().to_string()),
        "toString" => Evaluated::Str(s.to_string()),
        "includes" => Evaluated::Bool(s.contains(&arg_str(0))),
        "startsWith" => Evaluated::Bool(s.starts_with(&arg_str(0))),
        "endsWith" => Evaluated::Bool(s.ends_with(&arg_str(0))),
        "charAt" => {
            let i = to_number(&arg(0));
            let i = if i.is_finite() && i >= 0.0 { i as usize } else { 0 };
            Evaluated::Str(s.chars().nth(i).map(String::from).unwrap_or_default())
        }
        "split" => match arg(0) {
            Evaluated::Undefined => Evaluated::List(vec![Evaluated::Str(s.to_string())]),
            sep => {
                let sep = to_js_string(&sep);
                if sep.is_empty() {
                    Evaluated::List(s.chars().map(|c| Evaluated::Str(c.to_string())).collect())
                } else {
                    Evaluated::List(s.split(sep.as_str()).map(|p| Evaluated::Str(p.to_string())).collect())
                }
            }
        },
        "slice" | "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let end = args.get(1);
            let (start, end) = slice_bounds(chars.len(), &arg(0), end);
            Evaluated::Str(chars[start..end].iter().collect())
        }
        "replace" => match (arg(0), arg(1)) {
            (Evaluated::Str(from), to) => Evaluated::Str(s.replacen(&from, &to_js_string(&to), 1)),
            _ => Evaluated::Str(s.to_string()),
        },
        _ => Evaluated::Undefined,
    }
}

/// Resolve JS `slice(start, end)` arguments against `len`.
fn slice_bounds(len: usize, start: &Evaluated, end: Option<&Evaluated>) -> (usize, usize) {
    let resolve = |v: &Evaluated, default: usize| -> usize {
        if matches!(v, Evaluated::Undefined) {
            return default;
        }
        let n = to_number(v);
        if n.is_nan() {
            0
        } else if n < 0.0 {
            len.saturating_sub((-n) as usize)
        } else {
            (n as usize).min(len)
        }
    };
    let start = resolve(start, 0);
    let end = end.map(|e| resolve(e, len)).unwrap_or(len);
    (start, end.max(start))
}

fn binary(op: BinaryOp, l: &Evaluated, r: &Evaluated) -> Evaluated {
    match op {
        BinaryOp::Add => {
            if is_stringish(l) || is_stringish(r) {
                Evaluated::Str(format!("{}{}", to_js_string(l), to_js_string(r)))
            } else {
                Evaluated::Number(to_number(l) + to_number(r))
            }
        }
        BinaryOp::Sub => Evaluated::Number(to_number(l) - to_number(r)),
        BinaryOp::Mul => Evaluated::Number(to_number(l) * to_number(r)),
        BinaryOp::Div => Evaluated::Number(to_number(l) / to_number(r)),
        BinaryOp::Rem => Evaluated::Number(to_number(l) % to_number(r)),
        BinaryOp::StrictEq => Evaluated::Bool(strict_equals(l, r)),
        BinaryOp::StrictNotEq => Evaluated::Bool(!strict_equals(l, r)),
        BinaryOp::Eq => Evaluated::Bool(loose_equals(l, r)),
        BinaryOp::NotEq => Evaluated::Bool(!loose_equals(l, r)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (l, r) {
                (Evaluated::Str(a), Evaluated::Str(b)) => Some(a.cmp(b)),
                _ => to_number(l).partial_cmp(&to_number(r)),
            };
            Evaluated::Bool(match ordering {
                None => false,
                Some(o) => match op {
                    BinaryOp::Lt => o.is_lt(),
                    BinaryOp::LtEq => o.is_le(),
                    BinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            })
        }
    }
}

fn is_stringish(v: &Evaluated) -> bool {
    matches!(v, Evaluated::Str(_) | Evaluated::List(_) | Evaluated::Map(_))
}

pub fn truthy(v: &Evaluated) -> bool {
    match v {
        Evaluated::Undefined | Evaluated::Null => false,
        Evaluated::Bool(b) => *b,
        Evaluated::Number(n) => *n != 0.0 && !n.is_nan(),
        Evaluated::Str(s) => !s.is_empty(),
        _ => true,
    }
}

pub fn to_number(v: &Evaluated) -> f64 {
    match v {
        Evaluated::Null => 0.0,
        Evaluated::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Evaluated::Number(n) => *n,
        Evaluated::Str(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Evaluated::List(items) if items.is_empty() => 0.0,
        _ => f64::NAN,
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

pub fn to_js_string(v: &Evaluated) -> String {
    match v {
        Evaluated::Undefined => "undefined".to_string(),
        Evaluated::Null => "null".to_string(),
        Evaluated::Bool(b) => b.to_string(),
        Evaluated::Number(n) => format_number(*n),
        Evaluated::Str(s) => s.clone(),
        Evaluated::List(items) => items
            .iter()
            .map(|i| match i {
                Evaluated::Undefined | Evaluated::Null => String::new(),
                other => to_js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Evaluated::Map(_) | Evaluated::Node(_) => "[object Object]".to_string(),
        Evaluated::Function(_) | Evaluated::Builtin(_) => "function".to_string(),
    }
}

fn type_of(v: &Evaluated) -> &'static str {
    match v {
        Evaluated::Undefined => "undefined",
        Evaluated::Bool(_) => "boolean",
        Evaluated::Number(_) => "number",
        Evaluated::Str(_) => "string",
        Evaluated::Function(_) | Evaluated::Builtin(_) => "function",
        Evaluated::Null | Evaluated::List(_) | Evaluated::Map(_) | Evaluated::Node(_) => "object",
    }
}

pub fn strict_equals(a: &Evaluated, b: &Evaluated) -> bool {
    match (a, b) {
        (Evaluated::Undefined, Evaluated::Undefined) | (Evaluated::Null, Evaluated::Null) => true,
        (Evaluated::Bool(x), Evaluated::Bool(y)) => x == y,
        (Evaluated::Number(x), Evaluated::Number(y)) => x == y,
        (Evaluated::Str(x), Evaluated::Str(y)) => x == y,
        (Evaluated::Builtin(x), Evaluated::Builtin(y)) => x == y,
        (Evaluated::Function(x), Evaluated::Function(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

fn loose_equals(a: &Evaluated, b: &Evaluated) -> bool {
    match (a, b) {
        (Evaluated::Undefined | Evaluated::Null, Evaluated::Undefined | Evaluated::Null) => true,
        (Evaluated::Undefined | Evaluated::Null, _) | (_, Evaluated::Undefined | Evaluated::Null) => false,
        (Evaluated::Number(_), Evaluated::Str(_))
        | (Evaluated::Str(_), Evaluated::Number(_))
        | (Evaluated::Bool(_), _)
        | (_, Evaluated::Bool(_)) => to_number(a) == to_number(b),
        _ => strict_equals(a, b),
    }
}

fn parse_leading_number(s: &str, integer: bool) -> f64 {
    let t = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in t.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !integer && !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return f64::NAN;
    }
    t[..end].trim_end_matches('.').parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(-9.3e18), "-9300000000000000000");
    }

    #[test]
    fn test_loose_and_strict_equality() {
        let one = Evaluated::Number(1.0);
        let one_str = Evaluated::Str("1".to_string());
        assert!(loose_equals(&one, &one_str));
        assert!(!strict_equals(&one, &one_str));
        assert!(loose_equals(&Evaluated::Null, &Evaluated::Undefined));
        assert!(!loose_equals(&Evaluated::Null, &Evaluated::Number(0.0)));
    }

    #[test]
    fn test_addition_concatenates_strings() {
        let r = binary(
            BinaryOp::Add,
            &Evaluated::Str("$".to_string()),
            &Evaluated::Number(9.0),
        );
        assert_eq!(to_js_string(&r), "$9");
    }

    #[test]
    fn test_slice_bounds() {
        assert_eq!(slice_bounds(5, &Evaluated::Number(1.0), None), (1, 5));
        assert_eq!(slice_bounds(5, &Evaluated::Number(-2.0), None), (3, 5));
        assert_eq!(
            slice_bounds(5, &Evaluated::Number(0.0), Some(&Evaluated::Number(2.0))),
            (0, 2)
        );
        assert_eq!(slice_bounds(5, &Evaluated::Number(4.0), Some(&Evaluated::Number(1.0))), (4, 4));
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("42px", true), 42.0);
        assert_eq!(parse_leading_number("3.75rem", false), 3.75);
        assert_eq!(parse_leading_number("3.75", true), 3.0);
        assert!(parse_leading_number("abc", false).is_nan());
    }

    #[test]
    fn test_string_methods() {
        let s = call_string_method("pro plan", "toUpperCase", &[]);
        assert_eq!(to_js_string(&s), "PRO PLAN");
        let parts = call_string_method("a,b", "split", &[Evaluated::Str(",".to_string())]);
        assert_eq!(to_js_string(&parts), "a,b");
    }
}
