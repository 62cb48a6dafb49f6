//! Compiled unit IR.
//!
//! Owned tree produced by lowering a validated factory. It outlives the
//! parser arena and is shared by `Arc` between the registry and renderers.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS & STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub enum UnitExpr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    Template {
        quasis: Vec<String>,
        exprs: Vec<UnitExpr>,
    },
    Array(Vec<ArrayItem>),
    Object(Vec<ObjectItem>),
    Member {
        object: Box<UnitExpr>,
        property: Box<UnitExpr>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<UnitExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<UnitExpr>,
        right: Box<UnitExpr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<UnitExpr>,
        right: Box<UnitExpr>,
    },
    Conditional {
        test: Box<UnitExpr>,
        consequent: Box<UnitExpr>,
        alternate: Box<UnitExpr>,
    },
    Call {
        callee: Box<UnitExpr>,
        args: Vec<UnitExpr>,
    },
    Function(Arc<UnitFunction>),
    Markup(Box<UnitNode>),
    /// Construct outside the interpreted subset; evaluates to `undefined`.
    Opaque(String),
}

#[derive(Debug, Clone)]
pub enum ArrayItem {
    Item(UnitExpr),
    Spread(UnitExpr),
}

#[derive(Debug, Clone)]
pub enum ObjectItem {
    Property(String, UnitExpr),
    Spread(UnitExpr),
}

#[derive(Debug, Clone)]
pub enum UnitPattern {
    Ident(String),
    Object {
        properties: Vec<(String, UnitPattern)>,
        rest: Option<String>,
    },
    Array {
        elements: Vec<Option<UnitPattern>>,
        rest: Option<String>,
    },
    WithDefault {
        pattern: Box<UnitPattern>,
        default: UnitExpr,
    },
}

#[derive(Debug, Clone)]
pub enum UnitStmt {
    Let {
        pattern: UnitPattern,
        init: Option<UnitExpr>,
    },
    If {
        test: UnitExpr,
        consequent: Vec<UnitStmt>,
        alternate: Vec<UnitStmt>,
    },
    Return(Option<UnitExpr>),
    /// Side-effecting statement kept for diagnostics only.
    Effect(String),
}

#[derive(Debug, Clone)]
pub struct UnitFunction {
    pub params: Vec<UnitPattern>,
    pub body: Vec<UnitStmt>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKUP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    /// Lowercase host element (`div`, `section`)
    Intrinsic,
    /// Injected primitive UI atom
    Atom,
    /// Helper component defined by the unit itself
    Local,
    /// Pre-authored catalog component, rendered as a placeholder
    Catalog,
}

#[derive(Debug, Clone)]
pub enum UnitAttribute {
    Named { name: String, value: UnitExpr },
    Spread(UnitExpr),
}

#[derive(Debug, Clone)]
pub enum UnitNode {
    Element {
        tag: String,
        kind: TagKind,
        attributes: Vec<UnitAttribute>,
        children: Vec<UnitNode>,
    },
    Fragment(Vec<UnitNode>),
    Text(String),
    Expression(UnitExpr),
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILED UNIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Executable artifact of one generated component.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub type_id: String,
    pub factory_name: String,
    pub factory: Arc<UnitFunction>,
    /// Top-level `const`/`let` bindings, evaluated before the factory runs
    pub constants: Vec<(UnitPattern, UnitExpr)>,
    /// Top-level helper functions and components
    pub helpers: IndexMap<String, Arc<UnitFunction>>,
    /// Injected names the source references
    pub capabilities: BTreeSet<String>,
    /// SHA-256 of the source text that produced this unit
    pub source_hash: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Runtime value of the interpreter.
#[derive(Debug, Clone)]
pub enum Evaluated {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Evaluated>),
    Map(IndexMap<String, Evaluated>),
    Node(Box<RenderNode>),
    Function(Arc<UnitFunction>),
    /// Injected or global callable (`useState`, `Math.max`, `String`)
    Builtin(String),
}

impl Evaluated {
    pub fn is_renderable_prop(&self) -> bool {
        !matches!(
            self,
            Evaluated::Undefined | Evaluated::Function(_) | Evaluated::Builtin(_)
        )
    }
}

impl Serialize for Evaluated {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Evaluated::Undefined
            | Evaluated::Null
            | Evaluated::Function(_)
            | Evaluated::Builtin(_) => serializer.serialize_none(),
            Evaluated::Bool(b) => serializer.serialize_bool(*b),
            Evaluated::Number(n) => serializer.serialize_f64(*n),
            Evaluated::Str(s) => serializer.serialize_str(s),
            Evaluated::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Evaluated::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Evaluated::Node(node) => node.serialize(serializer),
        }
    }
}

impl From<&serde_json::Value> for Evaluated {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Evaluated::Null,
            serde_json::Value::Bool(b) => Evaluated::Bool(*b),
            serde_json::Value::Number(n) => Evaluated::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Evaluated::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Evaluated::List(items.iter().map(Evaluated::from).collect())
            }
            serde_json::Value::Object(map) => Evaluated::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Evaluated::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Renderable output of an instantiated unit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenderNode {
    Element {
        tag: String,
        kind: TagKind,
        props: IndexMap<String, Evaluated>,
        children: Vec<RenderNode>,
    },
    Text {
        value: String,
    },
}

impl RenderNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            RenderNode::Element { tag, .. } => Some(tag),
            RenderNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[RenderNode] {
        match self {
            RenderNode::Element { children, .. } => children,
            RenderNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self {
            RenderNode::Text { value } => value.clone(),
            RenderNode::Element { children, .. } => {
                children.iter().map(RenderNode::text_content).collect()
            }
        }
    }
}
