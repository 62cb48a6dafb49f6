use std::collections::BTreeSet;

use crate::unit::{
    ArrayItem, CompiledUnit, ObjectItem, TagKind, UnitAttribute, UnitExpr, UnitFunction, UnitNode,
    UnitStmt,
};

/// The UnitVisitor trait is the single traversal mechanism for the unit IR.
///
/// Rules:
/// 1. Traversal order is source order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal unless pruning is intended.
pub trait UnitVisitor {
    fn visit_unit(&mut self, unit: &CompiledUnit) {
        walk_unit(self, unit);
    }

    fn visit_function(&mut self, function: &UnitFunction) {
        walk_function(self, function);
    }

    fn visit_stmt(&mut self, stmt: &UnitStmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &UnitExpr) {
        walk_expr(self, expr);
    }

    fn visit_node(&mut self, node: &UnitNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, _tag: &str, _kind: TagKind) {
        // Leaf hook, children are walked by walk_node
    }
}

pub fn walk_unit<V: UnitVisitor + ?Sized>(visitor: &mut V, unit: &CompiledUnit) {
    for (_, init) in &unit.constants {
        visitor.visit_expr(init);
    }
    for helper in unit.helpers.values() {
        visitor.visit_function(helper);
    }
}

pub fn walk_function<V: UnitVisitor + ?Sized>(visitor: &mut V, function: &UnitFunction) {
    for stmt in &function.body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: UnitVisitor + ?Sized>(visitor: &mut V, stmt: &UnitStmt) {
    match stmt {
        UnitStmt::Let { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(init);
            }
        }
        UnitStmt::If {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test);
            for s in consequent.iter().chain(alternate) {
                visitor.visit_stmt(s);
            }
        }
        UnitStmt::Return(Some(expr)) => visitor.visit_expr(expr),
        UnitStmt::Return(None) | UnitStmt::Effect(_) => {}
    }
}

pub fn walk_expr<V: UnitVisitor + ?Sized>(visitor: &mut V, expr: &UnitExpr) {
    match expr {
        UnitExpr::Template { exprs, .. } => {
            for e in exprs {
                visitor.visit_expr(e);
            }
        }
        UnitExpr::Array(items) => {
            for item in items {
                match item {
                    ArrayItem::Item(e) | ArrayItem::Spread(e) => visitor.visit_expr(e),
                }
            }
        }
        UnitExpr::Object(items) => {
            for item in items {
                match item {
                    ObjectItem::Property(_, e) | ObjectItem::Spread(e) => visitor.visit_expr(e),
                }
            }
        }
        UnitExpr::Member { object, property } => {
            visitor.visit_expr(object);
            visitor.visit_expr(property);
        }
        UnitExpr::Unary { arg, .. } => visitor.visit_expr(arg),
        UnitExpr::Binary { left, right, .. } | UnitExpr::Logical { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        UnitExpr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test);
            visitor.visit_expr(consequent);
            visitor.visit_expr(alternate);
        }
        UnitExpr::Call { callee, args } => {
            visitor.visit_expr(callee);
            for a in args {
                visitor.visit_expr(a);
            }
        }
        UnitExpr::Function(f) => visitor.visit_function(f),
        UnitExpr::Markup(node) => visitor.visit_node(node),
        _ => {}
    }
}

pub fn walk_node<V: UnitVisitor + ?Sized>(visitor: &mut V, node: &UnitNode) {
    match node {
        UnitNode::Element {
            tag,
            kind,
            attributes,
            children,
        } => {
            visitor.visit_element(tag, *kind);
            for attr in attributes {
                match attr {
                    UnitAttribute::Named { value, .. } => visitor.visit_expr(value),
                    UnitAttribute::Spread(e) => visitor.visit_expr(e),
                }
            }
            for child in children {
                visitor.visit_node(child);
            }
        }
        UnitNode::Fragment(children) => {
            for child in children {
                visitor.visit_node(child);
            }
        }
        UnitNode::Expression(e) => visitor.visit_expr(e),
        UnitNode::Text(_) => {}
    }
}

/// Collects the markup tags a unit can produce, grouped by kind.
#[derive(Debug, Default)]
pub struct TagCollector {
    pub intrinsic: BTreeSet<String>,
    pub atoms: BTreeSet<String>,
    pub locals: BTreeSet<String>,
}

impl UnitVisitor for TagCollector {
    fn visit_element(&mut self, tag: &str, kind: TagKind) {
        let set = match kind {
            TagKind::Intrinsic => &mut self.intrinsic,
            TagKind::Atom => &mut self.atoms,
            TagKind::Local | TagKind::Catalog => &mut self.locals,
        };
        set.insert(tag.to_string());
    }
}

impl CompiledUnit {
    pub fn collect_tags(&self) -> TagCollector {
        let mut collector = TagCollector::default();
        collector.visit_unit(self);
        collector
    }
}
