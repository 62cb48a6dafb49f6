//! Lowering of validated generated source into the owned unit IR.
//!
//! The oxc AST lives in an arena that is dropped after compilation, so every
//! construct the interpreter understands is copied into `crate::unit` types.
//! Anything outside that subset becomes `UnitExpr::Opaque` carrying its source
//! text, which evaluates to `undefined`.

use indexmap::IndexMap;
use oxc_ast::ast::*;
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::scope::CapabilityScope;
use crate::unit::{
    ArrayItem, BinaryOp, CompiledUnit, LogicalOp, ObjectItem, TagKind, UnaryOp, UnitAttribute,
    UnitExpr, UnitFunction, UnitNode, UnitPattern, UnitStmt,
};

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT LOWERER
// Copies a validated program into `CompiledUnit`
// ═══════════════════════════════════════════════════════════════════════════════

pub struct UnitLowerer<'s> {
    source: &'s str,
    scope: &'s CapabilityScope,
    /// Names of top-level functions, so `<Helper />` resolves locally
    top_level_functions: HashSet<String>,
}

impl<'s> UnitLowerer<'s> {
    pub fn new(source: &'s str, scope: &'s CapabilityScope) -> Self {
        Self {
            source,
            scope,
            top_level_functions: HashSet::new(),
        }
    }

    pub fn lower_program(
        mut self,
        program: &Program,
        type_id: &str,
        factory_name: &str,
        capabilities: BTreeSet<String>,
        source_hash: String,
    ) -> Option<CompiledUnit> {
        self.top_level_functions = top_level_function_names(program);

        let mut helpers = IndexMap::new();
        let mut constants = Vec::new();

        for stmt in &program.body {
            match stmt {
                Statement::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        helpers.insert(id.name.to_string(), self.lower_function(func));
                    }
                }
                Statement::VariableDeclaration(var) => {
                    for decl in &var.declarations {
                        match (&decl.id, &decl.init) {
                            (BindingPattern::BindingIdentifier(id), Some(init))
                                if is_function_expr(init) =>
                            {
                                if let UnitExpr::Function(f) = self.lower_expr(init) {
                                    helpers.insert(id.name.to_string(), f);
                                }
                            }
                            (pattern, init) => {
                                let init = init
                                    .as_ref()
                                    .map(|e| self.lower_expr(e))
                                    .unwrap_or(UnitExpr::Undefined);
                                constants.push((self.lower_pattern(pattern), init));
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let factory = Arc::clone(helpers.get(factory_name)?);

        Some(CompiledUnit {
            type_id: type_id.to_string(),
            factory_name: factory_name.to_string(),
            factory,
            constants,
            helpers,
            capabilities,
            source_hash,
        })
    }

    fn slice(&self, span: Span) -> String {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
            .to_string()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Functions & statements
    // ───────────────────────────────────────────────────────────────────────────

    fn lower_params(&self, params: &FormalParameters) -> Vec<UnitPattern> {
        params
            .items
            .iter()
            .map(|param| self.lower_pattern(&param.pattern))
            .collect()
    }

    fn lower_function(&self, func: &Function) -> Arc<UnitFunction> {
        let body = func
            .body
            .as_ref()
            .map(|b| self.lower_block(&b.statements))
            .unwrap_or_default();
        Arc::new(UnitFunction {
            params: self.lower_params(&func.params),
            body,
        })
    }

    fn lower_arrow(&self, arrow: &ArrowFunctionExpression) -> Arc<UnitFunction> {
        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(Statement::ExpressionStatement(es)) => {
                    vec![UnitStmt::Return(Some(self.lower_expr(&es.expression)))]
                }
                _ => Vec::new(),
            }
        } else {
            self.lower_block(&arrow.body.statements)
        };
        Arc::new(UnitFunction {
            params: self.lower_params(&arrow.params),
            body,
        })
    }

    fn lower_block(&self, stmts: &[Statement]) -> Vec<UnitStmt> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.lower_stmt(stmt, &mut out);
        }
        out
    }

    fn lower_stmt(&self, stmt: &Statement, out: &mut Vec<UnitStmt>) {
        match stmt {
            Statement::VariableDeclaration(var) => {
                for decl in &var.declarations {
                    out.push(UnitStmt::Let {
                        pattern: self.lower_pattern(&decl.id),
                        init: decl.init.as_ref().map(|e| self.lower_expr(e)),
                    });
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    out.push(UnitStmt::Let {
                        pattern: UnitPattern::Ident(id.name.to_string()),
                        init: Some(UnitExpr::Function(self.lower_function(func))),
                    });
                }
            }
            Statement::IfStatement(if_stmt) => {
                let mut consequent = Vec::new();
                self.lower_stmt(&if_stmt.consequent, &mut consequent);
                let mut alternate = Vec::new();
                if let Some(alt) = &if_stmt.alternate {
                    self.lower_stmt(alt, &mut alternate);
                }
                out.push(UnitStmt::If {
                    test: self.lower_expr(&if_stmt.test),
                    consequent,
                    alternate,
                });
            }
            Statement::ReturnStatement(ret) => {
                out.push(UnitStmt::Return(
                    ret.argument.as_ref().map(|e| self.lower_expr(e)),
                ));
            }
            Statement::BlockStatement(blk) => {
                for s in &blk.body {
                    self.lower_stmt(s, out);
                }
            }
            Statement::EmptyStatement(_) => {}
            other => out.push(UnitStmt::Effect(self.slice(other.span()))),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Patterns
    // ───────────────────────────────────────────────────────────────────────────

    fn lower_pattern(&self, pattern: &BindingPattern) -> UnitPattern {
        match pattern {
            BindingPattern::BindingIdentifier(id) => UnitPattern::Ident(id.name.to_string()),
            BindingPattern::ObjectPattern(obj) => {
                let properties = obj
                    .properties
                    .iter()
                    .filter_map(|prop| {
                        let key = property_key_name(&prop.key)?;
                        Some((key, self.lower_pattern(&prop.value)))
                    })
                    .collect();
                UnitPattern::Object {
                    properties,
                    rest: obj.rest.as_ref().and_then(|r| binding_name(&r.argument)),
                }
            }
            BindingPattern::ArrayPattern(arr) => UnitPattern::Array {
                elements: arr
                    .elements
                    .iter()
                    .map(|el| el.as_ref().map(|p| self.lower_pattern(p)))
                    .collect(),
                rest: arr.rest.as_ref().and_then(|r| binding_name(&r.argument)),
            },
            BindingPattern::AssignmentPattern(assign) => UnitPattern::WithDefault {
                pattern: Box::new(self.lower_pattern(&assign.left)),
                default: self.lower_expr(&assign.right),
            },
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────────

    pub fn lower_expr(&self, expr: &Expression) -> UnitExpr {
        match expr {
            Expression::BooleanLiteral(b) => UnitExpr::Bool(b.value),
            Expression::NullLiteral(_) => UnitExpr::Null,
            Expression::NumericLiteral(n) => UnitExpr::Number(n.value),
            Expression::StringLiteral(s) => UnitExpr::Str(s.value.to_string()),
            Expression::TemplateLiteral(tpl) => UnitExpr::Template {
                quasis: tpl
                    .quasis
                    .iter()
                    .map(|q| {
                        q.value
                            .cooked
                            .as_ref()
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| q.value.raw.to_string())
                    })
                    .collect(),
                exprs: tpl.expressions.iter().map(|e| self.lower_expr(e)).collect(),
            },
            Expression::Identifier(id) => match id.name.as_str() {
                "undefined" => UnitExpr::Undefined,
                name => UnitExpr::Ident(name.to_string()),
            },
            Expression::ArrayExpression(arr) => UnitExpr::Array(
                arr.elements
                    .iter()
                    .map(|el| match el {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            ArrayItem::Spread(self.lower_expr(&spread.argument))
                        }
                        ArrayExpressionElement::Elision(_) => ArrayItem::Item(UnitExpr::Undefined),
                        _ => ArrayItem::Item(
                            el.as_expression()
                                .map(|e| self.lower_expr(e))
                                .unwrap_or(UnitExpr::Undefined),
                        ),
                    })
                    .collect(),
            ),
            Expression::ObjectExpression(obj) => UnitExpr::Object(
                obj.properties
                    .iter()
                    .filter_map(|prop| match prop {
                        ObjectPropertyKind::ObjectProperty(p) => {
                            let key = if p.computed {
                                None
                            } else {
                                property_key_name(&p.key)
                            };
                            key.map(|k| ObjectItem::Property(k, self.lower_expr(&p.value)))
                        }
                        ObjectPropertyKind::SpreadProperty(s) => {
                            Some(ObjectItem::Spread(self.lower_expr(&s.argument)))
                        }
                    })
                    .collect(),
            ),
            Expression::StaticMemberExpression(st) => UnitExpr::Member {
                object: Box::new(self.lower_expr(&st.object)),
                property: Box::new(UnitExpr::Str(st.property.name.to_string())),
            },
            Expression::ComputedMemberExpression(comp) => UnitExpr::Member {
                object: Box::new(self.lower_expr(&comp.object)),
                property: Box::new(self.lower_expr(&comp.expression)),
            },
            Expression::ChainExpression(chain) => match &chain.expression {
                ChainElement::CallExpression(call) => self.lower_call(call),
                ChainElement::StaticMemberExpression(st) => UnitExpr::Member {
                    object: Box::new(self.lower_expr(&st.object)),
                    property: Box::new(UnitExpr::Str(st.property.name.to_string())),
                },
                ChainElement::ComputedMemberExpression(comp) => UnitExpr::Member {
                    object: Box::new(self.lower_expr(&comp.object)),
                    property: Box::new(self.lower_expr(&comp.expression)),
                },
                _ => UnitExpr::Opaque(self.slice(chain.span)),
            },
            Expression::UnaryExpression(unary) => {
                let op = match unary.operator {
                    UnaryOperator::LogicalNot => UnaryOp::Not,
                    UnaryOperator::UnaryNegation => UnaryOp::Negate,
                    UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    UnaryOperator::Typeof => UnaryOp::TypeOf,
                    _ => return UnitExpr::Opaque(self.slice(unary.span)),
                };
                UnitExpr::Unary {
                    op,
                    arg: Box::new(self.lower_expr(&unary.argument)),
                }
            }
            Expression::BinaryExpression(bin) => {
                let op = match bin.operator {
                    BinaryOperator::Addition => BinaryOp::Add,
                    BinaryOperator::Subtraction => BinaryOp::Sub,
                    BinaryOperator::Multiplication => BinaryOp::Mul,
                    BinaryOperator::Division => BinaryOp::Div,
                    BinaryOperator::Remainder => BinaryOp::Rem,
                    BinaryOperator::Equality => BinaryOp::Eq,
                    BinaryOperator::Inequality => BinaryOp::NotEq,
                    BinaryOperator::StrictEquality => BinaryOp::StrictEq,
                    BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
                    BinaryOperator::LessThan => BinaryOp::Lt,
                    BinaryOperator::LessEqualThan => BinaryOp::LtEq,
                    BinaryOperator::GreaterThan => BinaryOp::Gt,
                    BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
                    _ => return UnitExpr::Opaque(self.slice(bin.span)),
                };
                UnitExpr::Binary {
                    op,
                    left: Box::new(self.lower_expr(&bin.left)),
                    right: Box::new(self.lower_expr(&bin.right)),
                }
            }
            Expression::LogicalExpression(logical) => UnitExpr::Logical {
                op: match logical.operator {
                    LogicalOperator::And => LogicalOp::And,
                    LogicalOperator::Or => LogicalOp::Or,
                    LogicalOperator::Coalesce => LogicalOp::Coalesce,
                },
                left: Box::new(self.lower_expr(&logical.left)),
                right: Box::new(self.lower_expr(&logical.right)),
            },
            Expression::ConditionalExpression(cond) => UnitExpr::Conditional {
                test: Box::new(self.lower_expr(&cond.test)),
                consequent: Box::new(self.lower_expr(&cond.consequent)),
                alternate: Box::new(self.lower_expr(&cond.alternate)),
            },
            Expression::CallExpression(call) => self.lower_call(call),
            Expression::ArrowFunctionExpression(arrow) => UnitExpr::Function(self.lower_arrow(arrow)),
            Expression::FunctionExpression(func) => UnitExpr::Function(self.lower_function(func)),
            Expression::ParenthesizedExpression(paren) => self.lower_expr(&paren.expression),
            Expression::TSAsExpression(as_expr) => self.lower_expr(&as_expr.expression),
            Expression::TSSatisfiesExpression(sat) => self.lower_expr(&sat.expression),
            Expression::TSNonNullExpression(nn) => self.lower_expr(&nn.expression),
            Expression::JSXElement(element) => UnitExpr::Markup(Box::new(self.lower_jsx_element(element))),
            Expression::JSXFragment(fragment) => {
                UnitExpr::Markup(Box::new(UnitNode::Fragment(self.lower_jsx_children(&fragment.children))))
            }
            other => UnitExpr::Opaque(self.slice(other.span())),
        }
    }

    fn lower_call(&self, call: &CallExpression) -> UnitExpr {
        let args = call
            .arguments
            .iter()
            .map(|arg| {
                arg.as_expression()
                    .map(|e| self.lower_expr(e))
                    .unwrap_or_else(|| UnitExpr::Opaque(self.slice(arg.span())))
            })
            .collect();
        UnitExpr::Call {
            callee: Box::new(self.lower_expr(&call.callee)),
            args,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Markup
    // ───────────────────────────────────────────────────────────────────────────

    fn lower_jsx_element(&self, element: &JSXElement) -> UnitNode {
        let tag = get_tag_name(&element.opening_element.name);
        let children = self.lower_jsx_children(&element.children);

        if tag == "Fragment" || tag == "React.Fragment" {
            return UnitNode::Fragment(children);
        }

        let mut attributes = Vec::new();
        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let value = match &attr.value {
                        Some(JSXAttributeValue::StringLiteral(s)) => UnitExpr::Str(s.value.to_string()),
                        Some(JSXAttributeValue::ExpressionContainer(container)) => container
                            .expression
                            .as_expression()
                            .map(|e| self.lower_expr(e))
                            .unwrap_or(UnitExpr::Undefined),
                        Some(JSXAttributeValue::Element(el)) => {
                            UnitExpr::Markup(Box::new(self.lower_jsx_element(el)))
                        }
                        Some(JSXAttributeValue::Fragment(frag)) => UnitExpr::Markup(Box::new(
                            UnitNode::Fragment(self.lower_jsx_children(&frag.children)),
                        )),
                        None => UnitExpr::Bool(true),
                    };
                    attributes.push(UnitAttribute::Named { name, value });
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    attributes.push(UnitAttribute::Spread(self.lower_expr(&spread.argument)));
                }
            }
        }

        UnitNode::Element {
            kind: self.classify_tag(&tag),
            tag,
            attributes,
            children,
        }
    }

    fn lower_jsx_children(&self, children: &[JSXChild]) -> Vec<UnitNode> {
        let mut out = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(text) = normalize_jsx_text(&t.value) {
                        out.push(UnitNode::Text(text));
                    }
                }
                JSXChild::Element(el) => out.push(self.lower_jsx_element(el)),
                JSXChild::Fragment(frag) => {
                    out.push(UnitNode::Fragment(self.lower_jsx_children(&frag.children)));
                }
                JSXChild::ExpressionContainer(container) => {
                    if let Some(e) = container.expression.as_expression() {
                        out.push(UnitNode::Expression(self.lower_expr(e)));
                    }
                }
                JSXChild::Spread(spread) => {
                    out.push(UnitNode::Expression(self.lower_expr(&spread.expression)));
                }
            }
        }
        out
    }

    fn classify_tag(&self, tag: &str) -> TagKind {
        if tag.chars().next().is_some_and(|c| c.is_ascii_lowercase()) || tag.contains('.') {
            TagKind::Intrinsic
        } else if self.top_level_functions.contains(tag) {
            TagKind::Local
        } else if self.scope.is_atom(tag) {
            TagKind::Atom
        } else {
            TagKind::Local
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn top_level_function_names(program: &Program) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    names.insert(id.name.to_string());
                }
            }
            Statement::VariableDeclaration(var) => {
                for decl in &var.declarations {
                    if let (BindingPattern::BindingIdentifier(id), Some(init)) = (&decl.id, &decl.init) {
                        if is_function_expr(init) {
                            names.insert(id.name.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn is_function_expr(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
    )
}

fn property_key_name(key: &PropertyKey) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        PropertyKey::NumericLiteral(n) => Some(n.value.to_string()),
        _ => None,
    }
}

fn binding_name(pattern: &BindingPattern) -> Option<String> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
        _ => None,
    }
}

fn get_tag_name(name: &JSXElementName) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => get_member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn get_member_name(me: &JSXMemberExpression) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => get_member_name(inner),
        _ => "unknown".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

/// JSX whitespace rules: single-line text is kept as written; multi-line text
/// is trimmed around line breaks and blank lines are dropped.
pub fn normalize_jsx_text(raw: &str) -> Option<String> {
    if !raw.contains('\n') {
        return (!raw.is_empty()).then(|| raw.to_string());
    }

    let lines: Vec<&str> = raw.lines().collect();
    let last = lines.len().saturating_sub(1);
    let parts: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line = if i == 0 { *line } else { line.trim_start() };
            if i == last {
                line
            } else {
                line.trim_end()
            }
        })
        .filter(|line| !line.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
