//! Structural validation of generated component source.
//!
//! Validation is a narrow grammar check, not a sandbox: the text must be a
//! single self-contained module body that defines exactly one unit factory
//! for the requested type and references nothing outside its capability scope.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_ast::ast::{Expression, Program, Statement};
use oxc_span::{GetSpan, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::catalog::to_canonical_type_id;
use crate::scope::{CapabilityScope, ReferenceInventory};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_EMPTY: &str = "B-ERR-EMPTY";
pub const ERR_SYNTAX: &str = "B-ERR-SYNTAX";
pub const ERR_MODULE_SYNTAX: &str = "B-ERR-MODULE";
pub const ERR_FACTORY_MISSING: &str = "B-ERR-FACTORY-MISSING";
pub const ERR_FACTORY_AMBIGUOUS: &str = "B-ERR-FACTORY-AMBIGUOUS";
pub const ERR_FACTORY_NAME: &str = "B-ERR-FACTORY-NAME";
pub const ERR_NOT_MARKUP: &str = "B-ERR-NOT-MARKUP";
pub const ERR_CAPABILITY: &str = "B-ERR-CAPABILITY";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_EMPTY => "Generated source contains a component definition.",
        ERR_SYNTAX => "Generated source parses as a module body.",
        ERR_MODULE_SYNTAX => {
            "Generated source is self-contained: capabilities are injected, never imported."
        }
        ERR_FACTORY_MISSING => "Generated source defines a component factory.",
        ERR_FACTORY_AMBIGUOUS => "Exactly one factory is registered per type identifier.",
        ERR_FACTORY_NAME => "The factory name matches its type identifier.",
        ERR_NOT_MARKUP => "The factory produces declarative markup.",
        ERR_CAPABILITY => {
            "Generated source only references its own bindings and injected capabilities."
        }
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({line}:{column})")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            line,
            column,
            context,
            hints,
        }
    }

    /// Error positioned at `span` within `source`, with the spanned text as context.
    pub fn at_span(code: &str, message: &str, source: &str, span: Span) -> Self {
        let (line, column) = offset_to_line_col(source, span.start as usize);
        let context = source
            .get(span.start as usize..span.end as usize)
            .map(|s| s.lines().next().unwrap_or_default().to_string());
        Self::with_details(code, message, line, column, context, vec![])
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

/// 1-based line and column of a byte offset.
pub fn offset_to_line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() as u32 + 1,
        None => before.chars().count() as u32 + 1,
    };
    (line, column)
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION FUNCTIONS (Return Option, not Result)
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedSource {
    pub factory_name: String,
    pub capabilities: BTreeSet<String>,
}

/// Parser failure, positioned at the first diagnostic label when there is one.
pub(crate) fn syntax_error(source: &str, message: String, offset: Option<usize>) -> CompilerError {
    let (line, column) = offset
        .map(|offset| offset_to_line_col(source, offset))
        .unwrap_or((1, 1));
    CompilerError::new(ERR_SYNTAX, &message, line, column)
}

fn validate_no_module_syntax(program: &Program, inventory: &ReferenceInventory, source: &str) -> Option<CompilerError> {
    for stmt in &program.body {
        let kind = match stmt {
            Statement::ImportDeclaration(_) => "import declaration",
            Statement::ExportNamedDeclaration(_)
            | Statement::ExportDefaultDeclaration(_)
            | Statement::ExportAllDeclaration(_) => "export declaration",
            _ => continue,
        };
        return Some(
            CompilerError::at_span(
                ERR_MODULE_SYNTAX,
                &format!("Generated source contains an {}.", kind),
                source,
                stmt.span(),
            )
            .hint("Remove import/export statements; atoms and hooks are provided in scope."),
        );
    }

    inventory.dynamic_imports.first().map(|span| {
        CompilerError::at_span(
            ERR_MODULE_SYNTAX,
            "Generated source contains a dynamic import().",
            source,
            *span,
        )
    })
}

fn validate_capabilities(inventory: &ReferenceInventory, scope: &CapabilityScope, source: &str) -> Option<CompilerError> {
    let unresolved: Vec<&(String, Span)> = inventory.unresolved(scope).collect();
    let (name, span) = unresolved.first()?;

    let mut err = CompilerError::at_span(
        ERR_CAPABILITY,
        &format!("`{}` is not defined and is not an injected capability.", name),
        source,
        *span,
    );
    if unresolved.len() > 1 {
        let rest: Vec<&str> = unresolved[1..].iter().map(|(n, _)| n.as_str()).collect();
        err = err.hint(format!("Also unresolved: {}", rest.join(", ")));
    }
    let available: Vec<&str> = scope.names().collect();
    Some(err.hint(format!("Available capabilities: {}", available.join(", "))))
}

/// A top-level binding shaped like a component factory.
struct FactoryCandidate<'p, 'a> {
    name: String,
    span: Span,
    body: FactoryBody<'p, 'a>,
}

enum FactoryBody<'p, 'a> {
    Statements(&'p [Statement<'a>]),
    Expression(&'p Expression<'a>),
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn collect_factory_candidates<'p, 'a>(program: &'p Program<'a>) -> Vec<FactoryCandidate<'p, 'a>> {
    let mut out = Vec::new();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                let (Some(id), Some(body)) = (&func.id, &func.body) else {
                    continue;
                };
                if is_component_name(&id.name) {
                    out.push(FactoryCandidate {
                        name: id.name.to_string(),
                        span: func.span,
                        body: FactoryBody::Statements(&body.statements[..]),
                    });
                }
            }
            Statement::VariableDeclaration(var) => {
                for decl in &var.declarations {
                    let oxc_ast::ast::BindingPattern::BindingIdentifier(id) = &decl.id else {
                        continue;
                    };
                    if !is_component_name(&id.name) {
                        continue;
                    }
                    let body = match &decl.init {
                        Some(Expression::ArrowFunctionExpression(arrow)) => {
                            if arrow.expression {
                                match arrow.body.statements.first() {
                                    Some(Statement::ExpressionStatement(es)) => {
                                        FactoryBody::Expression(&es.expression)
                                    }
                                    _ => continue,
                                }
                            } else {
                                FactoryBody::Statements(&arrow.body.statements[..])
                            }
                        }
                        Some(Expression::FunctionExpression(func)) => match &func.body {
                            Some(body) => FactoryBody::Statements(&body.statements[..]),
                            None => continue,
                        },
                        _ => continue,
                    };
                    out.push(FactoryCandidate {
                        name: id.name.to_string(),
                        span: decl.span,
                        body,
                    });
                }
            }
            _ => {}
        }
    }
    out
}

fn locate_factory<'c, 'p, 'a>(
    candidates: &'c [FactoryCandidate<'p, 'a>],
    type_id: &str,
    source: &str,
) -> Result<&'c FactoryCandidate<'p, 'a>, CompilerError> {
    let raw = type_id.trim();
    let canonical = to_canonical_type_id(raw);
    let matches: Vec<&FactoryCandidate> = candidates
        .iter()
        .filter(|c| c.name == raw || c.name == canonical)
        .collect();

    match matches.as_slice() {
        [single] => Ok(*single),
        [] if candidates.is_empty() => Err(CompilerError::new(
            ERR_FACTORY_MISSING,
            &format!("No component factory found for `{}`.", type_id),
            1,
            1,
        )
        .hint(format!("Define `function {}(props) {{ return <...>; }}`.", canonical))),
        [] => {
            let found: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
            Err(CompilerError::at_span(
                ERR_FACTORY_NAME,
                &format!(
                    "No factory is named `{}`; found {}.",
                    canonical,
                    found.join(", ")
                ),
                source,
                candidates[0].span,
            )
            .hint(format!("Rename the factory to `{}`.", canonical)))
        }
        [_, second, ..] => Err(CompilerError::at_span(
            ERR_FACTORY_AMBIGUOUS,
            &format!("`{}` is defined more than once.", second.name),
            source,
            second.span,
        )),
    }
}

fn is_markup_expr(expr: &Expression) -> bool {
    match expr {
        Expression::JSXElement(_) | Expression::JSXFragment(_) => true,
        Expression::ParenthesizedExpression(paren) => is_markup_expr(&paren.expression),
        Expression::ConditionalExpression(cond) => {
            is_markup_expr(&cond.consequent) || is_markup_expr(&cond.alternate)
        }
        Expression::LogicalExpression(logical) => {
            is_markup_expr(&logical.left) || is_markup_expr(&logical.right)
        }
        _ => false,
    }
}

fn stmt_returns_markup(stmt: &Statement) -> bool {
    match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().is_some_and(is_markup_expr),
        Statement::BlockStatement(blk) => blk.body.iter().any(stmt_returns_markup),
        Statement::IfStatement(if_stmt) => {
            stmt_returns_markup(&if_stmt.consequent)
                || if_stmt.alternate.as_ref().is_some_and(stmt_returns_markup)
        }
        _ => false,
    }
}

fn validate_returns_markup(candidate: &FactoryCandidate, source: &str) -> Option<CompilerError> {
    let produces_markup = match &candidate.body {
        FactoryBody::Expression(expr) => is_markup_expr(expr),
        FactoryBody::Statements(stmts) => stmts.iter().any(stmt_returns_markup),
    };
    if produces_markup {
        return None;
    }
    Some(
        CompilerError::at_span(
            ERR_NOT_MARKUP,
            &format!("`{}` never returns markup.", candidate.name),
            source,
            candidate.span,
        )
        .hint("A component factory must return a JSX element or fragment."),
    )
}

/// Run every structural check against a parsed program.
pub fn validate_program(
    program: &Program,
    source: &str,
    type_id: &str,
    scope: &CapabilityScope,
) -> Result<ValidatedSource, CompilerError> {
    if program.body.is_empty() {
        return Err(CompilerError::new(ERR_EMPTY, "Generated source is empty.", 1, 1));
    }

    let inventory = ReferenceInventory::collect(program);

    if let Some(e) = validate_no_module_syntax(program, &inventory, source) {
        return Err(e);
    }

    let candidates = collect_factory_candidates(program);
    let factory = locate_factory(&candidates, type_id, source)?;

    if let Some(e) = validate_returns_markup(factory, source) {
        return Err(e);
    }

    if let Some(e) = validate_capabilities(&inventory, scope, source) {
        return Err(e);
    }

    Ok(ValidatedSource {
        factory_name: factory.name.clone(),
        capabilities: inventory.used_capabilities(scope),
    })
}
