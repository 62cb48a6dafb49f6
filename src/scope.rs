//! Capability scope for generated components.
//!
//! A generated unit may only reference its own bindings, the capabilities
//! injected here, and a short list of side-effect free language globals.
//! Nothing is resolved from an ambient global environment.

use oxc_ast::ast::{BindingIdentifier, IdentifierReference, ImportExpression, JSXElementName, JSXMemberExpressionObject, Program};
use oxc_ast_visit::Visit;
use oxc_span::Span;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::CapabilityConfig;

lazy_static::lazy_static! {
    pub static ref SAFE_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Math");
        s.insert("JSON");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Date");
        s.insert("console");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("isNaN");
        s
    };
}

/// Namespace import of the host module (`import React from 'react'`).
pub const HOST_NAMESPACE: &str = "React";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStyle {
    Default,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub name: String,
    pub module: String,
    pub style: ImportStyle,
    /// Primitive UI atom, as opposed to a host hook or namespace
    pub is_atom: bool,
}

#[derive(Debug, Clone)]
pub struct CapabilityScope {
    capabilities: BTreeMap<String, Capability>,
}

impl Default for CapabilityScope {
    fn default() -> Self {
        Self::from_config(&CapabilityConfig::default())
    }
}

impl CapabilityScope {
    pub fn from_config(config: &CapabilityConfig) -> Self {
        let mut capabilities = BTreeMap::new();

        capabilities.insert(
            HOST_NAMESPACE.to_string(),
            Capability {
                name: HOST_NAMESPACE.to_string(),
                module: config.host_module.clone(),
                style: ImportStyle::Default,
                is_atom: false,
            },
        );
        for hook in &config.hooks {
            capabilities.insert(
                hook.clone(),
                Capability {
                    name: hook.clone(),
                    module: config.host_module.clone(),
                    style: ImportStyle::Named,
                    is_atom: false,
                },
            );
        }
        for atom in &config.atoms {
            capabilities.insert(
                atom.clone(),
                Capability {
                    name: atom.clone(),
                    module: config.atoms_module.clone(),
                    style: ImportStyle::Named,
                    is_atom: true,
                },
            );
        }

        Self { capabilities }
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn is_atom(&self, name: &str) -> bool {
        self.capabilities.get(name).is_some_and(|c| c.is_atom)
    }

    /// True if `name` may be referenced without a local binding.
    pub fn is_resolvable(&self, name: &str) -> bool {
        self.contains(name) || SAFE_GLOBALS.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FREE REFERENCE COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// References and bindings of a whole program. Scoping is flattened: a name
/// bound anywhere in the program counts as bound everywhere.
#[derive(Debug, Default)]
pub struct ReferenceInventory {
    pub references: Vec<(String, Span)>,
    pub bindings: HashSet<String>,
    pub dynamic_imports: Vec<Span>,
}

impl ReferenceInventory {
    pub fn collect(program: &Program) -> Self {
        let mut collector = ScopeAwareCollector::default();
        collector.visit_program(program);
        collector.inventory
    }

    /// References that are neither bound nor resolvable through `scope`, first occurrence each.
    pub fn unresolved<'s>(&'s self, scope: &'s CapabilityScope) -> impl Iterator<Item = &'s (String, Span)> + 's {
        let mut seen = HashSet::new();
        self.references.iter().filter(move |(name, _)| {
            !self.bindings.contains(name) && !scope.is_resolvable(name) && seen.insert(name.clone())
        })
    }

    /// Capabilities the program actually uses.
    pub fn used_capabilities(&self, scope: &CapabilityScope) -> BTreeSet<String> {
        self.references
            .iter()
            .filter(|(name, _)| !self.bindings.contains(name) && scope.contains(name))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[derive(Default)]
struct ScopeAwareCollector {
    inventory: ReferenceInventory,
}

impl<'a> Visit<'a> for ScopeAwareCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.inventory
            .references
            .push((ident.name.to_string(), ident.span));
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.inventory.bindings.insert(ident.name.to_string());
    }

    fn visit_jsx_element_name(&mut self, name: &JSXElementName<'a>) {
        // Component tags are references too; intrinsic lowercase tags are not.
        match name {
            JSXElementName::IdentifierReference(id) => {
                self.inventory.references.push((id.name.to_string(), id.span));
            }
            JSXElementName::MemberExpression(member) => {
                let mut object = &member.object;
                loop {
                    match object {
                        JSXMemberExpressionObject::IdentifierReference(id) => {
                            self.inventory.references.push((id.name.to_string(), id.span));
                            break;
                        }
                        JSXMemberExpressionObject::MemberExpression(inner) => {
                            object = &inner.object;
                        }
                        _ => break,
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        self.inventory.dynamic_imports.push(expr.span);
        oxc_ast_visit::walk::walk_import_expression(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn inventory(code: &str) -> ReferenceInventory {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true).with_jsx(true);
        let ret = Parser::new(&allocator, code, source_type).parse();
        assert!(ret.errors.is_empty());
        ReferenceInventory::collect(&ret.program)
    }

    #[test]
    fn test_default_scope_contents() {
        let scope = CapabilityScope::default();
        assert!(scope.is_atom("Button"));
        assert!(!scope.is_atom("useState"));
        assert_eq!(scope.get("React").unwrap().style, ImportStyle::Default);
        assert!(scope.is_resolvable("Math"));
        assert!(!scope.is_resolvable("window"));
    }

    #[test]
    fn test_unresolved_references() {
        let scope = CapabilityScope::default();
        let inv = inventory(
            "function Hero({ title }) { const [open] = useState(false); fetch('/x'); return <Box>{title}{window.x}</Box>; }",
        );
        let unresolved: Vec<_> = inv.unresolved(&scope).map(|(n, _)| n.as_str()).collect();
        assert_eq!(unresolved, vec!["fetch", "window"]);

        let used = inv.used_capabilities(&scope);
        assert!(used.contains("useState"));
        assert!(used.contains("Box"));
    }

    #[test]
    fn test_jsx_member_tag_is_reference() {
        let scope = CapabilityScope::default();
        let inv = inventory("const Hero = () => <motion.div />;");
        let unresolved: Vec<_> = inv.unresolved(&scope).map(|(n, _)| n.as_str()).collect();
        assert_eq!(unresolved, vec!["motion"]);
    }

    #[test]
    fn test_local_binding_shadows_capability() {
        let scope = CapabilityScope::default();
        let inv = inventory("function Button() { return <button />; }");
        assert!(inv.used_capabilities(&scope).is_empty());
    }
}
