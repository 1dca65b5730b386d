//! Semantic validator and variable registry (C8, §4.8). Walks a parsed
//! `Query` (and its subqueries) once, registering every variable's
//! producers/consumers, then checks the five ordered rules. Validation
//! yields either an empty diagnostic list (success) or a non-empty one,
//! matching §4.8's "non-empty halts execution".

use crate::core::types::ValueType;
use crate::query::ast::{Condition, JoinCondition, Query, SelectColumn, VarOrLiteral};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDiagnostic {
    pub message: String,
}

impl ValidationDiagnostic {
    fn new(message: impl Into<String>) -> Self {
        ValidationDiagnostic { message: message.into() }
    }
}

/// Per-variable metadata: the LUB of its producer types plus whether it has
/// at least one producer at all (distinct from "produces `String`" since the
/// LUB default for an unseen variable is meaningless).
#[derive(Debug, Clone, Default)]
pub struct VariableInfo {
    pub producer_type: Option<ValueType>,
    pub producer_count: usize,
    pub consumer_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    vars: BTreeMap<String, VariableInfo>,
}

impl VariableRegistry {
    pub fn get(&self, name: &str) -> Option<&VariableInfo> {
        self.vars.get(name)
    }

    pub fn has_producer(&self, name: &str) -> bool {
        self.vars.get(name).is_some_and(|v| v.producer_count > 0)
    }

    pub fn inferred_type(&self, name: &str) -> Option<ValueType> {
        self.vars.get(name).and_then(|v| v.producer_type)
    }

    pub fn exported_vars(&self) -> BTreeSet<String> {
        self.vars.iter().filter(|(_, info)| info.producer_count > 0).map(|(name, _)| name.clone()).collect()
    }

    fn register_producer(&mut self, name: &str, value_type: ValueType) -> Result<(), ValidationDiagnostic> {
        let entry = self.vars.entry(name.to_string()).or_default();
        entry.producer_count += 1;
        entry.producer_type = Some(match entry.producer_type {
            None => value_type,
            Some(existing) => {
                if !families_compatible(existing, value_type) {
                    return Err(ValidationDiagnostic::new(format!(
                        "variable ?{name} has incompatible producer types ({existing:?} vs {value_type:?})"
                    )));
                }
                existing.join(value_type)
            }
        });
        Ok(())
    }

    fn register_consumer(&mut self, name: &str) {
        self.vars.entry(name.to_string()).or_default().consumer_count += 1;
    }
}

/// `Date` and `Integer` only unify with themselves; the textual kinds
/// (`Entity`/`Term`/`Pos`/`String`) unify with each other (§4.8 rule 2 — the
/// LUB is `String` for those, but e.g. mixing `Date` and `Term` producers for
/// the same variable is a genuine type error, not just a widening).
fn families_compatible(a: ValueType, b: ValueType) -> bool {
    fn family(t: ValueType) -> u8 {
        match t {
            ValueType::Date => 0,
            ValueType::Integer => 1,
            ValueType::Entity | ValueType::Term | ValueType::Pos | ValueType::String => 2,
        }
    }
    family(a) == family(b)
}

/// Result of validating one query scope (main or a single subquery): its own
/// registry plus the alias -> (registry, export-list) of every immediate
/// subquery, needed by the outer scope to check qualified references.
pub struct ValidatedScope {
    pub registry: VariableRegistry,
}

pub fn validate_query(query: &Query) -> Result<ValidatedScope, Vec<ValidationDiagnostic>> {
    let mut diagnostics = Vec::new();
    let mut registry = VariableRegistry::default();

    // Subqueries validate as fully independent scopes first (§4.8: "the main
    // query or a single subquery aliased with AS" is the scoping unit).
    let mut subquery_registries: BTreeMap<String, VariableRegistry> = BTreeMap::new();
    for sub in &query.subqueries {
        match validate_query(&sub.query) {
            Ok(scope) => {
                subquery_registries.insert(sub.alias.clone(), scope.registry);
            }
            Err(mut sub_errors) => diagnostics.append(&mut sub_errors),
        }
    }

    if let Some(cond) = &query.conditions {
        walk_condition(cond, false, &mut registry, &mut diagnostics);
    }

    for col in &query.select_columns {
        match col {
            SelectColumn::Var(name) => check_local_consumer(name, &registry, &mut diagnostics),
            SelectColumn::Snippet { var, .. } => check_local_consumer(var, &registry, &mut diagnostics),
            SelectColumn::AliasVar { alias, var } => check_qualified_consumer(alias, var, &subquery_registries, &query.subqueries, &mut diagnostics),
            SelectColumn::Count(_) | SelectColumn::Title | SelectColumn::Timestamp | SelectColumn::Metadata(_) => {}
        }
    }

    let select_names = select_column_names(query);
    for order_col in &query.order_by {
        if !select_names.contains(&order_col.name) {
            diagnostics.push(ValidationDiagnostic::new(format!(
                "ORDER BY references '{}' which is not a select column",
                order_col.name
            )));
        }
    }

    if let Some(join) = &query.join_condition {
        validate_join_condition(join, query, &registry, &subquery_registries, &mut diagnostics);
    }

    if diagnostics.is_empty() { Ok(ValidatedScope { registry }) } else { Err(diagnostics) }
}

fn walk_condition(condition: &Condition, under_not: bool, registry: &mut VariableRegistry, diagnostics: &mut Vec<ValidationDiagnostic>) {
    match condition {
        Condition::Contains { bind: Some(name), .. } => register_if_producing(name, ValueType::Term, under_not, registry, diagnostics),
        Condition::Contains { bind: None, .. } => {}
        Condition::Ner { target: VarOrLiteral::Var(name), .. } => register_if_producing(name, ValueType::Entity, under_not, registry, diagnostics),
        Condition::Ner { .. } => {}
        Condition::Pos { target: VarOrLiteral::Var(name), .. } => register_if_producing(name, ValueType::Pos, under_not, registry, diagnostics),
        Condition::Pos { .. } => {}
        Condition::Dep { .. } | Condition::Hypernym { .. } => {}
        Condition::Date { bind: Some(name), .. } => register_if_producing(name, ValueType::Date, under_not, registry, diagnostics),
        Condition::Date { bind: None, .. } => {}
        Condition::Not(inner) => walk_condition(inner, true, registry, diagnostics),
        Condition::And(branches) | Condition::Or(branches) => {
            for branch in branches {
                walk_condition(branch, under_not, registry, diagnostics);
            }
        }
    }
}

/// Registers `name` as a producer unless we're nested under a `NOT`, per
/// §4.9 ("NOT ... consumes only") — a variable bound inside a negated branch
/// isn't a well-defined value for the (complemented) matches that survive.
fn register_if_producing(name: &str, value_type: ValueType, under_not: bool, registry: &mut VariableRegistry, diagnostics: &mut Vec<ValidationDiagnostic>) {
    if under_not {
        registry.register_consumer(name);
        return;
    }
    if let Err(diag) = registry.register_producer(name, value_type) {
        diagnostics.push(diag);
    }
}

fn check_local_consumer(name: &str, registry: &VariableRegistry, diagnostics: &mut Vec<ValidationDiagnostic>) {
    if !registry.has_producer(name) {
        diagnostics.push(ValidationDiagnostic::new(format!("variable ?{name} is consumed but has no producer in scope")));
    }
}

fn check_qualified_consumer(
    alias: &str,
    var: &str,
    subquery_registries: &BTreeMap<String, VariableRegistry>,
    subqueries: &[crate::query::ast::Subquery],
    diagnostics: &mut Vec<ValidationDiagnostic>,
) {
    let Some(sub_registry) = subquery_registries.get(alias) else {
        diagnostics.push(ValidationDiagnostic::new(format!("'{alias}' does not name a joined subquery")));
        return;
    };
    let sub_spec = subqueries.iter().find(|s| s.alias == alias);
    let exported = sub_spec.and_then(|s| s.exported_columns.as_ref());
    let is_exported = match exported {
        Some(cols) => cols.iter().any(|c| c == var),
        None => sub_registry.has_producer(var),
    };
    if !is_exported {
        diagnostics.push(ValidationDiagnostic::new(format!("'{alias}.?{var}' is not exported by subquery '{alias}'")));
    }
}

fn validate_join_condition(
    join: &JoinCondition,
    query: &Query,
    registry: &VariableRegistry,
    subquery_registries: &BTreeMap<String, VariableRegistry>,
    diagnostics: &mut Vec<ValidationDiagnostic>,
) {
    let is_main_alias = |alias: &str| query.main_alias.as_deref() == Some(alias) || alias == query.source;

    for (alias, var) in [(&join.left_alias, &join.left_var), (&join.right_alias, &join.right_var)] {
        if is_main_alias(alias) {
            check_local_consumer(var, registry, diagnostics);
            if let Some(t) = registry.inferred_type(var) {
                if !families_compatible(t, ValueType::Date) {
                    diagnostics.push(ValidationDiagnostic::new(format!("join reference '{alias}.?{var}' must be date-typed, found {t:?}")));
                }
            }
        } else {
            check_qualified_consumer(alias, var, subquery_registries, &query.subqueries, diagnostics);
            if let Some(sub_registry) = subquery_registries.get(alias) {
                if let Some(t) = sub_registry.inferred_type(var) {
                    if !families_compatible(t, ValueType::Date) {
                        diagnostics.push(ValidationDiagnostic::new(format!("join reference '{alias}.?{var}' must be date-typed, found {t:?}")));
                    }
                }
            }
        }
    }
}

fn select_column_names(query: &Query) -> BTreeSet<String> {
    query
        .select_columns
        .iter()
        .filter_map(|col| match col {
            SelectColumn::Var(name) => Some(format!("?{name}")),
            SelectColumn::AliasVar { alias, var } => Some(format!("{alias}.?{var}")),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;

    #[test]
    fn unproduced_variable_is_rejected() {
        let query = parse(r#"FROM c SELECT ?y WHERE CONTAINS("cat", ?x)"#).unwrap();
        let errors = validate_query(&query).unwrap_err();
        assert!(errors.iter().any(|d| d.message.contains("?y")));
    }

    #[test]
    fn producer_then_consumer_is_valid() {
        let query = parse(r#"FROM c SELECT ?x WHERE CONTAINS("cat", ?x)"#).unwrap();
        let scope = validate_query(&query).unwrap();
        assert_eq!(scope.registry.inferred_type("x"), Some(ValueType::Term));
    }

    #[test]
    fn not_branch_does_not_export_its_binding() {
        let query = parse(r#"FROM c SELECT ?x WHERE NOT CONTAINS("cat", ?x)"#).unwrap();
        let errors = validate_query(&query).unwrap_err();
        assert!(errors.iter().any(|d| d.message.contains("?x")));
    }

    #[test]
    fn order_by_unknown_column_is_rejected() {
        let query = parse(r#"FROM c SELECT ?x WHERE CONTAINS("cat", ?x) ORDER BY ?z"#).unwrap();
        let errors = validate_query(&query).unwrap_err();
        assert!(errors.iter().any(|d| d.message.contains("ORDER BY")));
    }

    #[test]
    fn conflicting_producer_types_are_rejected() {
        let query = parse(r#"FROM c WHERE CONTAINS("cat", ?x) AND DATE(INTERSECT [2023-01-01, 2023-02-01], ?x)"#).unwrap();
        let errors = validate_query(&query).unwrap_err();
        assert!(errors.iter().any(|d| d.message.contains("incompatible")));
    }

    #[test]
    fn qualified_reference_to_non_exported_subquery_var_is_rejected() {
        let query = parse(
            r#"FROM main SELECT q2.?missing WHERE NER(PERSON, ?p) JOIN (FROM dates SELECT ?d WHERE DATE(INTERSECT [2020-01-01, 2020-12-31], ?d)) AS q2 ON main.?p PROXIMITY q2.?d WINDOW 30"#,
        )
        .unwrap();
        let errors = validate_query(&query).unwrap_err();
        assert!(errors.iter().any(|d| d.message.contains("not exported")));
    }
}
