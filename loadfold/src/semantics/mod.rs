//! Static facts about program fragments
//!
//! - `CallGraph` / `SideEffectsPropagator`: effect summary per function
//! - `MSizeFinder`: does the program observe the memory extent anywhere
//! - `SideEffectsCollector`: aggregate effects of an expression or statement
//! - `assigned_variable_names`: variables reassigned inside a block

mod call_graph;

pub use call_graph::{CallGraph, MSizeFinder, SideEffectsPropagator};

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Block, Expression, FunctionCall, Statement};
use crate::dialect::{Dialect, SideEffects};
use crate::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// Visit every call executed by `block` in place.
///
/// Bodies of nested function definitions are skipped; they only run when
/// called, and their calls are accounted for through the call graph.
pub fn for_each_call_in_block<F: FnMut(&FunctionCall)>(block: &Block, f: &mut F) {
    for statement in &block.statements {
        for_each_call_in_statement(statement, f);
    }
}

pub fn for_each_call_in_statement<F: FnMut(&FunctionCall)>(statement: &Statement, f: &mut F) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || match statement {
        Statement::ExpressionStatement(statement) => for_each_call_in_expression(&statement.expression, f),
        Statement::Assignment(assignment) => for_each_call_in_expression(&assignment.value, f),
        Statement::VariableDeclaration(declaration) => {
            if let Some(value) = &declaration.value {
                for_each_call_in_expression(value, f);
            }
        }
        Statement::FunctionDefinition(_) => {}
        Statement::If(if_statement) => {
            for_each_call_in_expression(&if_statement.condition, f);
            for_each_call_in_block(&if_statement.body, f);
        }
        Statement::Switch(switch) => {
            for_each_call_in_expression(&switch.expression, f);
            for case in &switch.cases {
                for_each_call_in_block(&case.body, f);
            }
        }
        Statement::ForLoop(for_loop) => {
            for_each_call_in_block(&for_loop.pre, f);
            for_each_call_in_expression(&for_loop.condition, f);
            for_each_call_in_block(&for_loop.post, f);
            for_each_call_in_block(&for_loop.body, f);
        }
        Statement::Block(block) => for_each_call_in_block(block, f),
        Statement::Break(_) | Statement::Continue(_) | Statement::Leave(_) => {}
    })
}

pub fn for_each_call_in_expression<F: FnMut(&FunctionCall)>(expression: &Expression, f: &mut F) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        if let Expression::FunctionCall(call) = expression {
            for argument in &call.arguments {
                for_each_call_in_expression(argument, f);
            }
            f(call);
        }
    })
}

/// Aggregate side effects of code fragments
pub struct SideEffectsCollector<'a> {
    dialect: &'a dyn Dialect,
    function_side_effects: &'a BTreeMap<String, SideEffects>,
}

impl<'a> SideEffectsCollector<'a> {
    pub fn new(dialect: &'a dyn Dialect, function_side_effects: &'a BTreeMap<String, SideEffects>) -> Self {
        Self {
            dialect,
            function_side_effects,
        }
    }

    /// Effects of calling `name` once
    pub fn call_effects(&self, name: &str) -> SideEffects {
        self.dialect
            .effects_of(name)
            .or_else(|| self.function_side_effects.get(name).copied())
            .unwrap_or(SideEffects::worst())
    }

    pub fn expression(&self, expression: &Expression) -> SideEffects {
        let mut effects = SideEffects::none();
        for_each_call_in_expression(expression, &mut |call| effects |= self.call_effects(call.name()));
        effects
    }

    pub fn block(&self, block: &Block) -> SideEffects {
        let mut effects = SideEffects::none();
        for_each_call_in_block(block, &mut |call| effects |= self.call_effects(call.name()));
        effects
    }
}

/// Names assigned with `:=` anywhere inside `block`.
///
/// Declarations are not assignments; nested function bodies are skipped
/// since they cannot reach the enclosing variables.
pub fn assigned_variable_names(block: &Block) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_assigned(block, &mut names);
    names
}

fn collect_assigned(block: &Block, names: &mut BTreeSet<String>) {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || collect_assigned_inner(block, names))
}

fn collect_assigned_inner(block: &Block, names: &mut BTreeSet<String>) {
    for statement in &block.statements {
        match statement {
            Statement::Assignment(assignment) => {
                names.extend(assignment.variable_names.iter().map(|v| v.name.clone()));
            }
            Statement::If(if_statement) => collect_assigned(&if_statement.body, names),
            Statement::Switch(switch) => {
                for case in &switch.cases {
                    collect_assigned(&case.body, names);
                }
            }
            Statement::ForLoop(for_loop) => {
                collect_assigned(&for_loop.pre, names);
                collect_assigned(&for_loop.post, names);
                collect_assigned(&for_loop.body, names);
            }
            Statement::Block(inner) => collect_assigned(inner, names),
            _ => {}
        }
    }
}
