//! Forward data-flow analysis over the tree IR
//!
//! `DataFlowAnalyzer` walks a program in execution order and keeps, at every
//! point, what is known about storage and memory contents and about
//! variables holding literal values. Passes plug in through
//! `ExpressionRewriter`: every expression is offered to the rewriter after
//! its arguments have been visited, together with the analyzer's current
//! knowledge.
//!
//! Knowledge is only ever lost conservatively. A store records exactly one
//! key/value pair and forgets everything else about its address space;
//! any statement that may write an address space forgets all of it;
//! control-flow merges keep only the facts that hold on every path.

mod scope;

pub use scope::ScopeStack;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use num_traits::Zero;

use crate::ast::{Block, Expression, ForLoop, FunctionDefinition, Identifier, If, Statement, Switch, Word};
use crate::dialect::{BuiltinRole, Dialect, SideEffects, StoreLoadLocation};
use crate::error::{CompileError, Result};
use crate::semantics::{assigned_variable_names, SideEffectsCollector};
use crate::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// Hook invoked on every expression, innermost first
pub trait ExpressionRewriter {
    fn rewrite(&mut self, analyzer: &DataFlowAnalyzer<'_>, expression: &mut Expression) -> Result<()>;
}

/// Known `key -> value` variable pairs per address space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Environment {
    storage: HashMap<String, String>,
    memory: HashMap<String, String>,
}

impl Environment {
    fn mapping(&self, location: StoreLoadLocation) -> &HashMap<String, String> {
        match location {
            StoreLoadLocation::Storage => &self.storage,
            StoreLoadLocation::Memory => &self.memory,
        }
    }

    fn mapping_mut(&mut self, location: StoreLoadLocation) -> &mut HashMap<String, String> {
        match location {
            StoreLoadLocation::Storage => &mut self.storage,
            StoreLoadLocation::Memory => &mut self.memory,
        }
    }

    /// Keep only the entries present with the same value in `other`
    fn join(&mut self, other: &Environment) {
        self.storage.retain(|key, value| other.storage.get(key) == Some(value));
        self.memory.retain(|key, value| other.memory.get(key) == Some(value));
    }

    /// Drop every entry mentioning a forgotten variable as key or value
    fn forget(&mut self, is_forgotten: &impl Fn(&str) -> bool) {
        for mapping in [&mut self.storage, &mut self.memory] {
            mapping.retain(|key, value| !is_forgotten(key.as_str()) && !is_forgotten(value.as_str()));
        }
    }
}

/// Forward analysis state shared by load-resolving passes
pub struct DataFlowAnalyzer<'a> {
    dialect: &'a dyn Dialect,
    collector: SideEffectsCollector<'a>,
    environment: Environment,
    /// Variables currently known to hold a literal value
    values: HashMap<String, Word>,
    scopes: ScopeStack,
}

impl<'a> DataFlowAnalyzer<'a> {
    pub fn new(dialect: &'a dyn Dialect, function_side_effects: &'a BTreeMap<String, SideEffects>) -> Self {
        Self {
            dialect,
            collector: SideEffectsCollector::new(dialect, function_side_effects),
            environment: Environment::default(),
            values: HashMap::new(),
            scopes: ScopeStack::new(),
        }
    }

    /// Walk `ast` from an empty state, offering every expression to `rewriter`
    pub fn run<R: ExpressionRewriter>(&mut self, ast: &mut Block, rewriter: &mut R) -> Result<()> {
        self.environment = Environment::default();
        self.values.clear();
        self.scopes = ScopeStack::new();
        self.visit_block(ast, rewriter)
    }

    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    /// Whether `name` is a variable visible at the current point
    pub fn in_scope(&self, name: &str) -> bool {
        self.scopes.in_scope(name)
    }

    /// Variable known to hold the content of `location` at `key`.
    ///
    /// Only answers when both variables are visible at the current point.
    pub fn location_value(&self, location: StoreLoadLocation, key: &str) -> Option<&str> {
        let value = self.environment.mapping(location).get(key)?;
        if self.in_scope(key) && self.in_scope(value) {
            Some(value.as_str())
        } else {
            None
        }
    }

    pub fn storage_value(&self, key: &str) -> Option<&str> {
        self.location_value(StoreLoadLocation::Storage, key)
    }

    pub fn memory_value(&self, key: &str) -> Option<&str> {
        self.location_value(StoreLoadLocation::Memory, key)
    }

    /// Literal value currently held by the variable `name`, if known
    pub fn value_of_identifier(&self, name: &str) -> Option<&Word> {
        if !self.in_scope(name) {
            return None;
        }
        self.values.get(name)
    }

    fn visit_block<R: ExpressionRewriter>(&mut self, block: &mut Block, rewriter: &mut R) -> Result<()> {
        self.scopes.push_scope();
        for statement in &mut block.statements {
            self.visit_statement(statement, rewriter)?;
        }
        self.leave_scope();
        Ok(())
    }

    fn leave_scope(&mut self) {
        let popped = self.scopes.pop_scope();
        if !popped.is_empty() {
            self.forget(&|name: &str| popped.contains(name));
        }
    }

    fn visit_statement<R: ExpressionRewriter>(&mut self, statement: &mut Statement, rewriter: &mut R) -> Result<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.visit_statement_inner(statement, rewriter)
        })
    }

    fn visit_statement_inner<R: ExpressionRewriter>(
        &mut self,
        statement: &mut Statement,
        rewriter: &mut R,
    ) -> Result<()> {
        match statement {
            Statement::ExpressionStatement(statement) => {
                if self.simple_store(&statement.expression)?.is_none() {
                    self.clear_if_invalidated(self.collector.expression(&statement.expression));
                }
                self.visit_expression(&mut statement.expression, rewriter)?;
                // Resolved arguments can turn a store into a simple one
                if let Some((location, key, value)) = self.simple_store(&statement.expression)? {
                    self.clear_location(location);
                    tracing::trace!(?location, %key, %value, "recording store");
                    self.environment.mapping_mut(location).insert(key, value);
                }
            }
            Statement::Assignment(assignment) => {
                self.clear_if_invalidated(self.collector.expression(&assignment.value));
                self.visit_expression(&mut assignment.value, rewriter)?;
                self.handle_assignment(&assignment.variable_names, Some(&*assignment.value), false);
            }
            Statement::VariableDeclaration(declaration) => {
                if let Some(value) = declaration.value.as_deref_mut() {
                    self.clear_if_invalidated(self.collector.expression(value));
                    self.visit_expression(value, rewriter)?;
                }
                self.handle_assignment(&declaration.variables, declaration.value.as_deref(), true);
            }
            Statement::FunctionDefinition(function) => self.visit_function(function, rewriter)?,
            Statement::If(if_statement) => self.visit_if(if_statement, rewriter)?,
            Statement::Switch(switch) => self.visit_switch(switch, rewriter)?,
            Statement::ForLoop(for_loop) => self.visit_for_loop(for_loop, rewriter)?,
            Statement::Block(block) => self.visit_block(block, rewriter)?,
            Statement::Break(_) | Statement::Continue(_) | Statement::Leave(_) => {}
        }
        Ok(())
    }

    fn visit_function<R: ExpressionRewriter>(
        &mut self,
        function: &mut FunctionDefinition,
        rewriter: &mut R,
    ) -> Result<()> {
        let saved_environment = std::mem::take(&mut self.environment);
        let saved_values = std::mem::take(&mut self.values);

        self.scopes.push_function_scope();
        for parameter in &function.parameters {
            self.scopes.declare(parameter.name.clone());
        }
        // Return variables start out zero
        for variable in &function.return_variables {
            self.scopes.declare(variable.name.clone());
            self.values.insert(variable.name.clone(), Word::zero());
        }
        let result = self.visit_block(&mut function.body, rewriter);
        self.scopes.pop_scope();

        self.environment = saved_environment;
        self.values = saved_values;
        result
    }

    fn visit_if<R: ExpressionRewriter>(&mut self, if_statement: &mut If, rewriter: &mut R) -> Result<()> {
        self.clear_if_invalidated(self.collector.expression(&if_statement.condition));
        self.visit_expression(&mut if_statement.condition, rewriter)?;

        let before = self.environment.clone();
        self.visit_block(&mut if_statement.body, rewriter)?;
        self.environment.join(&before);

        let assigned = assigned_variable_names(&if_statement.body);
        self.forget(&|name: &str| assigned.contains(name));
        Ok(())
    }

    fn visit_switch<R: ExpressionRewriter>(&mut self, switch: &mut Switch, rewriter: &mut R) -> Result<()> {
        self.clear_if_invalidated(self.collector.expression(&switch.expression));
        self.visit_expression(&mut switch.expression, rewriter)?;

        let before = self.environment.clone();
        let values_before = self.values.clone();
        // Without a default the pre-state is one of the exit states
        let mut joined = if switch.has_default() {
            None
        } else {
            Some(before.clone())
        };
        let mut assigned = BTreeSet::new();

        for case in &mut switch.cases {
            self.environment = before.clone();
            self.values = values_before.clone();
            self.visit_block(&mut case.body, rewriter)?;
            assigned.extend(assigned_variable_names(&case.body));
            joined = Some(match joined {
                None => self.environment.clone(),
                Some(mut state) => {
                    state.join(&self.environment);
                    state
                }
            });
        }

        self.environment = joined.unwrap_or(before);
        self.values = values_before;
        self.forget(&|name: &str| assigned.contains(name));
        Ok(())
    }

    fn visit_for_loop<R: ExpressionRewriter>(&mut self, for_loop: &mut ForLoop, rewriter: &mut R) -> Result<()> {
        // The init block shares the scope of the whole loop
        self.scopes.push_scope();
        let result = self.visit_for_loop_in_scope(for_loop, rewriter);
        self.leave_scope();
        result
    }

    fn visit_for_loop_in_scope<R: ExpressionRewriter>(
        &mut self,
        for_loop: &mut ForLoop,
        rewriter: &mut R,
    ) -> Result<()> {
        for statement in &mut for_loop.pre.statements {
            self.visit_statement(statement, rewriter)?;
        }

        let mut assigned = assigned_variable_names(&for_loop.body);
        assigned.extend(assigned_variable_names(&for_loop.post));
        let loop_effects = self.collector.expression(&for_loop.condition)
            | self.collector.block(&for_loop.body)
            | self.collector.block(&for_loop.post);

        self.forget(&|name: &str| assigned.contains(name));
        self.clear_if_invalidated(loop_effects);
        let head = self.environment.clone();

        self.visit_expression(&mut for_loop.condition, rewriter)?;
        self.visit_block(&mut for_loop.body, rewriter)?;

        self.forget(&|name: &str| assigned.contains(name));
        self.clear_if_invalidated(loop_effects);
        self.visit_block(&mut for_loop.post, rewriter)?;

        self.forget(&|name: &str| assigned.contains(name));
        self.clear_if_invalidated(loop_effects);
        self.environment.join(&head);
        Ok(())
    }

    fn visit_expression<R: ExpressionRewriter>(&mut self, expression: &mut Expression, rewriter: &mut R) -> Result<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            if let Expression::FunctionCall(call) = expression {
                // Evaluation order is right to left
                for argument in call.arguments.iter_mut().rev() {
                    self.visit_expression(argument, rewriter)?;
                }
            }
            rewriter.rewrite(self, expression)
        })
    }

    /// Recognise `store(key, value)` with two plain variable arguments
    fn simple_store(&self, expression: &Expression) -> Result<Option<(StoreLoadLocation, String, String)>> {
        let Expression::FunctionCall(call) = expression else {
            return Ok(None);
        };
        let Some(BuiltinRole::Store(location)) = self.dialect.role_of(call.name()) else {
            return Ok(None);
        };
        let [key, value] = call.arguments.as_slice() else {
            return Err(CompileError::precondition(
                format!(
                    "`{}` expects a key and a value, found {} argument(s)",
                    call.name(),
                    call.arguments.len()
                ),
                call.location,
            ));
        };
        match (key.as_identifier(), value.as_identifier()) {
            (Some(key), Some(value)) => Ok(Some((location, key.to_string(), value.to_string()))),
            _ => Ok(None),
        }
    }

    fn handle_assignment(&mut self, variables: &[Identifier], value: Option<&Expression>, is_declaration: bool) {
        if is_declaration {
            for variable in variables {
                self.scopes.declare(variable.name.clone());
            }
        }

        let known = match (variables, value) {
            (_, None) => Some(Word::zero()),
            ([_], Some(Expression::Literal(literal))) => Some(literal.value.clone()),
            ([_], Some(Expression::Identifier(identifier))) => self.value_of_identifier(&identifier.name).cloned(),
            _ => None,
        };

        let names: BTreeSet<&str> = variables.iter().map(|variable| variable.name.as_str()).collect();
        self.forget(&|name: &str| names.contains(name));

        if let Some(known) = known {
            for variable in variables {
                self.values.insert(variable.name.clone(), known.clone());
            }
        }
    }

    fn forget(&mut self, is_forgotten: &impl Fn(&str) -> bool) {
        self.values.retain(|name, _| !is_forgotten(name.as_str()));
        self.environment.forget(is_forgotten);
    }

    fn clear_if_invalidated(&mut self, effects: SideEffects) {
        for location in [StoreLoadLocation::Storage, StoreLoadLocation::Memory] {
            if effects.invalidates(location) {
                self.clear_location(location);
            }
        }
    }

    fn clear_location(&mut self, location: StoreLoadLocation) {
        let mapping = self.environment.mapping_mut(location);
        if !mapping.is_empty() {
            tracing::trace!(?location, entries = mapping.len(), "clearing known contents");
            mapping.clear();
        }
    }
}
