//! Call graph and transitive side-effect propagation

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Block, Statement};
use crate::dialect::{Dialect, SideEffects};
use crate::{STACK_GROW_SIZE, STACK_RED_ZONE};

use super::for_each_call_in_block;

/// Which names each user-defined function calls directly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    /// Function name -> names of called functions (builtins included)
    pub function_calls: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    /// Collect the direct calls of every function defined anywhere in `ast`.
    ///
    /// Calls inside a nested function definition belong to that function,
    /// not to the enclosing one.
    pub fn generate(ast: &Block) -> Self {
        let mut graph = CallGraph::default();
        graph.collect_definitions(ast);
        graph
    }

    fn collect_definitions(&mut self, block: &Block) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.collect_definitions_inner(block))
    }

    fn collect_definitions_inner(&mut self, block: &Block) {
        for statement in &block.statements {
            match statement {
                Statement::FunctionDefinition(function) => {
                    let callees = self.function_calls.entry(function.name.clone()).or_default();
                    for_each_call_in_block(&function.body, &mut |call| {
                        callees.insert(call.name().to_string());
                    });
                    self.collect_definitions(&function.body);
                }
                Statement::Block(inner) => self.collect_definitions(inner),
                Statement::If(if_statement) => self.collect_definitions(&if_statement.body),
                Statement::Switch(switch) => {
                    for case in &switch.cases {
                        self.collect_definitions(&case.body);
                    }
                }
                Statement::ForLoop(for_loop) => {
                    self.collect_definitions(&for_loop.pre);
                    self.collect_definitions(&for_loop.post);
                    self.collect_definitions(&for_loop.body);
                }
                _ => {}
            }
        }
    }

    /// Every name reachable from `function` through the graph, itself excluded
    /// unless it is recursive.
    pub fn reachable_from(&self, function: &str) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut worklist: Vec<&str> = vec![function];
        while let Some(current) = worklist.pop() {
            let Some(callees) = self.function_calls.get(current) else {
                continue;
            };
            for callee in callees {
                if reached.insert(callee.clone()) {
                    worklist.push(callee);
                }
            }
        }
        reached
    }
}

/// Aggregates builtin effects through the call graph
pub struct SideEffectsPropagator;

impl SideEffectsPropagator {
    /// One effect summary per user-defined function.
    ///
    /// A function's summary is the union of the effects of every builtin it
    /// may reach. Reaching a name that is neither a builtin nor a defined
    /// function yields `SideEffects::worst()`.
    pub fn side_effects(dialect: &dyn Dialect, call_graph: &CallGraph) -> BTreeMap<String, SideEffects> {
        call_graph
            .function_calls
            .keys()
            .map(|function| {
                let mut effects = SideEffects::none();
                for callee in call_graph.reachable_from(function) {
                    if let Some(builtin_effects) = dialect.effects_of(&callee) {
                        effects |= builtin_effects;
                    } else if !call_graph.function_calls.contains_key(&callee) {
                        effects |= SideEffects::worst();
                    }
                }
                (function.clone(), effects)
            })
            .collect()
    }
}

/// Detects whether a program can observe the memory extent
pub struct MSizeFinder;

impl MSizeFinder {
    /// True iff any call anywhere in `ast`, reachable or not, targets the
    /// dialect's memory-size query.
    pub fn contains_msize(dialect: &dyn Dialect, ast: &Block) -> bool {
        let mut found = false;
        for_each_call_in_block(ast, &mut |call| {
            found |= dialect.is_memory_size_query(call.name());
        });
        found || contains_msize_in_definitions(dialect, ast)
    }
}

fn contains_msize_in_definitions(dialect: &dyn Dialect, block: &Block) -> bool {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        block.statements.iter().any(|statement| match statement {
            Statement::FunctionDefinition(function) => MSizeFinder::contains_msize(dialect, &function.body),
            Statement::Block(inner) => contains_msize_in_definitions(dialect, inner),
            Statement::If(if_statement) => contains_msize_in_definitions(dialect, &if_statement.body),
            Statement::Switch(switch) => switch
                .cases
                .iter()
                .any(|case| contains_msize_in_definitions(dialect, &case.body)),
            Statement::ForLoop(for_loop) => [&for_loop.pre, &for_loop.post, &for_loop.body]
                .into_iter()
                .any(|inner| contains_msize_in_definitions(dialect, inner)),
            _ => false,
        })
    })
}
