//! Optimizer steps over the tree IR
//!
//! Steps implement `OptimizerStep` and are driven by an
//! `OptimizationPipeline`, which repeats its steps until none of them
//! changes the program (or the iteration limit is hit).
//!
//! # Available Steps
//!
//! - `LoadResolver`: replaces redundant `sload`/`mload` calls with the
//!   variable known to hold the loaded value, and folds single-word
//!   `keccak256` calls over known memory into literals.

mod load_resolver;

pub use load_resolver::{LoadResolver, LoadResolverStep, ResolveStats};

use std::collections::HashMap;

use crate::ast::Block;
use crate::config::OptimizerSettings;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::gas::CostModel;

/// Everything a step needs to know about the run besides the program
#[derive(Clone)]
pub struct OptimizerStepContext<'a> {
    pub dialect: &'a dyn Dialect,
    /// How often the code is expected to run per deployment; `None` means
    /// the code runs once, at deployment.
    pub expected_executions_per_deployment: Option<u64>,
    pub cost_model: CostModel,
    /// Memory loads may be resolved at all (still subject to the
    /// memory-size check of each run)
    pub optimize_memory_loads: bool,
}

impl<'a> OptimizerStepContext<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            expected_executions_per_deployment: None,
            cost_model: CostModel::default(),
            optimize_memory_loads: true,
        }
    }

    pub fn from_settings(dialect: &'a dyn Dialect, settings: &OptimizerSettings) -> Self {
        Self {
            dialect,
            expected_executions_per_deployment: settings.expected_executions_per_deployment,
            cost_model: settings.cost_model.clone(),
            optimize_memory_loads: settings.optimize_memory_loads,
        }
    }
}

/// Trait for optimization steps
pub trait OptimizerStep {
    /// Name of the step
    fn name(&self) -> &'static str;

    /// Run the step on a whole program.
    /// Returns true if any changes were made
    fn run(&self, context: &OptimizerStepContext<'_>, ast: &mut Block) -> Result<bool>;
}

/// Optimization pipeline
pub struct OptimizationPipeline {
    steps: Vec<Box<dyn OptimizerStep>>,
    max_iterations: usize,
}

impl OptimizationPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            max_iterations: 10,
        }
    }

    /// The default step sequence
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_step(Box::new(LoadResolverStep));
        pipeline
    }

    /// Default step sequence with the iteration limit from `settings`
    pub fn from_settings(settings: &OptimizerSettings) -> Self {
        let mut pipeline = Self::standard();
        pipeline.set_max_iterations(settings.max_iterations);
        pipeline
    }

    /// Add an optimization step
    pub fn add_step(&mut self, step: Box<dyn OptimizerStep>) {
        self.steps.push(step);
    }

    /// Set maximum iterations for fixed-point optimization
    pub fn set_max_iterations(&mut self, n: usize) {
        self.max_iterations = n;
    }

    /// Run all steps on a program until fixed point.
    ///
    /// On error the program may be partially rewritten and must be discarded.
    pub fn optimize(&self, context: &OptimizerStepContext<'_>, ast: &mut Block) -> Result<OptimizationStats> {
        let mut stats = OptimizationStats::new();
        let mut iteration = 0;

        while iteration < self.max_iterations {
            let mut changed = false;
            iteration += 1;

            for step in &self.steps {
                if step.run(context, ast)? {
                    changed = true;
                    stats.record_step(step.name());
                }
            }

            if !changed {
                break;
            }
        }

        stats.iterations = iteration;
        tracing::debug!(iterations = iteration, "optimization finished");
        Ok(stats)
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics from optimization steps
#[derive(Debug, Default)]
pub struct OptimizationStats {
    /// Number of iterations run
    pub iterations: usize,
    /// Number of iterations in which each step changed the program
    pub step_counts: HashMap<String, usize>,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, name: &str) {
        *self.step_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &OptimizationStats) {
        self.iterations += other.iterations;
        for (name, count) in &other.step_counts {
            *self.step_counts.entry(name.clone()).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::EvmDialect;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn parse_ok(source: &str) -> Block {
        let tokens = tokenize(source).expect("tokenize");
        parse("test.yul", source, tokens).expect("parse")
    }

    /// Changes the program a fixed number of times
    struct CountDown {
        remaining: std::cell::Cell<usize>,
    }

    impl OptimizerStep for CountDown {
        fn name(&self) -> &'static str {
            "count_down"
        }

        fn run(&self, _context: &OptimizerStepContext<'_>, _ast: &mut Block) -> Result<bool> {
            let remaining = self.remaining.get();
            if remaining == 0 {
                return Ok(false);
            }
            self.remaining.set(remaining - 1);
            Ok(true)
        }
    }

    #[test]
    fn test_pipeline_reaches_fixed_point() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext::new(&dialect);
        let mut pipeline = OptimizationPipeline::new();
        pipeline.add_step(Box::new(CountDown {
            remaining: std::cell::Cell::new(3),
        }));
        let mut ast = parse_ok("{ }");
        let stats = pipeline.optimize(&context, &mut ast).unwrap();
        assert_eq!(stats.iterations, 4);
        assert_eq!(stats.step_counts["count_down"], 3);
    }

    #[test]
    fn test_pipeline_respects_max_iterations() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext::new(&dialect);
        let mut pipeline = OptimizationPipeline::new();
        pipeline.set_max_iterations(2);
        pipeline.add_step(Box::new(CountDown {
            remaining: std::cell::Cell::new(10),
        }));
        let mut ast = parse_ok("{ }");
        let stats = pipeline.optimize(&context, &mut ast).unwrap();
        assert_eq!(stats.iterations, 2);
        assert_eq!(stats.step_counts["count_down"], 2);
    }

    #[test]
    fn test_standard_pipeline_resolves_loads() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext::new(&dialect);
        let mut ast = parse_ok("{ let k := 0 let v := 42 sstore(k, v) let x := sload(k) }");
        let stats = OptimizationPipeline::standard().optimize(&context, &mut ast).unwrap();
        assert_eq!(stats.step_counts["load_resolver"], 1);
        assert_eq!(stats.iterations, 2);
        assert!(ast.to_string().contains("let x := v"));
    }

    #[test]
    fn test_context_from_settings() {
        let dialect = EvmDialect::new();
        let settings = OptimizerSettings {
            expected_executions_per_deployment: Some(200),
            optimize_memory_loads: false,
            ..OptimizerSettings::default()
        };
        let context = OptimizerStepContext::from_settings(&dialect, &settings);
        assert_eq!(context.expected_executions_per_deployment, Some(200));
        assert!(!context.optimize_memory_loads);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = OptimizationStats::new();
        a.record_step("x");
        let mut b = OptimizationStats::new();
        b.record_step("x");
        b.record_step("y");
        b.iterations = 2;
        a.merge(&b);
        assert_eq!(a.step_counts["x"], 2);
        assert_eq!(a.step_counts["y"], 1);
        assert_eq!(a.iterations, 2);
    }
}
