//! Redundant load elimination and hash folding
//!
//! Built on the data-flow analyzer: every call expression is inspected
//! after its arguments have been rewritten.
//!
//! - `sload(k)` / `mload(k)` where the analyzer knows `k` holds the value
//!   of variable `v` becomes `v`.
//! - `keccak256(p, n)` where memory at `p` holds a known word and `n` is a
//!   known length of at most one word becomes the literal digest, provided
//!   the cost model says the larger literal pays for itself.
//!
//! Memory loads are left alone in programs that query `msize` anywhere:
//! removing a load may lower the memory high-water mark and change what
//! `msize` reports.

use std::collections::BTreeMap;

use num_traits::ToPrimitive;
use sha3::{Digest, Keccak256};

use crate::ast::{from_big_endian, to_big_endian, Block, Expression, FunctionCall, Identifier, Literal, WORD_SIZE};
use crate::dataflow::{DataFlowAnalyzer, ExpressionRewriter};
use crate::dialect::{BuiltinRole, Dialect, SideEffects, StoreLoadLocation};
use crate::error::{CompileError, Result};
use crate::gas::CostModel;
use crate::semantics::{CallGraph, MSizeFinder, SideEffectsPropagator};

use super::{OptimizerStep, OptimizerStepContext};

/// What a single run rewrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub loads_resolved: usize,
    pub hashes_folded: usize,
}

impl ResolveStats {
    pub fn changed(&self) -> bool {
        self.loads_resolved + self.hashes_folded > 0
    }
}

/// One forward walk resolving loads and folding hashes
pub struct LoadResolver<'a> {
    dialect: &'a dyn Dialect,
    function_side_effects: &'a BTreeMap<String, SideEffects>,
    optimize_memory_loads: bool,
    expected_executions_per_deployment: Option<u64>,
    cost_model: CostModel,
}

impl<'a> LoadResolver<'a> {
    /// `contains_msize` disables memory-load resolution for the whole run.
    pub fn new(
        dialect: &'a dyn Dialect,
        function_side_effects: &'a BTreeMap<String, SideEffects>,
        contains_msize: bool,
        expected_executions_per_deployment: Option<u64>,
    ) -> Self {
        Self {
            dialect,
            function_side_effects,
            optimize_memory_loads: !contains_msize,
            expected_executions_per_deployment,
            cost_model: CostModel::default(),
        }
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Further restrict memory-load resolution; never re-enables it
    pub fn with_memory_loads(mut self, enabled: bool) -> Self {
        self.optimize_memory_loads &= enabled;
        self
    }

    /// Analyse the program and run the resolver with the derived facts
    pub fn run(context: &OptimizerStepContext<'_>, ast: &mut Block) -> Result<ResolveStats> {
        let call_graph = CallGraph::generate(ast);
        let function_side_effects = SideEffectsPropagator::side_effects(context.dialect, &call_graph);
        let contains_msize = MSizeFinder::contains_msize(context.dialect, ast);

        LoadResolver::new(
            context.dialect,
            &function_side_effects,
            contains_msize,
            context.expected_executions_per_deployment,
        )
        .with_cost_model(context.cost_model.clone())
        .with_memory_loads(context.optimize_memory_loads)
        .resolve(ast)
    }

    /// Rewrite `ast` in place.
    ///
    /// On error the tree may be partially rewritten and must be discarded.
    pub fn resolve(&self, ast: &mut Block) -> Result<ResolveStats> {
        let mut analyzer = DataFlowAnalyzer::new(self.dialect, self.function_side_effects);
        let mut rewriter = Rewriter {
            resolver: self,
            stats: ResolveStats::default(),
        };
        analyzer.run(ast, &mut rewriter)?;
        Ok(rewriter.stats)
    }
}

struct Rewriter<'r, 'a> {
    resolver: &'r LoadResolver<'a>,
    stats: ResolveStats,
}

impl ExpressionRewriter for Rewriter<'_, '_> {
    fn rewrite(&mut self, analyzer: &DataFlowAnalyzer<'_>, expression: &mut Expression) -> Result<()> {
        let Expression::FunctionCall(call) = expression else {
            return Ok(());
        };
        let replacement = match self.resolver.dialect.role_of(call.name()) {
            Some(BuiltinRole::Load(location)) => self.resolve_load(analyzer, location, call),
            Some(BuiltinRole::HashOfMemory) => self.fold_hash(analyzer, call)?,
            _ => None,
        };
        if let Some(replacement) = replacement {
            *expression = replacement;
        }
        Ok(())
    }
}

impl Rewriter<'_, '_> {
    fn resolve_load(
        &mut self,
        analyzer: &DataFlowAnalyzer<'_>,
        location: StoreLoadLocation,
        call: &FunctionCall,
    ) -> Option<Expression> {
        if location == StoreLoadLocation::Memory && !self.resolver.optimize_memory_loads {
            return None;
        }
        let [key] = call.arguments.as_slice() else {
            return None;
        };
        let key = key.as_identifier()?;
        let value = analyzer.location_value(location, key)?;

        tracing::debug!(load = call.name(), key, value, location = %call.location, "resolved redundant load");
        self.stats.loads_resolved += 1;
        Some(Expression::Identifier(Identifier::new(call.location, value)))
    }

    fn fold_hash(&mut self, analyzer: &DataFlowAnalyzer<'_>, call: &FunctionCall) -> Result<Option<Expression>> {
        let [offset, length] = call.arguments.as_slice() else {
            return Err(CompileError::precondition(
                format!(
                    "`{}` expects an offset and a length, found {} argument(s)",
                    call.name(),
                    call.arguments.len()
                ),
                call.location,
            ));
        };

        let resolver = self.resolver;
        if !resolver
            .cost_model
            .hash_fold_profitable(resolver.expected_executions_per_deployment)
        {
            return Ok(None);
        }

        let (Some(offset), Some(length)) = (offset.as_identifier(), length.as_identifier()) else {
            return Ok(None);
        };
        let Some(content) = analyzer
            .memory_value(offset)
            .and_then(|variable| analyzer.value_of_identifier(variable))
        else {
            return Ok(None);
        };
        let Some(length) = analyzer
            .value_of_identifier(length)
            .and_then(|length| length.to_usize())
            .filter(|length| *length <= WORD_SIZE)
        else {
            return Ok(None);
        };

        let bytes = to_big_endian(content);
        let digest = Keccak256::digest(&bytes[..length]);
        let digest = from_big_endian(digest.as_slice());

        tracing::debug!(length, digest = %digest, location = %call.location, "folded memory hash");
        self.stats.hashes_folded += 1;
        Ok(Some(Expression::Literal(Literal::number(call.location, digest))))
    }
}

/// Pipeline adapter for `LoadResolver`
pub struct LoadResolverStep;

impl OptimizerStep for LoadResolverStep {
    fn name(&self) -> &'static str {
        "load_resolver"
    }

    fn run(&self, context: &OptimizerStepContext<'_>, ast: &mut Block) -> Result<bool> {
        let stats = LoadResolver::run(context, ast)?;
        Ok(stats.changed())
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

    fn run_with(context: &OptimizerStepContext<'_>, source: &str) -> (Block, ResolveStats) {
        let mut ast = parse_ok(source);
        let stats = LoadResolver::run(context, &mut ast).expect("resolve");
        (ast, stats)
    }

    /// Run with the default context and compare against `expected`
    fn check(source: &str, expected: &str) {
        let dialect = EvmDialect::new();
        check_with(&OptimizerStepContext::new(&dialect), source, expected);
    }

    fn check_with(context: &OptimizerStepContext<'_>, source: &str, expected: &str) {
        let (ast, _) = run_with(context, source);
        assert_eq!(ast.to_string(), parse_ok(expected).to_string());
    }

    fn check_unchanged(source: &str) {
        check(source, source);
    }

    fn flat_rate(per_byte: u64) -> CostModel {
        CostModel {
            creation_byte_cost: per_byte,
            runtime_byte_cost: per_byte,
            ..CostModel::default()
        }
    }

    /// Context under which folding is always profitable
    fn hashing_context(dialect: &dyn Dialect) -> OptimizerStepContext<'_> {
        OptimizerStepContext {
            expected_executions_per_deployment: Some(200),
            ..OptimizerStepContext::new(dialect)
        }
    }

    const WORD_1122: &str = "0x1122000000000000000000000000000000000000000000000000000000000000";
    /// keccak256([0x11, 0x22])
    const DIGEST_1122: &str = "51998260772062457940093703696955794678920145804098884997223238988845174528640";
    /// keccak256 of the empty input
    const DIGEST_EMPTY: &str = "89477152217924674838424037953991966239322087453347756267410168184682657981552";
    /// keccak256 of 32 zero bytes
    const DIGEST_ZERO_WORD: &str = "18569430475105882587588266137607568536673111973893317399460219858819262702947";

    #[test]
    fn test_storage_load_after_store() {
        check(
            "{ let k := 0 let v := 0x2a sstore(k, v) let x := sload(k) }",
            "{ let k := 0 let v := 0x2a sstore(k, v) let x := v }",
        );
    }

    #[test]
    fn test_nested_load_is_resolved() {
        check(
            "{ let k := calldataload(0) let v := calldataload(32) sstore(k, v) let y := add(sload(k), 1) }",
            "{ let k := calldataload(0) let v := calldataload(32) sstore(k, v) let y := add(v, 1) }",
        );
    }

    #[test]
    fn test_resolved_inside_function() {
        check(
            "{ function f(k, v) -> r { sstore(k, v) r := sload(k) } }",
            "{ function f(k, v) -> r { sstore(k, v) r := v } }",
        );
    }

    #[test]
    fn test_value_out_of_scope() {
        check_unchanged("{ let k := 0 { let v := 1 sstore(k, v) } let x := sload(k) }");
    }

    #[test]
    fn test_computed_key_is_not_resolved() {
        check_unchanged("{ let k := 0 let v := 1 sstore(k, v) let x := sload(add(k, 0)) }");
    }

    #[test]
    fn test_builtin_write_invalidates() {
        check_unchanged(
            "{ let k := 0 let v := 1 sstore(k, v) pop(call(gas(), 0, 0, 0, 0, 0, 0)) let x := sload(k) }",
        );
    }

    #[test]
    fn test_store_to_other_key_invalidates() {
        check_unchanged("{ let k := 0 let j := 1 let v := 1 sstore(k, v) sstore(j, v) let x := sload(k) }");
    }

    #[test]
    fn test_user_function_write_invalidates() {
        check_unchanged(
            "{ function f() { g() } function g() { sstore(0, 0) } \
               let k := 0 let v := 1 sstore(k, v) f() let x := sload(k) }",
        );
    }

    #[test]
    fn test_user_function_without_storage_write_keeps_facts() {
        check(
            "{ function f() { mstore(0, 0) } let k := 0 let v := 1 sstore(k, v) f() let x := sload(k) }",
            "{ function f() { mstore(0, 0) } let k := 0 let v := 1 sstore(k, v) f() let x := v }",
        );
    }

    #[test]
    fn test_memory_load_after_store() {
        check(
            "{ let p := 0 let v := 1 mstore(p, v) let x := mload(p) }",
            "{ let p := 0 let v := 1 mstore(p, v) let x := v }",
        );
    }

    #[test]
    fn test_msize_anywhere_disables_memory_loads() {
        check_unchanged(
            "{ let p := 0 let v := 1 mstore(p, v) let x := mload(p) \
               function never_called() { pop(msize()) } }",
        );
    }

    #[test]
    fn test_msize_does_not_affect_storage_loads() {
        check(
            "{ let k := 0 let v := 1 sstore(k, v) let x := sload(k) pop(msize()) }",
            "{ let k := 0 let v := 1 sstore(k, v) let x := v pop(msize()) }",
        );
    }

    #[test]
    fn test_settings_disable_memory_loads() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext {
            optimize_memory_loads: false,
            ..OptimizerStepContext::new(&dialect)
        };
        check_with(
            &context,
            "{ let p := 0 let v := 1 mstore(p, v) let x := mload(p) }",
            "{ let p := 0 let v := 1 mstore(p, v) let x := mload(p) }",
        );
    }

    #[test]
    fn test_with_memory_loads_never_reenables() {
        let dialect = EvmDialect::new();
        let summary = BTreeMap::new();
        let mut ast = parse_ok("{ let p := 0 let v := 1 mstore(p, v) let x := mload(p) }");
        let stats = LoadResolver::new(&dialect, &summary, true, None)
            .with_memory_loads(true)
            .resolve(&mut ast)
            .unwrap();
        assert_eq!(stats, ResolveStats::default());
    }

    #[test]
    fn test_hash_folding() {
        let dialect = EvmDialect::new();
        let source = format!("{{ let p := 0 let v := {WORD_1122} mstore(p, v) let n := 2 let h := keccak256(p, n) }}");
        let expected = format!("{{ let p := 0 let v := {WORD_1122} mstore(p, v) let n := 2 let h := {DIGEST_1122} }}");
        let (ast, stats) = run_with(&hashing_context(&dialect), &source);
        assert_eq!(ast.to_string(), parse_ok(&expected).to_string());
        assert_eq!(stats.hashes_folded, 1);
    }

    #[test]
    fn test_hash_of_full_word() {
        let dialect = EvmDialect::new();
        check_with(
            &hashing_context(&dialect),
            "{ let p := 0 let v := 0 mstore(p, v) let n := 32 let h := keccak256(p, n) }",
            &format!("{{ let p := 0 let v := 0 mstore(p, v) let n := 32 let h := {DIGEST_ZERO_WORD} }}"),
        );
    }

    #[test]
    fn test_hash_of_empty_range() {
        let dialect = EvmDialect::new();
        check_with(
            &hashing_context(&dialect),
            "{ let p := 0 let v := 7 mstore(p, v) let n := 0 let h := keccak256(p, n) }",
            &format!("{{ let p := 0 let v := 7 mstore(p, v) let n := 0 let h := {DIGEST_EMPTY} }}"),
        );
    }

    #[test]
    fn test_hash_longer_than_word_is_kept() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := 7 mstore(p, v) let n := 33 let h := keccak256(p, n) }";
        check_with(&hashing_context(&dialect), source, source);
    }

    #[test]
    fn test_hash_with_literal_arguments_is_kept() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := 7 mstore(p, v) let h := keccak256(p, 2) }";
        check_with(&hashing_context(&dialect), source, source);
    }

    #[test]
    fn test_hash_of_unknown_content_is_kept() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := calldataload(0) mstore(p, v) let n := 2 let h := keccak256(p, n) }";
        check_with(&hashing_context(&dialect), source, source);
    }

    #[test]
    fn test_hash_of_unknown_length_is_kept() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := 7 mstore(p, v) let n := calldatasize() let h := keccak256(p, n) }";
        check_with(&hashing_context(&dialect), source, source);
    }

    #[test]
    fn test_hash_after_memory_write_is_kept() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := 7 mstore(p, v) calldatacopy(0, 0, 32) let n := 2 let h := keccak256(p, n) }";
        check_with(&hashing_context(&dialect), source, source);
    }

    #[test]
    fn test_hash_folding_is_not_gated_by_msize() {
        let dialect = EvmDialect::new();
        let (_, stats) = run_with(
            &hashing_context(&dialect),
            "{ let p := 0 let v := 7 mstore(p, v) let n := 2 let h := keccak256(p, n) pop(msize()) }",
        );
        assert_eq!(stats.hashes_folded, 1);
    }

    #[test]
    fn test_default_model_without_hint_keeps_hash() {
        check_unchanged("{ let p := 0 let v := 7 mstore(p, v) let n := 2 let h := keccak256(p, n) }");
    }

    #[test]
    fn test_profitability_threshold() {
        let dialect = EvmDialect::new();
        let source = "{ let p := 0 let v := 7 mstore(p, v) let n := 2 let h := keccak256(p, n) }";
        let folds = |cost_model: CostModel, hint: Option<u64>| {
            let context = OptimizerStepContext {
                cost_model,
                expected_executions_per_deployment: hint,
                ..OptimizerStepContext::new(&dialect)
            };
            run_with(&context, source).1.hashes_folded == 1
        };
        // 39 >= 28
        assert!(folds(flat_rate(1), None));
        // 39 < 56
        assert!(!folds(flat_rate(2), None));
        // 5 * 39 >= 56
        assert!(folds(flat_rate(2), Some(5)));
        // 5 * 39 < 196
        assert!(!folds(flat_rate(7), Some(5)));
    }

    #[test]
    fn test_hash_with_wrong_arity_is_error() {
        let dialect = EvmDialect::new();
        let mut ast = parse_ok("{ let p := 0 let h := keccak256(p) }");
        let err = LoadResolver::run(&OptimizerStepContext::new(&dialect), &mut ast).unwrap_err();
        assert!(matches!(err, CompileError::Precondition { .. }));
        assert!(err.message().contains("keccak256"));
    }

    #[test]
    fn test_idempotent() {
        let dialect = EvmDialect::new();
        let context = hashing_context(&dialect);
        let source = format!(
            "{{ let k := 0 let v := 1 sstore(k, v) let x := sload(k) \
               let p := 0 let w := {WORD_1122} mstore(p, w) let n := 2 let h := keccak256(p, n) }}"
        );
        let (mut ast, first) = run_with(&context, &source);
        assert_eq!(
            first,
            ResolveStats {
                loads_resolved: 1,
                hashes_folded: 1
            }
        );
        let once = ast.clone();
        let second = LoadResolver::run(&context, &mut ast).unwrap();
        assert!(!second.changed());
        assert_eq!(ast, once);
    }

    #[test]
    fn test_store_of_resolved_load_is_recorded() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext::new(&dialect);
        let (mut ast, first) = run_with(
            &context,
            "{ let k := 0 let v := 1 sstore(k, v) let p := 0 mstore(p, sload(k)) let y := mload(p) }",
        );
        assert_eq!(first.loads_resolved, 2);
        assert_eq!(
            ast.to_string(),
            parse_ok("{ let k := 0 let v := 1 sstore(k, v) let p := 0 mstore(p, v) let y := v }").to_string()
        );

        let second = LoadResolver::run(&context, &mut ast).unwrap();
        assert!(!second.changed(), "second run rewrote {second:?}");
    }

    #[test]
    fn test_step_reports_change() {
        let dialect = EvmDialect::new();
        let context = OptimizerStepContext::new(&dialect);
        let mut ast = parse_ok("{ let k := 0 let v := 1 sstore(k, v) let x := sload(k) }");
        assert!(LoadResolverStep.run(&context, &mut ast).unwrap());
        assert!(!LoadResolverStep.run(&context, &mut ast).unwrap());
    }
}
