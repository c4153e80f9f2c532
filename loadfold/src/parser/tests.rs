//! Parser tests for the surface syntax

use crate::ast::{Block, Expression, LiteralKind, Statement, Word};
use crate::lexer::tokenize;
use crate::parser::parse;

/// Helper to parse a program and return the tree
fn parse_program(source: &str) -> crate::Result<Block> {
    let tokens = tokenize(source)?;
    parse("test.yul", source, tokens)
}

/// Helper to parse and expect success
fn parse_ok(source: &str) -> Block {
    parse_program(source).expect("Parse should succeed")
}

/// Helper to check if parsing fails
fn parse_fails(source: &str) -> bool {
    parse_program(source).is_err()
}

// ============================================
// Statements
// ============================================

#[test]
fn test_parse_empty_program() {
    let block = parse_ok("{ }");
    assert!(block.statements.is_empty());
}

#[test]
fn test_parse_variable_declaration() {
    let block = parse_ok("{ let x := 0x2a }");
    if let Statement::VariableDeclaration(declaration) = &block.statements[0] {
        assert_eq!(declaration.variables[0].name, "x");
        if let Some(Expression::Literal(literal)) = declaration.value.as_deref() {
            assert_eq!(literal.value, Word::from(42u32));
            assert_eq!(literal.kind, LiteralKind::Number);
        } else {
            panic!("Expected literal value");
        }
    } else {
        panic!("Expected VariableDeclaration");
    }
}

#[test]
fn test_parse_declaration_without_value() {
    let block = parse_ok("{ let a, b }");
    if let Statement::VariableDeclaration(declaration) = &block.statements[0] {
        assert_eq!(declaration.variables.len(), 2);
        assert!(declaration.value.is_none());
    } else {
        panic!("Expected VariableDeclaration");
    }
}

#[test]
fn test_parse_multi_assignment() {
    let block = parse_ok("{ let a, b := f() a, b := f() }");
    if let Statement::Assignment(assignment) = &block.statements[1] {
        let names: Vec<_> = assignment.variable_names.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    } else {
        panic!("Expected Assignment");
    }
}

#[test]
fn test_parse_expression_statement() {
    let block = parse_ok("{ sstore(0, calldataload(4)) }");
    if let Statement::ExpressionStatement(statement) = &block.statements[0] {
        if let Expression::FunctionCall(call) = &statement.expression {
            assert_eq!(call.name(), "sstore");
            assert_eq!(call.arguments.len(), 2);
            assert!(matches!(call.arguments[1], Expression::FunctionCall(_)));
        } else {
            panic!("Expected FunctionCall");
        }
    } else {
        panic!("Expected ExpressionStatement");
    }
}

#[test]
fn test_parse_function_definition() {
    let block = parse_ok("{ function f(a, b) -> r { r := add(a, b) } }");
    if let Statement::FunctionDefinition(function) = &block.statements[0] {
        assert_eq!(function.name, "f");
        assert_eq!(function.parameters.len(), 2);
        assert_eq!(function.return_variables[0].name, "r");
        assert_eq!(function.body.statements.len(), 1);
    } else {
        panic!("Expected FunctionDefinition");
    }
}

#[test]
fn test_parse_control_flow() {
    let block = parse_ok(
        "{ if lt(1, 2) { leave } \
           switch x case 0 { break } case \"a\" { continue } default { } \
           for { let i := 0 } lt(i, 3) { i := add(i, 1) } { } }",
    );
    assert!(matches!(block.statements[0], Statement::If(_)));
    if let Statement::Switch(switch) = &block.statements[1] {
        assert_eq!(switch.cases.len(), 3);
        assert!(switch.has_default());
        assert_eq!(
            switch.cases[1].value.as_ref().map(|literal| literal.kind),
            Some(LiteralKind::String)
        );
    } else {
        panic!("Expected Switch");
    }
    if let Statement::ForLoop(for_loop) = &block.statements[2] {
        assert_eq!(for_loop.pre.statements.len(), 1);
        assert_eq!(for_loop.post.statements.len(), 1);
    } else {
        panic!("Expected ForLoop");
    }
}

#[test]
fn test_parse_boolean_literals() {
    let block = parse_ok("{ let t := true let f := false }");
    for (statement, expected) in block.statements.iter().zip([1u32, 0u32]) {
        if let Statement::VariableDeclaration(declaration) = statement {
            if let Some(Expression::Literal(literal)) = declaration.value.as_deref() {
                assert_eq!(literal.kind, LiteralKind::Boolean);
                assert_eq!(literal.value, Word::from(expected));
                continue;
            }
        }
        panic!("Expected boolean declaration");
    }
}

// ============================================
// Errors
// ============================================

#[test]
fn test_parse_rejects_bare_identifier_statement() {
    assert!(parse_fails("{ x }"));
}

#[test]
fn test_parse_rejects_unterminated_block() {
    assert!(parse_fails("{ let x := 1"));
}

#[test]
fn test_parse_rejects_trailing_tokens() {
    assert!(parse_fails("{ } { }"));
}

#[test]
fn test_parse_rejects_oversized_number() {
    let source = format!("{{ let x := 0x1{} }}", "0".repeat(64));
    assert!(parse_fails(&source));
}

#[test]
fn test_parse_rejects_long_string() {
    let source = format!("{{ let s := \"{}\" }}", "a".repeat(33));
    assert!(parse_fails(&source));
}

#[test]
fn test_parse_rejects_non_literal_case() {
    assert!(parse_fails("{ switch x case y { } }"));
}

#[test]
fn test_parse_error_span_points_at_token() {
    let error = parse_program("{ let := 1 }").unwrap_err();
    assert_eq!(error.span().map(|s| s.start), Some(6));
}

#[test]
fn test_parse_error_at_end_of_input() {
    let error = parse_program("{ let x := 1").unwrap_err();
    assert!(matches!(error, crate::CompileError::Parser { .. }));
    assert_eq!(error.span().map(|s| s.start), Some(12));
}

#[test]
fn test_parse_rejects_switch_without_cases() {
    let error = parse_program("{ switch x }").unwrap_err();
    assert!(error.message().contains("without any cases"));
}

// ============================================
// Deep nesting
// ============================================

#[test]
fn test_parse_deeply_nested_blocks() {
    let depth = 20_000;
    let source = format!("{}{}", "{ ".repeat(depth), "}".repeat(depth));
    let mut block = &parse_ok(&source);
    for _ in 1..depth {
        match block.statements.as_slice() {
            [Statement::Block(inner)] => block = inner,
            other => panic!("Expected a single nested block, found {} statements", other.len()),
        }
    }
    assert!(block.statements.is_empty());
}

#[test]
fn test_deeply_nested_call_round_trip() {
    let depth = 20_000;
    let call = format!("{}0{}", "add(1, ".repeat(depth), ")".repeat(depth));
    let block = parse_ok(&format!("{{ let x := {call} }}"));
    assert_eq!(block.to_string(), format!("{{\n    let x := {call}\n}}"));
}

// ============================================
// Printing
// ============================================

#[test]
fn test_print_round_trip() {
    let source = "{\n    function f(a) -> r {\n        r := sload(a)\n    }\n    let x := f(1)\n    if x {\n        sstore(0, x)\n    }\n}";
    let block = parse_ok(source);
    assert_eq!(block.to_string(), source);
    let reparsed = parse_ok(&block.to_string());
    assert_eq!(reparsed.to_string(), block.to_string());
}

#[test]
fn test_print_switch_layout() {
    let block = parse_ok("{ switch x case 1 { } default { pop(0) } }");
    insta::assert_snapshot!(block.statements[0].to_string(), @r"
    switch x
    case 1 { }
    default {
        pop(0)
    }
    ");
}
