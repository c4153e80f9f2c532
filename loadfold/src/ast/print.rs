//! Textual form of the program tree
//!
//! The output re-parses to an equal tree (up to spans and the spelling of
//! number literals, which are always printed in decimal).

use std::fmt::{self, Display, Formatter, Write};

use num_traits::Zero;

use super::{Block, Case, Expression, Literal, LiteralKind, Statement, to_big_endian};
use crate::{STACK_GROW_SIZE, STACK_RED_ZONE};

const INDENT: &str = "    ";

fn write_indent(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_block(f: &mut Formatter<'_>, block: &Block, depth: usize) -> fmt::Result {
    if block.statements.is_empty() {
        return f.write_str("{ }");
    }
    f.write_str("{\n")?;
    for statement in &block.statements {
        write_indent(f, depth + 1)?;
        write_statement(f, statement, depth + 1)?;
        f.write_char('\n')?;
    }
    write_indent(f, depth)?;
    f.write_char('}')
}

fn write_names<'a>(f: &mut Formatter<'_>, names: impl Iterator<Item = &'a str>) -> fmt::Result {
    for (i, name) in names.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(name)?;
    }
    Ok(())
}

fn write_case(f: &mut Formatter<'_>, case: &Case, depth: usize) -> fmt::Result {
    match &case.value {
        Some(value) => write!(f, "case {value} ")?,
        None => f.write_str("default ")?,
    }
    write_block(f, &case.body, depth)
}

fn write_statement(f: &mut Formatter<'_>, statement: &Statement, depth: usize) -> fmt::Result {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || write_statement_inner(f, statement, depth))
}

fn write_statement_inner(f: &mut Formatter<'_>, statement: &Statement, depth: usize) -> fmt::Result {
    match statement {
        Statement::ExpressionStatement(statement) => write!(f, "{}", statement.expression),
        Statement::Assignment(assignment) => {
            write_names(f, assignment.variable_names.iter().map(|v| v.name.as_str()))?;
            write!(f, " := {}", assignment.value)
        }
        Statement::VariableDeclaration(declaration) => {
            f.write_str("let ")?;
            write_names(f, declaration.variables.iter().map(|v| v.name.as_str()))?;
            if let Some(value) = &declaration.value {
                write!(f, " := {value}")?;
            }
            Ok(())
        }
        Statement::FunctionDefinition(function) => {
            write!(f, "function {}(", function.name)?;
            write_names(f, function.parameters.iter().map(|p| p.name.as_str()))?;
            f.write_char(')')?;
            if !function.return_variables.is_empty() {
                f.write_str(" -> ")?;
                write_names(f, function.return_variables.iter().map(|r| r.name.as_str()))?;
            }
            f.write_char(' ')?;
            write_block(f, &function.body, depth)
        }
        Statement::If(if_statement) => {
            write!(f, "if {} ", if_statement.condition)?;
            write_block(f, &if_statement.body, depth)
        }
        Statement::Switch(switch) => {
            write!(f, "switch {}", switch.expression)?;
            for case in &switch.cases {
                f.write_char('\n')?;
                write_indent(f, depth)?;
                write_case(f, case, depth)?;
            }
            Ok(())
        }
        Statement::ForLoop(for_loop) => {
            f.write_str("for ")?;
            write_block(f, &for_loop.pre, depth)?;
            write!(f, " {} ", for_loop.condition)?;
            write_block(f, &for_loop.post, depth)?;
            f.write_char(' ')?;
            write_block(f, &for_loop.body, depth)
        }
        Statement::Break(_) => f.write_str("break"),
        Statement::Continue(_) => f.write_str("continue"),
        Statement::Leave(_) => f.write_str("leave"),
        Statement::Block(block) => write_block(f, block, depth),
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_block(f, self, 0)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || write_expression(f, self))
    }
}

fn write_expression(f: &mut Formatter<'_>, expression: &Expression) -> fmt::Result {
    match expression {
        Expression::Literal(literal) => write!(f, "{literal}"),
        Expression::Identifier(identifier) => f.write_str(&identifier.name),
        Expression::FunctionCall(call) => {
            write!(f, "{}(", call.function_name.name)?;
            for (i, argument) in call.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{argument}")?;
            }
            f.write_char(')')
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            LiteralKind::Number => write!(f, "{}", self.value),
            LiteralKind::Boolean => f.write_str(if self.value.is_zero() { "false" } else { "true" }),
            LiteralKind::String => {
                let bytes = to_big_endian(&self.value);
                let len = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                f.write_char('"')?;
                for &byte in &bytes[..len] {
                    match byte {
                        b'"' => f.write_str("\\\"")?,
                        b'\\' => f.write_str("\\\\")?,
                        0x20..=0x7e => f.write_char(byte as char)?,
                        _ => write!(f, "\\x{byte:02x}")?,
                    }
                }
                f.write_char('"')
            }
        }
    }
}
