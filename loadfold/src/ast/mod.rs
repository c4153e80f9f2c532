//! Program tree definitions
//!
//! The tree is exclusively owned top-down. Optimizer steps rewrite it by
//! replacing whole `Expression` values in place; blocks and statements are
//! never restructured by the load resolver.

mod print;
mod span;
mod word;

pub use span::*;
pub use word::*;

use serde::{Deserialize, Serialize};

use crate::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// A block: `{ statement* }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub location: Span,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(location: Span, statements: Vec<Statement>) -> Self {
        Self {
            location,
            statements,
        }
    }
}

// Nested trees are torn down on a grown stack
impl Drop for Block {
    fn drop(&mut self) {
        let statements = std::mem::take(&mut self.statements);
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, move || drop(statements));
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// A function call evaluated for its effects
    ExpressionStatement(ExpressionStatement),
    /// `a, b := value`
    Assignment(Assignment),
    /// `let a, b := value` or `let a`
    VariableDeclaration(VariableDeclaration),
    /// `function f(a, b) -> r { ... }`
    FunctionDefinition(FunctionDefinition),
    /// `if condition { ... }`
    If(If),
    /// `switch expression case ... default ...`
    Switch(Switch),
    /// `for { pre } condition { post } { body }`
    ForLoop(ForLoop),
    Break(Span),
    Continue(Span),
    Leave(Span),
    /// Nested scope
    Block(Block),
}

/// Expression statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub location: Span,
    pub expression: Expression,
}

/// Assignment to one or more existing variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub location: Span,
    pub variable_names: Vec<Identifier>,
    pub value: Box<Expression>,
}

/// Declaration of one or more variables, optionally initialised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub location: Span,
    pub variables: Vec<Identifier>,
    pub value: Option<Box<Expression>>,
}

/// User-defined function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub location: Span,
    pub name: String,
    pub parameters: Vec<Identifier>,
    pub return_variables: Vec<Identifier>,
    pub body: Block,
}

/// Conditional without else branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct If {
    pub location: Span,
    pub condition: Box<Expression>,
    pub body: Block,
}

/// Multi-way branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub location: Span,
    pub expression: Box<Expression>,
    pub cases: Vec<Case>,
}

impl Switch {
    /// Whether one of the cases is `default`
    pub fn has_default(&self) -> bool {
        self.cases.iter().any(|case| case.value.is_none())
    }
}

/// A switch case; `value` is `None` for `default`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub location: Span,
    pub value: Option<Literal>,
    pub body: Block,
}

/// Loop with init block, condition, post block and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForLoop {
    pub location: Span,
    pub pre: Block,
    pub condition: Box<Expression>,
    pub post: Block,
    pub body: Block,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    FunctionCall(FunctionCall),
}

impl Expression {
    pub fn location(&self) -> Span {
        match self {
            Expression::Literal(literal) => literal.location,
            Expression::Identifier(identifier) => identifier.location,
            Expression::FunctionCall(call) => call.location,
        }
    }

    /// The identifier name if this is a bare variable reference
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Identifier(identifier) => Some(&identifier.name),
            _ => None,
        }
    }
}

/// Presentational kind of a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    Number,
    Boolean,
    /// String literal, left-aligned in the word
    String,
}

/// Literal with its word value already computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Literal {
    pub location: Span,
    pub kind: LiteralKind,
    pub value: Word,
}

impl Literal {
    pub fn number(location: Span, value: Word) -> Self {
        Self {
            location,
            kind: LiteralKind::Number,
            value,
        }
    }
}

/// Variable or function name reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub location: Span,
    pub name: String,
}

impl Identifier {
    pub fn new(location: Span, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
        }
    }
}

/// Call of a builtin or user-defined function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub location: Span,
    pub function_name: Identifier,
    pub arguments: Vec<Expression>,
}

impl FunctionCall {
    pub fn name(&self) -> &str {
        &self.function_name.name
    }
}

impl Drop for FunctionCall {
    fn drop(&mut self) {
        let arguments = std::mem::take(&mut self.arguments);
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, move || drop(arguments));
    }
}
