// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script syntax tree

use crate::value::Value;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position in a source file, 1-based
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Vector(Vec<Expr>),
    Range {
        start: Box<Expr>,
        step: Option<Box<Expr>>,
        end: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Argument>,
        location: Location,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        target: Box<Expr>,
        name: String,
    },
}

/// Call argument, optionally named
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

/// Formal parameter of a module or function
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub expr: Expr,
    pub location: Location,
}

/// Statement prefixes `!`, `#`, `%` and `*`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub root: bool,
    pub highlight: bool,
    pub background: bool,
    pub disabled: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.root || self.highlight || self.background || self.disabled)
    }

    /// Prefix characters in source order
    pub fn prefix(&self) -> String {
        let mut prefix = String::new();
        for (set, c) in [(self.root, '!'), (self.highlight, '#'), (self.background, '%'), (self.disabled, '*')] {
            if set {
                prefix.push(c);
            }
        }
        prefix
    }
}

/// A module call (or `if`) with its child block
#[derive(Debug, Clone, PartialEq)]
pub struct Instantiation {
    pub name: String,
    pub args: Vec<Argument>,
    pub children: Scope,
    /// `else` branch; only set for `if`
    pub else_children: Option<Scope>,
    pub modifiers: Modifiers,
    pub location: Location,
}

impl Instantiation {
    pub fn is_if(&self) -> bool {
        self.name == "if"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Scope,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Expr,
    pub location: Location,
}

/// Declarations and statements of one block, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub assignments: Vec<Assignment>,
    pub children: Vec<Instantiation>,
    pub modules: AHashMap<String, Arc<ModuleDef>>,
    pub functions: AHashMap<String, Arc<FunctionDef>>,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
            && self.children.is_empty()
            && self.modules.is_empty()
            && self.functions.is_empty()
    }

    /// Append another scope, as textual inclusion does
    pub fn merge(&mut self, other: Scope) {
        self.assignments.extend(other.assignments);
        self.children.extend(other.children);
        self.modules.extend(other.modules);
        self.functions.extend(other.functions);
    }
}
