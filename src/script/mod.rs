// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script language front end
//!
//! Turns source text into a [`Scope`] tree of assignments, module
//! instantiations and definitions.

mod dump;
mod parser;
mod syntax;

pub use parser::{parse, parse_expression, parse_script, IncludeResolver, NoIncludes, ParseError, ParsedScript};
pub use syntax::{
    Argument, Assignment, BinaryOp, Expr, FunctionDef, Instantiation, Location, Modifiers, ModuleDef, Parameter,
    Scope, UnaryOp,
};
