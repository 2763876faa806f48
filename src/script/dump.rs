// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Source text printer for parsed scripts

use super::syntax::{Argument, Expr, Instantiation, Parameter, Scope, UnaryOp};
use std::fmt::{self, Write};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value.to_echo_string()),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Vector(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Range { start, step, end } => match step {
                Some(step) => write!(f, "[{} : {} : {}]", start, step, end),
                None => write!(f, "[{} : {}]", start, end),
            },
            Expr::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Negate => "-",
                    UnaryOp::Plus => "+",
                };
                write!(f, "{}{}", symbol, operand)
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
            Expr::Call { name, args, .. } => write!(f, "{}({})", name, ArgList(args)),
            Expr::Index { target, index } => write!(f, "{}[{}]", target, index),
            Expr::Member { target, name } => write!(f, "{}.{}", target, name),
        }
    }
}

struct ArgList<'a>(&'a [Argument]);

impl fmt::Display for ArgList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &arg.name {
                Some(name) => write!(f, "{} = {}", name, arg.value)?,
                None => write!(f, "{}", arg.value)?,
            }
        }
        Ok(())
    }
}

struct ParamList<'a>(&'a [Parameter]);

impl fmt::Display for ParamList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &param.default {
                Some(default) => write!(f, "{} = {}", param.name, default)?,
                None => write!(f, "{}", param.name)?,
            }
        }
        Ok(())
    }
}

impl Scope {
    /// Print the scope back as source text.
    ///
    /// Definitions are emitted in source order ahead of statements, so the
    /// output is stable across runs and re-parses to the same text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_scope(self, 0, &mut out);
        out
    }
}

fn dump_scope(scope: &Scope, depth: usize, out: &mut String) {
    let indent = "\t".repeat(depth);

    for assignment in &scope.assignments {
        let _ = writeln!(out, "{}{} = {};", indent, assignment.name, assignment.expr);
    }

    let mut functions: Vec<_> = scope.functions.values().collect();
    functions.sort_by_key(|def| (def.location.line, def.location.column));
    for def in functions {
        let _ = writeln!(out, "{}function {}({}) = {};", indent, def.name, ParamList(&def.params), def.body);
    }

    let mut modules: Vec<_> = scope.modules.values().collect();
    modules.sort_by_key(|def| (def.location.line, def.location.column));
    for def in modules {
        let _ = writeln!(out, "{}module {}({}) {{", indent, def.name, ParamList(&def.params));
        dump_scope(&def.body, depth + 1, out);
        let _ = writeln!(out, "{}}}", indent);
    }

    for inst in &scope.children {
        dump_instantiation(inst, depth, out);
    }
}

fn dump_instantiation(inst: &Instantiation, depth: usize, out: &mut String) {
    let indent = "\t".repeat(depth);
    let gap = if inst.is_if() { " " } else { "" };
    let _ = write!(
        out,
        "{}{}{}{}({})",
        indent,
        inst.modifiers.prefix(),
        inst.name,
        gap,
        ArgList(&inst.args)
    );

    if inst.children.is_empty() && inst.else_children.is_none() {
        out.push_str(";\n");
        return;
    }

    out.push_str(" {\n");
    dump_scope(&inst.children, depth + 1, out);
    let _ = write!(out, "{}}}", indent);
    if let Some(otherwise) = &inst.else_children {
        out.push_str(" else {\n");
        dump_scope(otherwise, depth + 1, out);
        let _ = write!(out, "{}}}", indent);
    }
    out.push('\n');
}
