// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script parser using pest

use super::syntax::*;
use crate::value::Value;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser;
use std::sync::Arc;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "script/scad.pest"]
struct ScadParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/// Syntax error with its position
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// File the error was found in, when known
    pub file: Option<String>,
}

impl ParseError {
    fn at(location: Location, message: impl Into<String>) -> Self {
        Self {
            line: location.line,
            column: location.column,
            message: message.into(),
            file: None,
        }
    }

    fn from_pest(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        Self {
            line,
            column,
            message: err.variant.message().to_string(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Supplies the parsed contents of `include <...>` files
pub trait IncludeResolver {
    /// Parsed scope of the named file, or `None` if it could not be read
    fn include(&mut self, name: &str, location: Location) -> Option<Scope>;
}

/// Resolver that ignores every include
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn include(&mut self, _name: &str, _location: Location) -> Option<Scope> {
        None
    }
}

/// Result of parsing one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScript {
    pub scope: Scope,
    /// Names given to `use <...>`, in source order
    pub uses: Vec<String>,
    /// Names given to `include <...>`, in source order
    pub includes: Vec<String>,
}

/// Parse source text without resolving includes
pub fn parse(source: &str) -> Result<ParsedScript, ParseError> {
    parse_script(source, &mut NoIncludes)
}

/// Parse source text, merging included files in place
pub fn parse_script(source: &str, resolver: &mut dyn IncludeResolver) -> Result<ParsedScript, ParseError> {
    let mut pairs = ScadParser::parse(Rule::program, source).map_err(ParseError::from_pest)?;

    let mut builder = Builder {
        resolver,
        uses: Vec::new(),
        includes: Vec::new(),
    };
    let mut scope = Scope::default();

    if let Some(program) = pairs.next() {
        for pair in program.into_inner() {
            builder.statement(pair, &mut scope)?;
        }
    }

    Ok(ParsedScript {
        scope,
        uses: builder.uses,
        includes: builder.includes,
    })
}

/// Parse a single expression
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let wrapped = format!("__expr = {};", source);
    let parsed = parse(&wrapped)?;
    parsed
        .scope
        .assignments
        .into_iter()
        .next()
        .map(|a| a.expr)
        .ok_or_else(|| ParseError::at(Location::new(1, 1), "expected an expression"))
}

fn location(pair: &Pair<'_>) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    Location::new(line, column)
}

fn expect<'a>(
    iter: &mut pest::iterators::Pairs<'a, Rule>,
    at: Location,
    what: &str,
) -> Result<Pair<'a>, ParseError> {
    iter.next()
        .ok_or_else(|| ParseError::at(at, format!("expected {}", what)))
}

struct Builder<'r> {
    resolver: &'r mut dyn IncludeResolver,
    uses: Vec<String>,
    includes: Vec<String>,
}

impl Builder<'_> {
    fn statement(&mut self, pair: Pair<'_>, scope: &mut Scope) -> Result<(), ParseError> {
        let loc = location(&pair);
        match pair.as_rule() {
            Rule::include_stmt => {
                let name = file_name(pair)?;
                self.includes.push(name.clone());
                if let Some(included) = self.resolver.include(&name, loc) {
                    scope.merge(included);
                }
            }
            Rule::use_stmt => {
                let name = file_name(pair)?;
                self.uses.push(name);
            }
            Rule::module_def => {
                let mut inner = pair.into_inner();
                let name = expect(&mut inner, loc, "module name")?.as_str().to_string();
                let mut params = Vec::new();
                let mut body = Scope::default();
                for part in inner {
                    match part.as_rule() {
                        Rule::params => params = self.params(part)?,
                        Rule::child_body => body = self.child_body(part)?,
                        _ => {}
                    }
                }
                scope.modules.insert(
                    name.clone(),
                    Arc::new(ModuleDef {
                        name,
                        params,
                        body,
                        location: loc,
                    }),
                );
            }
            Rule::function_def => {
                let mut inner = pair.into_inner();
                let name = expect(&mut inner, loc, "function name")?.as_str().to_string();
                let mut params = Vec::new();
                let mut body = None;
                for part in inner {
                    match part.as_rule() {
                        Rule::params => params = self.params(part)?,
                        Rule::expr => body = Some(self.expr(part)?),
                        _ => {}
                    }
                }
                let body = body.ok_or_else(|| ParseError::at(loc, "expected function body"))?;
                scope.functions.insert(
                    name.clone(),
                    Arc::new(FunctionDef {
                        name,
                        params,
                        body,
                        location: loc,
                    }),
                );
            }
            Rule::assignment => {
                let mut inner = pair.into_inner();
                let name = expect(&mut inner, loc, "identifier")?.as_str().to_string();
                let expr = self.expr(expect(&mut inner, loc, "expression")?)?;
                scope.assignments.push(Assignment {
                    name,
                    expr,
                    location: loc,
                });
            }
            Rule::block => {
                for inner in pair.into_inner() {
                    self.statement(inner, scope)?;
                }
            }
            Rule::instantiation => {
                let instantiation = self.instantiation(pair)?;
                scope.children.push(instantiation);
            }
            _ => {}
        }
        Ok(())
    }

    fn params(&mut self, pair: Pair<'_>) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        for param in pair.into_inner() {
            let loc = location(&param);
            let mut inner = param.into_inner();
            let name = expect(&mut inner, loc, "parameter name")?.as_str().to_string();
            let default = match inner.next() {
                Some(expr) => Some(self.expr(expr)?),
                None => None,
            };
            params.push(Parameter { name, default });
        }
        Ok(params)
    }

    fn child_body(&mut self, pair: Pair<'_>) -> Result<Scope, ParseError> {
        let mut scope = Scope::default();
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::block => {
                    for statement in inner.into_inner() {
                        self.statement(statement, &mut scope)?;
                    }
                }
                Rule::instantiation => scope.children.push(self.instantiation(inner)?),
                _ => {}
            }
        }
        Ok(scope)
    }

    fn instantiation(&mut self, pair: Pair<'_>) -> Result<Instantiation, ParseError> {
        let mut modifiers = Modifiers::default();
        let mut target = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::modifier => match inner.as_str() {
                    "!" => modifiers.root = true,
                    "#" => modifiers.highlight = true,
                    "%" => modifiers.background = true,
                    "*" => modifiers.disabled = true,
                    _ => {}
                },
                _ => target = Some(inner),
            }
        }
        let target = target.ok_or_else(|| ParseError::at(Location::default(), "expected module call"))?;
        let loc = location(&target);

        let mut instantiation = match target.as_rule() {
            Rule::if_stmt => {
                let mut inner = target.into_inner();
                let condition = self.expr(expect(&mut inner, loc, "condition")?)?;
                let children = self.child_body(expect(&mut inner, loc, "statement")?)?;
                let else_children = match inner.next() {
                    Some(branch) => {
                        let body = expect(&mut branch.into_inner(), loc, "statement")?;
                        Some(self.child_body(body)?)
                    }
                    None => None,
                };
                Instantiation {
                    name: "if".to_string(),
                    args: vec![Argument {
                        name: None,
                        value: condition,
                    }],
                    children,
                    else_children,
                    modifiers: Modifiers::default(),
                    location: loc,
                }
            }
            _ => {
                let mut inner = target.into_inner();
                let name = expect(&mut inner, loc, "module name")?.as_str().to_string();
                let mut args = Vec::new();
                let mut children = Scope::default();
                for part in inner {
                    match part.as_rule() {
                        Rule::args => args = self.args(part)?,
                        Rule::child_body => children = self.child_body(part)?,
                        _ => {}
                    }
                }
                Instantiation {
                    name,
                    args,
                    children,
                    else_children: None,
                    modifiers: Modifiers::default(),
                    location: loc,
                }
            }
        };
        instantiation.modifiers = modifiers;
        Ok(instantiation)
    }

    fn args(&mut self, pair: Pair<'_>) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();
        for arg in pair.into_inner() {
            let loc = location(&arg);
            let first = expect(&mut arg.into_inner(), loc, "argument")?;
            if first.as_rule() == Rule::named_arg {
                let mut inner = first.into_inner();
                let name = expect(&mut inner, loc, "argument name")?.as_str().to_string();
                let value = self.expr(expect(&mut inner, loc, "argument value")?)?;
                args.push(Argument {
                    name: Some(name),
                    value,
                });
            } else {
                args.push(Argument {
                    name: None,
                    value: self.expr(first)?,
                });
            }
        }
        Ok(args)
    }

    fn expr(&mut self, pair: Pair<'_>) -> Result<Expr, ParseError> {
        let loc = location(&pair);
        match pair.as_rule() {
            Rule::expr => self.expr(expect(&mut pair.into_inner(), loc, "expression")?),
            Rule::ternary => {
                let mut inner = pair.into_inner();
                let condition = self.expr(expect(&mut inner, loc, "expression")?)?;
                match inner.next() {
                    Some(then) => {
                        let then = self.expr(then)?;
                        let otherwise = self.expr(expect(&mut inner, loc, "':' branch")?)?;
                        Ok(Expr::Ternary {
                            condition: Box::new(condition),
                            then: Box::new(then),
                            otherwise: Box::new(otherwise),
                        })
                    }
                    None => Ok(condition),
                }
            }
            Rule::logic_or
            | Rule::logic_and
            | Rule::equality
            | Rule::comparison
            | Rule::additive
            | Rule::multiplicative => {
                let mut inner = pair.into_inner();
                let mut lhs = self.expr(expect(&mut inner, loc, "operand")?)?;
                while let Some(op) = inner.next() {
                    let op = binary_op(op.as_str())
                        .ok_or_else(|| ParseError::at(loc, format!("unknown operator '{}'", op.as_str())))?;
                    let rhs = self.expr(expect(&mut inner, loc, "operand")?)?;
                    lhs = Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                Ok(lhs)
            }
            Rule::unary => {
                let mut ops = Vec::new();
                let mut operand = None;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::unary_op => ops.push(match inner.as_str() {
                            "!" => UnaryOp::Not,
                            "-" => UnaryOp::Negate,
                            _ => UnaryOp::Plus,
                        }),
                        _ => operand = Some(self.expr(inner)?),
                    }
                }
                let mut expr = operand.ok_or_else(|| ParseError::at(loc, "expected operand"))?;
                for op in ops.into_iter().rev() {
                    expr = Expr::Unary {
                        op,
                        operand: Box::new(expr),
                    };
                }
                Ok(expr)
            }
            Rule::postfix => {
                let mut inner = pair.into_inner();
                let mut expr = self.expr(expect(&mut inner, loc, "expression")?)?;
                for suffix in inner {
                    let suffix_loc = location(&suffix);
                    let part = expect(&mut suffix.clone().into_inner(), suffix_loc, "suffix")?;
                    expr = match suffix.as_rule() {
                        Rule::index_suffix => Expr::Index {
                            target: Box::new(expr),
                            index: Box::new(self.expr(part)?),
                        },
                        _ => Expr::Member {
                            target: Box::new(expr),
                            name: part.as_str().to_string(),
                        },
                    };
                }
                Ok(expr)
            }
            Rule::number => pair
                .as_str()
                .parse::<f64>()
                .map(|n| Expr::Literal(Value::Number(n)))
                .map_err(|e| ParseError::at(loc, e.to_string())),
            Rule::string => {
                let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(Expr::Literal(Value::String(unescape(raw))))
            }
            Rule::bool_true => Ok(Expr::Literal(Value::Bool(true))),
            Rule::bool_false => Ok(Expr::Literal(Value::Bool(false))),
            Rule::undef_lit => Ok(Expr::Literal(Value::Undefined)),
            Rule::range => {
                let parts = pair
                    .into_inner()
                    .map(|p| self.expr(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut parts = parts.into_iter();
                let start = parts.next();
                let second = parts.next();
                let third = parts.next();
                match (start, second, third) {
                    (Some(start), Some(end), None) => Ok(Expr::Range {
                        start: Box::new(start),
                        step: None,
                        end: Box::new(end),
                    }),
                    (Some(start), Some(step), Some(end)) => Ok(Expr::Range {
                        start: Box::new(start),
                        step: Some(Box::new(step)),
                        end: Box::new(end),
                    }),
                    _ => Err(ParseError::at(loc, "malformed range")),
                }
            }
            Rule::vector => Ok(Expr::Vector(
                pair.into_inner()
                    .map(|p| self.expr(p))
                    .collect::<Result<_, _>>()?,
            )),
            Rule::call => {
                let mut inner = pair.into_inner();
                let name = expect(&mut inner, loc, "function name")?.as_str().to_string();
                let args = match inner.next() {
                    Some(args) => self.args(args)?,
                    None => Vec::new(),
                };
                Ok(Expr::Call {
                    name,
                    args,
                    location: loc,
                })
            }
            Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
            other => Err(ParseError::at(loc, format!("unexpected {:?}", other))),
        }
    }
}

fn file_name(pair: Pair<'_>) -> Result<String, ParseError> {
    let loc = location(&pair);
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::file_name)
        .map(|p| p.as_str().trim().to_string())
        .ok_or_else(|| ParseError::at(loc, "expected file name"))
}

fn binary_op(symbol: &str) -> Option<BinaryOp> {
    Some(match symbol {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "==" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        "<" => BinaryOp::Less,
        "<=" => BinaryOp::LessEqual,
        ">" => BinaryOp::Greater,
        ">=" => BinaryOp::GreaterEqual,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Subtract,
        "*" => BinaryOp::Multiply,
        "/" => BinaryOp::Divide,
        "%" => BinaryOp::Modulo,
        _ => return None,
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
