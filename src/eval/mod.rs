// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script evaluation
//!
//! Binding frames, expression evaluation and the instantiator that turns a
//! parsed script into an [`AbstractNode`](crate::ast::AbstractNode) tree.

mod context;
mod expression;
mod instantiate;

pub use context::{is_special, CallStack, Environment, FrameId};
pub use expression::{MAX_RANGE_ELEMENTS, MAX_RECURSION_DEPTH};
pub use instantiate::{Camera, InstantiateOptions, Instantiated, Instantiator, ViewState};

use crate::builtins::Builtins;
use crate::diagnostics::Diagnostics;
use crate::io::ScriptModule;
use crate::script::{parse_expression, ParseError};
use crate::value::Value;

/// Parse and evaluate a standalone expression
pub fn evaluate_expression(source: &str, builtins: &Builtins, diagnostics: &Diagnostics) -> Result<Value, ParseError> {
    let expr = parse_expression(source)?;
    Ok(Instantiator::new(builtins, diagnostics).evaluate(&ScriptModule::default(), &expr))
}
