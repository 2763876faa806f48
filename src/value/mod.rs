// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Dynamic script values
//!
//! A closed tagged union consumed by the expression evaluator and the
//! built-in function library. Conversions are explicit `try_as_*` calls
//! returning `Option`, so every caller validates arguments the same way.

mod dynamic;
mod format;
mod ops;

pub use dynamic::Value;
pub use format::format_number;
