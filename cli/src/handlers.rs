// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in stage handlers available to `call` stages run from the CLI.
//!
//! | Name | Input | Output |
//! |------|-------|--------|
//! | `echo` | any | the input |
//! | `upper` | string | upper-cased string |
//! | `increment` | integer | integer + 1 |
//! | `sum` | array of numbers | their sum |
//! | `count` | array or object | number of entries |
//! | `context` | any | the execution context as an object |

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use democrite_core::application::{StageContext, StageHandler, StageHandlerRegistry};
use democrite_core::domain::sequence::SequenceError;

fn echo(input: Value) -> Result<Value, SequenceError> {
    Ok(input)
}

fn upper(input: Value) -> Result<Value, SequenceError> {
    input
        .as_str()
        .map(|s| Value::String(s.to_uppercase()))
        .ok_or_else(|| SequenceError::Handler(format!("upper expects a string, got {}", input)))
}

fn increment(input: Value) -> Result<Value, SequenceError> {
    input
        .as_i64()
        .and_then(|n| n.checked_add(1))
        .map(|n| json!(n))
        .ok_or_else(|| SequenceError::Handler(format!("increment expects an integer, got {}", input)))
}

fn sum(input: Value) -> Result<Value, SequenceError> {
    let Value::Array(items) = input else {
        return Err(SequenceError::Handler("sum expects an array".to_string()));
    };

    if items.iter().all(Value::is_i64) {
        return Ok(json!(items.iter().filter_map(Value::as_i64).sum::<i64>()));
    }

    let mut total = 0.0;
    for item in &items {
        total += item
            .as_f64()
            .ok_or_else(|| SequenceError::Handler(format!("sum expects numbers, got {}", item)))?;
    }
    Ok(json!(total))
}

fn count(input: Value) -> Result<Value, SequenceError> {
    match input {
        Value::Array(items) => Ok(json!(items.len())),
        Value::Object(fields) => Ok(json!(fields.len())),
        other => Err(SequenceError::Handler(format!("count expects an array or object, got {}", other))),
    }
}

/// Exposes the values pushed to the execution context.
struct ContextSnapshot;

#[async_trait]
impl StageHandler for ContextSnapshot {
    async fn handle(&self, _input: Value, context: &StageContext) -> Result<Value, SequenceError> {
        let fields: Map<String, Value> = context
            .context_data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Value::Object(fields))
    }
}

pub fn builtin_handlers() -> StageHandlerRegistry {
    let mut registry = StageHandlerRegistry::new();
    registry
        .register("echo", Arc::new(echo))
        .register("upper", Arc::new(upper))
        .register("increment", Arc::new(increment))
        .register("sum", Arc::new(sum))
        .register("count", Arc::new(count))
        .register("context", Arc::new(ContextSnapshot));
    registry
}
