//! Template functions
//!
//! ref(), source(), var() and config(). Lookups read the `refs`, `sources`
//! and `vars` maps of the render context.

use minijinja::value::Kwargs;
use minijinja::{Error, ErrorKind, State, Value};

use crate::context::source_key;

/// ref() function - references another model
///
/// Usage in templates: {{ ref('model_name') }} or {{ ref('package', 'model_name') }}
/// Returns: the referenced relation as registered in the context
pub fn ref_function(state: &State, model_or_package: String, model_name: Option<String>) -> Result<Value, Error> {
    // Two-argument form: ref('package', 'model')
    let model = model_name.unwrap_or(model_or_package);

    let rendered = lookup(state, "refs", &model)?;
    if rendered.is_undefined() {
        return Err(Error::new(
            ErrorKind::UndefinedError,
            format!("ref('{}') does not match any model", model),
        ));
    }
    Ok(rendered)
}

/// source() function - references a source table
///
/// Usage in templates: {{ source('source_name', 'table_name') }}
pub fn source_function(state: &State, source_name: String, table_name: String) -> Result<Value, Error> {
    let rendered = lookup(state, "sources", &source_key(&source_name, &table_name))?;
    if rendered.is_undefined() {
        return Err(Error::new(
            ErrorKind::UndefinedError,
            format!("source('{}', '{}') is not defined", source_name, table_name),
        ));
    }
    Ok(rendered)
}

/// var() function - accesses project variables
///
/// Usage in templates: {{ var('variable_name') }} or {{ var('variable_name', 'default') }}
pub fn var_function(state: &State, var_name: String, default: Option<Value>) -> Result<Value, Error> {
    let value = lookup(state, "vars", &var_name)?;
    if !value.is_undefined() {
        return Ok(value);
    }

    default.ok_or_else(|| {
        Error::new(
            ErrorKind::UndefinedError,
            format!("Variable '{}' is not defined", var_name),
        )
    })
}

/// config() function - model configuration
///
/// Usage in templates: {{ config(materialized='table') }}
/// Configuration is read statically before rendering, so this renders nothing.
pub fn config_function(kwargs: Kwargs) -> Result<Value, Error> {
    // Unread kwargs are reported as unknown arguments
    let keys: Vec<String> = kwargs.args().map(str::to_string).collect();
    for key in &keys {
        let _: Value = kwargs.get(key)?;
    }
    Ok(Value::from(""))
}

fn lookup(state: &State, map: &str, key: &str) -> Result<Value, Error> {
    match state.lookup(map) {
        Some(values) if !values.is_undefined() => values.get_attr(key),
        _ => Ok(Value::UNDEFINED),
    }
}
