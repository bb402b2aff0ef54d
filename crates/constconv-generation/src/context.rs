//! Data handed to the template
//!
//! The serialized field names are what templates address:
//!
//! | key               | content                                  |
//! |-------------------|------------------------------------------|
//! | `doNotEdit`       | generated-code banner with the arguments |
//! | `extra`           | user supplied key/value pairs            |
//! | `basePackageName` | name of the primary package              |
//! | `values`          | values of the first requested type       |
//! | `valuesList`      | one entry per requested type             |

use std::collections::BTreeMap;

use constconv_parsers::{Import, TypeResult, Value};
use serde::Serialize;

/// The `doNotEdit` banner for an invocation with `exec_args`
pub fn do_not_edit(exec_args: &str) -> String {
    format!("// Code generated by \"constconv {}\"; DO NOT EDIT.", exec_args)
}

/// A value as seen by templates
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueView<'a> {
    #[serde(flatten)]
    value: &'a Value,
    is_bool: bool,
    is_string: bool,
    is_int: bool,
    is_float: bool,
    is_complex: bool,
}

impl<'a> From<&'a Value> for ValueView<'a> {
    fn from(value: &'a Value) -> Self {
        Self {
            value,
            is_bool: value.is_bool(),
            is_string: value.is_string(),
            is_int: value.is_int(),
            is_float: value.is_float(),
            is_complex: value.is_complex(),
        }
    }
}

/// A per-type result as seen by templates
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultView<'a> {
    pkg_name: &'a str,
    type_name: &'a str,
    rep_type_name: &'a str,
    values: Vec<ValueView<'a>>,
    imports: &'a [Import],
}

impl<'a> From<&'a TypeResult> for ResultView<'a> {
    fn from(result: &'a TypeResult) -> Self {
        Self {
            pkg_name: &result.pkg_name,
            type_name: &result.type_name,
            rep_type_name: &result.rep_type_name,
            values: result.values.iter().map(ValueView::from).collect(),
            imports: &result.imports,
        }
    }
}

/// The root template context
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData<'a> {
    do_not_edit: String,
    extra: &'a BTreeMap<String, String>,
    base_package_name: &'a str,
    values: Vec<ValueView<'a>>,
    values_list: Vec<ResultView<'a>>,
}

impl<'a> TemplateData<'a> {
    /// Build the context; `results` must not be empty
    pub fn new(
        exec_args: &str,
        extra: &'a BTreeMap<String, String>,
        base_package_name: &'a str,
        results: &'a [TypeResult],
    ) -> Option<Self> {
        let values_list: Vec<ResultView<'a>> = results.iter().map(ResultView::from).collect();
        let values = values_list.first()?.values.clone();
        Some(Self {
            do_not_edit: do_not_edit(exec_args),
            extra,
            base_package_name,
            values,
            values_list,
        })
    }
}
