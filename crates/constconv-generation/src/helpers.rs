//! Template helper library
//!
//! Helpers are registered under the names templates call them by, e.g.
//! `{{SnakeCase Name}}` or `{{#if (HasPrefix Name "Mode")}}`.

use handlebars::{
    Context, Handlebars, Helper, HelperResult, JsonRender, Output, RenderContext,
    RenderErrorReason,
};

/// Case transformation applied to identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTransform {
    /// snake_case (e.g., day_of_week)
    SnakeCase,
    /// kebab-case (e.g., day-of-week)
    KebabCase,
    /// lowerCamelCase (e.g., dayOfWeek)
    LowerCamelCase,
    /// UPPER_SNAKE_CASE (e.g., DAY_OF_WEEK)
    UpperSnakeCase,
    /// UPPER-KEBAB-CASE (e.g., DAY-OF-WEEK)
    UpperKebabCase,
    /// UpperCamelCase (e.g., DayOfWeek)
    UpperCamelCase,
}

impl CaseTransform {
    /// Apply case transformation to a string
    pub fn apply(&self, input: &str) -> String {
        use heck::{
            ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
            ToUpperCamelCase,
        };

        match self {
            CaseTransform::SnakeCase => input.to_snake_case(),
            CaseTransform::KebabCase => input.to_kebab_case(),
            CaseTransform::LowerCamelCase => input.to_lower_camel_case(),
            CaseTransform::UpperSnakeCase => input.to_shouty_snake_case(),
            CaseTransform::UpperKebabCase => input.to_shouty_kebab_case(),
            CaseTransform::UpperCamelCase => input.to_upper_camel_case(),
        }
    }
}

/// Uppercase the first letter of every word
pub fn title(s: &str) -> String {
    fn is_separator(c: char) -> bool {
        if c.is_ascii() {
            return !(c.is_ascii_alphanumeric() || c == '_');
        }
        if c.is_alphanumeric() {
            return false;
        }
        c.is_whitespace()
    }

    let mut prev = ' ';
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_separator(prev) {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

fn in_cutset(cutset: &str) -> impl Fn(char) -> bool + '_ {
    move |c| cutset.contains(c)
}

// helper structs stay private to the crate
mod library {
    use super::{in_cutset, title, CaseTransform};
    use constconv_parsers::quote;
    use handlebars::handlebars_helper;

    handlebars_helper!(snake_case: |s: str| CaseTransform::SnakeCase.apply(s));
    handlebars_helper!(kebab_case: |s: str| CaseTransform::KebabCase.apply(s));
    handlebars_helper!(lower_camel_case: |s: str| CaseTransform::LowerCamelCase.apply(s));
    handlebars_helper!(upper_snake_case: |s: str| CaseTransform::UpperSnakeCase.apply(s));
    handlebars_helper!(upper_kebab_case: |s: str| CaseTransform::UpperKebabCase.apply(s));
    handlebars_helper!(upper_camel_case: |s: str| CaseTransform::UpperCamelCase.apply(s));

    handlebars_helper!(has_prefix: |s: str, prefix: str| s.starts_with(prefix));
    handlebars_helper!(has_suffix: |s: str, suffix: str| s.ends_with(suffix));
    handlebars_helper!(contains: |s: str, substr: str| s.contains(substr));

    handlebars_helper!(title_case: |s: str| title(s));
    handlebars_helper!(to_lower: |s: str| s.to_lowercase());
    handlebars_helper!(to_upper: |s: str| s.to_uppercase());

    handlebars_helper!(trim_space: |s: str| s.trim().to_string());
    handlebars_helper!(trim_prefix: |s: str, prefix: str| s.strip_prefix(prefix).unwrap_or(s).to_string());
    handlebars_helper!(trim_suffix: |s: str, suffix: str| s.strip_suffix(suffix).unwrap_or(s).to_string());
    handlebars_helper!(trim: |s: str, cutset: str| s.trim_matches(in_cutset(cutset)).to_string());
    handlebars_helper!(trim_left: |s: str, cutset: str| s.trim_start_matches(in_cutset(cutset)).to_string());
    handlebars_helper!(trim_right: |s: str, cutset: str| s.trim_end_matches(in_cutset(cutset)).to_string());

    handlebars_helper!(quote_string: |s: str| quote::quote(s));
    // malformed literals are returned unchanged
    handlebars_helper!(unquote_string: |s: str| quote::unquote(s).unwrap_or_else(|_| s.to_string()));
}

/// `{{Fail "message"}}` aborts rendering with the message
fn fail(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    _: &mut dyn Output,
) -> HelperResult {
    let message = h
        .params()
        .iter()
        .map(|p| p.value().render())
        .collect::<Vec<_>>()
        .join(" ");
    Err(RenderErrorReason::Other(message).into())
}

/// Register every helper on `registry`
/// Helpers this library registers, as templates call them
pub const HELPER_NAMES: &[&str] = &[
    "SnakeCase",
    "KebabCase",
    "LowerCamelCase",
    "UpperSnakeCase",
    "UpperKebabCase",
    "UpperCamelCase",
    "HasPrefix",
    "HasSuffix",
    "Contains",
    "Title",
    "ToLower",
    "ToUpper",
    "TrimSpace",
    "TrimPrefix",
    "TrimSuffix",
    "Trim",
    "TrimLeft",
    "TrimRight",
    "Quote",
    "Unquote",
    "Fail",
];

/// Helpers every handlebars registry starts with
const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len",
];

/// Whether a template may call `name` as a helper
pub fn is_known(name: &str) -> bool {
    HELPER_NAMES.contains(&name) || BUILTIN_HELPERS.contains(&name)
}

pub fn register(registry: &mut Handlebars<'_>) {
    use library::*;

    registry.register_helper("SnakeCase", Box::new(snake_case));
    registry.register_helper("KebabCase", Box::new(kebab_case));
    registry.register_helper("LowerCamelCase", Box::new(lower_camel_case));
    registry.register_helper("UpperSnakeCase", Box::new(upper_snake_case));
    registry.register_helper("UpperKebabCase", Box::new(upper_kebab_case));
    registry.register_helper("UpperCamelCase", Box::new(upper_camel_case));
    registry.register_helper("HasPrefix", Box::new(has_prefix));
    registry.register_helper("HasSuffix", Box::new(has_suffix));
    registry.register_helper("Contains", Box::new(contains));
    registry.register_helper("Title", Box::new(title_case));
    registry.register_helper("ToLower", Box::new(to_lower));
    registry.register_helper("ToUpper", Box::new(to_upper));
    registry.register_helper("TrimSpace", Box::new(trim_space));
    registry.register_helper("TrimPrefix", Box::new(trim_prefix));
    registry.register_helper("TrimSuffix", Box::new(trim_suffix));
    registry.register_helper("Trim", Box::new(trim));
    registry.register_helper("TrimLeft", Box::new(trim_left));
    registry.register_helper("TrimRight", Box::new(trim_right));
    registry.register_helper("Quote", Box::new(quote_string));
    registry.register_helper("Unquote", Box::new(unquote_string));
    registry.register_helper("Fail", Box::new(fail));
}
