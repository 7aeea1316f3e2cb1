//! Naming utilities for schema_annotate
//!
//! Table names are derived from model class names when a model does not
//! name its table explicitly.

use inflector::Inflector;

/// Apply a naming convention to a string
pub fn apply_naming_convention(name: &str, convention: &str) -> String {
    match convention {
        "snake_case" => name.to_snake_case(),
        "camel_case" => name.to_camel_case(),
        "pascal_case" => name.to_pascal_case(),
        "kebab_case" => name.to_kebab_case(),
        "screaming_snake_case" => name.to_screaming_snake_case(),
        _ => name.to_string(),
    }
}

/// Get table name from a model name according to convention
pub fn get_table_name(model_name: &str, style: &str, pluralize: bool) -> String {
    let name = apply_naming_convention(model_name, style);

    if !pluralize {
        return name;
    }

    // pluralise the last word only, so `line_item` becomes `line_items`
    let (head, last) = match name.rfind('_') {
        Some(i) => name.split_at(i + 1),
        None => ("", name.as_str()),
    };

    let plural = match last.to_lowercase().as_str() {
        "person" => "people".to_string(),
        "child" => "children".to_string(),
        "man" => "men".to_string(),
        "woman" => "women".to_string(),
        "mouse" => "mice".to_string(),
        _ => last.to_plural(),
    };

    format!("{}{}", head, plural)
}

/// Quote an identifier for use in catalog lookups
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
