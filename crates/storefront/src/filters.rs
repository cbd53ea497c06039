//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Capitalizes the first letter, for role names in menus.
///
/// Usage in templates: `{{ role|label }}`
#[askama::filter_fn]
pub fn label(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(capitalize(&value.to_string()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("vendor"), "Vendor");
        assert_eq!(capitalize(""), "");
    }
}
