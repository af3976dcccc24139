//! Post-processing of rendered plugin documentation.

use super::rules::{CAPITALIZATION_LOWER, CAPITALIZATION_UPPER};

/// Trims the text, re-capitalises all-capitals headings and demotes every heading by one level.
///
/// The plugin's own title takes the top heading level in the final page.
pub fn postprocess(rendered: &str) -> String {
    rendered
        .trim()
        .lines()
        .map(|line| {
            if !line.starts_with('#') {
                return line.to_owned();
            }
            if is_all_capitals(line) {
                format!("#{}", recapitalize(line))
            } else {
                format!("#{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_all_capitals(line: &str) -> bool {
    line.chars().any(char::is_alphabetic) && !line.chars().any(char::is_lowercase)
}

/// "# BUGS AND LIMITATIONS" becomes "# Bugs and Limitations".
pub fn recapitalize(line: &str) -> String {
    line.split_whitespace()
        .map(|token| {
            let upper = token.to_uppercase();
            let lower = token.to_lowercase();
            if CAPITALIZATION_UPPER.contains(&upper.as_str()) {
                upper
            } else if CAPITALIZATION_LOWER.contains(&lower.as_str()) {
                lower
            } else {
                title_case(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper-cases the first letter of every run of letters and lower-cases the rest.
fn title_case(token: &str) -> String {
    let mut result = String::with_capacity(token.len());
    let mut previous_is_letter = false;
    for c in token.chars() {
        if previous_is_letter {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    result
}
