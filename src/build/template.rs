//! Control-file template rendering.
//!
//! Placeholders look like `@PACKAGE@`: an `@`, an uppercase identifier
//! (`[A-Z][A-Z0-9_]*`) and a closing `@`. Rendering is a single
//! left-to-right pass over the template; substituted values are copied
//! verbatim and never rescanned, so characters such as `/`, `&`, `\`, `$`
//! or even `@VERSION@` inside a value come out unchanged.
//!
//! Any other `@` in the template (an email address in a static field, say)
//! is kept as is. A placeholder with no value in the mapping is an error so
//! that an unrendered marker can never reach dpkg. Values containing line
//! breaks are rejected because they would inject extra control fields.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::error::PipelineError;

pub const PACKAGE: &str = "PACKAGE";
pub const VERSION: &str = "VERSION";
pub const ARCH: &str = "ARCH";
pub const MAINTAINER: &str = "MAINTAINER";
pub const INSTALLED_SIZE: &str = "INSTALLED_SIZE";

pub fn render(template: &str, mapping: &BTreeMap<&str, String>) -> Result<String> {
    for (key, value) in mapping {
        if value.contains('\n') || value.contains('\r') {
            return Err(PipelineError::configuration(format!(
                "value for @{key}@ must not contain line breaks"
            ))
            .into());
        }
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        match placeholder_len(after) {
            Some(len) => {
                let name = &after[..len];
                let value = mapping.get(name).ok_or_else(|| {
                    PipelineError::configuration(format!(
                        "template placeholder @{name}@ has no value"
                    ))
                })?;
                out.push_str(value);
                rest = &after[len + 1..];
            }
            None => {
                out.push('@');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Ok(out)
}

/// Length of the identifier if `s` starts with `IDENT@`.
fn placeholder_len(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_uppercase() => {}
        _ => return None,
    }
    for (i, c) in chars {
        if c == '@' {
            return Some(i);
        }
        if !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            return None;
        }
    }
    None
}
