//! Inline `style` attribute parsing.

use serde_json::Value;

use crate::models::StyleMap;

/// Parse a raw `style` attribute into an ordered camelCase property map.
///
/// Declarations are split on `;` outside parentheses, so values such as
/// `url(data:image/png;base64,..)` stay intact. Each declaration splits on its
/// first colon; declarations with an empty key or value are dropped. A
/// repeated property keeps its first position and takes the last value.
pub fn parse_style(raw: &str) -> StyleMap {
    let collapsed = collapse_whitespace(raw);
    let mut style = StyleMap::new();

    for declaration in split_declarations(&collapsed) {
        let Some((key, value)) = declaration.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        style.insert(camel_case(key), Value::String(value.to_string()));
    }

    style
}

/// Newlines and runs of whitespace become one space; a lone tab or space is
/// kept as written.
fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if !c.is_whitespace() {
            out.push(c);
            continue;
        }
        let mut run_is_single = true;
        while chars.next_if(|next| next.is_whitespace()).is_some() {
            run_is_single = false;
        }
        if run_is_single && c != '\n' {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out
}

fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

/// `background-color` → `backgroundColor`, `-webkit-line-clamp` → `WebkitLineClamp`.
pub fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());

    for (i, word) in property.split(['-', '_', ' ']).enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if i > 0 {
            out.extend(first.to_uppercase());
        } else {
            out.extend(first.to_lowercase());
        }

        let rest = chars.as_str();
        if word.chars().all(|c| !c.is_lowercase()) {
            out.push_str(&rest.to_lowercase());
        } else {
            out.push_str(rest);
        }
    }

    out
}
