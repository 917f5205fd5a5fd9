//! Environment-variable interpolation for `auth` templates.
//!
//! Supports `${NAME}` and bare `$NAME` (identifier syntax: a letter or `_`
//! followed by letters, digits or `_`). A reference the lookup cannot
//! resolve is left in the output verbatim.

/// Expand variable references in `template` using `lookup`.
///
/// Pure: the caller decides where values come from (usually `std::env::var`).
pub fn expand_env<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                let reference = &rest[pos..pos + 3 + end];
                match is_identifier(name).then(|| lookup(name)).flatten() {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(reference),
                }
                rest = &braced[end + 1..];
                continue;
            }
        }

        let name_len = identifier_len(after);
        if name_len == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        let name = &after[..name_len];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}

/// Length in bytes of the identifier at the start of `s` (0 if none).
fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}
