//! Email syntax validation and input sanitization.

/// Permissive syntactic email check: non-empty local part, a single `@`,
/// a domain containing at least one `.`, and no whitespace anywhere.
///
/// Deliberately does not verify deliverability or domain existence.
/// Callers must trim the input first.
pub fn is_valid_email(input: &str) -> bool {
    if input.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // The dot must separate non-empty domain labels.
    match domain.split_once('.') {
        Some((head, tail)) => !head.is_empty() && !tail.is_empty(),
        None => false,
    }
}

/// Escapes HTML metacharacters so the value stays inert if it is ever
/// rendered as markup downstream. Validation operates on the raw trimmed
/// string; sanitization happens just before transport.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
