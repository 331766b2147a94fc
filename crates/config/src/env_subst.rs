/// Replace `${ENV_VAR}` and `${ENV_VAR:-default}` placeholders in raw config text.
///
/// Unset variables without a default are left as-is so the parse error (or
/// the validation diagnostic) points at the placeholder.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with a caller-supplied lookup, so tests never
/// touch the process environment.
pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            // Unterminated placeholder: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), default) {
            (false, Some(value), _) if !value.is_empty() || default.is_none() => {
                out.push_str(&value);
            },
            (false, _, Some(default)) => out.push_str(default),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}
