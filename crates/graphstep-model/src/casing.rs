//! Label casing helpers used by model transformations.

/// Lower-case the leading upper-case run of an identifier.
///
/// `Person` → `person`, `WorksFor` → `worksFor`, `HTTPEndpoint` → `httpEndpoint`.
pub fn to_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());

    for (i, c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.extend(chars[i..].iter());
            return out;
        }
        // Keep the last capital of a run when it starts the next word.
        let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
        if i > 0 && next_is_lower {
            out.extend(chars[i..].iter());
            return out;
        }
        out.extend(c.to_lowercase());
    }
    out
}
