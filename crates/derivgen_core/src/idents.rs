//! Identifier helpers for emitted C# text.

/// Reserved C# keywords. An identifier equal to one of these must be escaped with `@`.
pub const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class", "const",
    "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event", "explicit", "extern",
    "false", "finally", "fixed", "float", "for", "foreach", "goto", "if", "implicit", "in", "int", "interface",
    "internal", "is", "lock", "long", "namespace", "new", "null", "object", "operator", "out", "override",
    "params", "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true", "try", "typeof",
    "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile", "while",
];

pub fn is_keyword(s: &str) -> bool {
    CSHARP_KEYWORDS.contains(&s)
}

/// Turn arbitrary display text (`"Ignore Raycast"`, `"2D Lights"`) into a valid identifier.
///
/// Characters that cannot appear in an identifier are dropped and the following letter is upper-cased,
/// a leading digit gets an `_` prefix, and keywords are escaped. Returns `None` when nothing usable
/// remains.
pub fn sanitize(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut upper_next = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            if upper_next {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = !out.is_empty();
        }
    }
    if out.is_empty() {
        return None;
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if is_keyword(&out) {
        out.insert(0, '@');
    }
    Some(out)
}

/// Lower-camel-case form used for generated backing fields (`Rigidbody` -> `rigidbody`).
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
