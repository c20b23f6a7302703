//! Instance-name to source-symbol mangling.
//!
//! Generated code derives identifiers from user-chosen instance names, which
//! may contain characters illegal in a C identifier. The substitution table
//! below is fixed and deterministic so the same name always yields the same
//! symbol across generation runs. The mapping is injective in practice but
//! not in principle ("a b" and "a_b" collide); the code generator reports
//! collisions instead of silently merging them.

/// Escape an instance name into a legal C identifier.
///
/// ASCII alphanumerics and `_` pass through. Arithmetic characters map to
/// spelled-out words, everything else maps to `_`. A leading digit gets a
/// `_` prefix, and an empty name yields `"_"`.
///
/// ```
/// use parche_model::instance_symbol;
///
/// assert_eq!(instance_symbol("Osc 1"), "Osc_1");
/// assert_eq!(instance_symbol("mix*"), "mixstar");
/// assert_eq!(instance_symbol("2nd"), "_2nd");
/// ```
pub fn instance_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => out.push(ch),
            '*' => out.push_str("star"),
            '+' => out.push_str("plus"),
            '~' => out.push_str("tilde"),
            '/' => out.push_str("div"),
            '%' => out.push_str("mod"),
            _ => out.push('_'),
        }
    }
    if out.is_empty() {
        out.push('_');
    } else if out.as_bytes()[0].is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_escapes_to_underscore() {
        assert_eq!(instance_symbol("Osc 1"), "Osc_1");
    }

    #[test]
    fn mapping_is_stable_across_calls() {
        let first = instance_symbol("LFO ~2");
        let second = instance_symbol("LFO ~2");
        assert_eq!(first, second);
        assert_eq!(first, "LFO_tilde2");
    }

    #[test]
    fn arithmetic_characters_are_spelled_out() {
        assert_eq!(instance_symbol("a*b"), "astarb");
        assert_eq!(instance_symbol("a+b"), "aplusb");
        assert_eq!(instance_symbol("a/b"), "adivb");
    }

    #[test]
    fn leading_digit_is_prefixed() {
        assert_eq!(instance_symbol("1shot"), "_1shot");
    }

    #[test]
    fn empty_name_yields_placeholder() {
        assert_eq!(instance_symbol(""), "_");
    }
}
