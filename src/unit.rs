//! Unit naming and classification.
//!
//! A unit is one compiled program type. Every registry key is a canonical dotted unit name as
//! produced by [`normalize_unit_name`], so the many spellings a host may hand out for the same
//! type (internal names, array descriptors, source-style array suffixes) collapse to one key.

use strum::{AsRefStr, Display, EnumString};

/// The kind of a unit as it appears in a keep rule.
///
/// Captured when a unit is first observed so the emitter never has to resolve it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum UnitKind {
    /// An ordinary class, including abstract classes and records
    Class,
    /// An interface or annotation type
    Interface,
    /// An enumeration
    Enum,
}

/// Canonicalize a unit name into its registry key.
///
/// Removes array markers in both descriptor form (`[Lcom/foo/Bar;`, `[[I`) and source form
/// (`com.foo.Bar[]`), trailing `;` terminators, and converts internal `/` separators to `.`.
/// The function is idempotent.
///
/// # Examples
///
/// ```rust
/// use keepscope::unit::normalize_unit_name;
///
/// assert_eq!(normalize_unit_name("[Lcom/foo/Bar;"), "com.foo.Bar");
/// assert_eq!(normalize_unit_name("com.foo.Bar[][]"), "com.foo.Bar");
/// assert_eq!(normalize_unit_name("com.foo.Bar"), "com.foo.Bar");
/// ```
#[must_use]
pub fn normalize_unit_name(name: &str) -> String {
    let mut current = name;
    loop {
        let stripped = strip_array_forms(current);
        if stripped.len() == current.len() {
            break;
        }
        current = stripped;
    }

    current.replace('/', ".")
}

fn strip_array_forms(name: &str) -> &str {
    let mut name = name;

    let element = name.trim_start_matches('[');
    if element.len() != name.len() {
        name = element.strip_prefix('L').unwrap_or(element);
    }

    name = name.trim_end_matches(';');
    while let Some(inner) = name.strip_suffix("[]") {
        name = inner;
    }

    name
}

/// Convert an internal (`/` separated) name to dotted form without any other normalization.
#[must_use]
pub fn to_dotted(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn array_forms_collapse() {
        let forms = [
            "com.foo.Bar",
            "com/foo/Bar",
            "[Lcom.foo.Bar;",
            "[[Lcom/foo/Bar;",
            "com.foo.Bar[]",
            "com.foo.Bar[][]",
            "com.foo.Bar;",
            "[Lcom.foo.Bar[];",
        ];

        for form in forms {
            assert_eq!(normalize_unit_name(form), "com.foo.Bar", "form {form}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "[L[Foo;",
            "[[I",
            "Lcom.Plain",
            "a.b.C$Inner",
            "[]",
            ";;",
            "",
            "x.Y[];[]",
        ];

        for input in inputs {
            let once = normalize_unit_name(input);
            assert_eq!(normalize_unit_name(&once), once, "input {input}");
        }
    }

    #[test]
    fn plain_names_keep_leading_l() {
        assert_eq!(normalize_unit_name("Lambda"), "Lambda");
        assert_eq!(normalize_unit_name("[LLambda;"), "Lambda");
    }

    #[test]
    fn kind_renders_lowercase() {
        assert_eq!(UnitKind::Class.to_string(), "class");
        assert_eq!(UnitKind::Interface.as_ref(), "interface");
        assert_eq!(UnitKind::from_str("enum").unwrap(), UnitKind::Enum);
    }
}
