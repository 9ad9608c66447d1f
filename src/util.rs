//! Shared utility helpers.

/// Case-insensitive equality using simple lowercase folding.
///
/// ASCII inputs are compared without allocating.
#[inline]
pub fn eq_ci(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Key used by every case-insensitive index. Must agree with [`eq_ci`].
#[inline]
pub fn fold_case(s: &str) -> String {
    if s.is_ascii() {
        s.to_ascii_lowercase()
    } else {
        // Per char, like eq_ci: str::to_lowercase maps a final sigma to ς
        s.chars().flat_map(char::to_lowercase).collect()
    }
}

/// Split `Namespace.Name` at the last dot.
///
/// Returns `None` when there is no namespace part.
#[inline]
pub fn split_qualified_name(full_name: &str) -> Option<(&str, &str)> {
    let pos = full_name.rfind('.')?;
    if pos == 0 || pos + 1 == full_name.len() {
        return None;
    }
    Some((&full_name[..pos], &full_name[pos + 1..]))
}

/// Join a namespace and a name into an identity string.
#[inline]
pub fn qualify(namespace: &str, name: &str) -> String {
    let mut full = String::with_capacity(namespace.len() + name.len() + 1);
    full.push_str(namespace);
    full.push('.');
    full.push_str(name);
    full
}

/// Render a schema version the way version mismatch messages print it (`2.0`, `3.0`).
pub fn format_version(version: f64) -> String {
    if version.fract() == 0.0 {
        format!("{:.1}", version)
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_ci() {
        assert!(eq_ci("Customer", "CUSTOMER"));
        assert!(!eq_ci("Straße", "STRASSE"));
        assert!(eq_ci("Éclair", "éCLAIR"));
        assert!(!eq_ci("Order", "Orders"));
    }

    #[test]
    fn test_fold_case_agrees_with_eq_ci() {
        for (a, b) in [("Order", "ORDER"), ("Éclair", "éclair"), ("x", "X"), ("ΟΔΟΣ", "οδοσ")] {
            assert_eq!(fold_case(a), fold_case(b));
            assert!(eq_ci(a, b));
        }
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(split_qualified_name("NS.Sub.Type"), Some(("NS.Sub", "Type")));
        assert_eq!(split_qualified_name("Type"), None);
        assert_eq!(split_qualified_name(".Type"), None);
        assert_eq!(split_qualified_name("NS."), None);
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(2.0), "2.0");
        assert_eq!(format_version(1.1), "1.1");
    }
}
