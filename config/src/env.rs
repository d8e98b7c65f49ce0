use std::env;

/// Replace every `${VAR}` with the variable's value. Unset variables expand
/// to nothing; an unterminated `${` is kept as written.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::expand_env_vars;

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(expand_env_vars("ghul-compiler"), "ghul-compiler");
    }

    #[test]
    fn test_known_variable_is_expanded() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env_vars("${PATH}/x"), format!("{path}/x"));
    }

    #[test]
    fn test_unset_variable_expands_to_nothing() {
        assert_eq!(
            expand_env_vars("a${GHUL_CONFIG_TEST_SURELY_UNSET}b"),
            "ab"
        );
    }

    #[test]
    fn test_unterminated_reference_is_kept() {
        assert_eq!(expand_env_vars("tail ${OOPS"), "tail ${OOPS");
    }

    #[test]
    fn test_empty_reference_is_dropped() {
        assert_eq!(expand_env_vars("x${}y"), "xy");
    }

    #[test]
    fn test_multibyte_text_survives() {
        assert_eq!(expand_env_vars("ünï${}cödé"), "ünïcödé");
    }
}
