use serde::{Deserialize, Serialize};

/// Language strictness toggles shared by the parser, the checker and the evaluator.
///
/// The value is built once per session (from defaults, a config file or CLI flags) and passed
/// by reference to every component that needs it. Defaults favour interactive use:
/// semicolons are optional, boxing is allowed and access is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Options {
    /// Every statement must end with `;`, including the last one of a REPL entry.
    pub require_semicolon: bool,
    /// Disallow `x = 3` as an implicit declaration of an unknown top-level variable.
    pub require_variable_type: bool,
    /// Check private, protected and package access.
    pub enforce_all_access: bool,
    /// Check private access only.
    pub enforce_private_access: bool,
    /// Reject boxing and unboxing conversions.
    pub prohibit_boxing: bool,
    /// Reject casts to parameterized types that cannot be checked at runtime.
    pub prohibit_unchecked_casts: bool,
}

impl Options {
    /// Settings closest to the Java language specification.
    pub fn strict() -> Self {
        Self {
            require_semicolon: true,
            require_variable_type: true,
            enforce_all_access: true,
            enforce_private_access: true,
            prohibit_boxing: false,
            prohibit_unchecked_casts: false,
        }
    }

    #[inline]
    pub fn enforces_private_access(&self) -> bool {
        self.enforce_all_access || self.enforce_private_access
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_permissive() {
        let options = Options::default();
        assert!(!options.require_semicolon);
        assert!(!options.enforces_private_access());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let options: Options = toml::from_str("prohibit_boxing = true\n").unwrap();
        assert_eq!(
            options,
            Options {
                prohibit_boxing: true,
                ..Options::default()
            }
        );
    }
}
