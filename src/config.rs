use crate::{Error, Result, Value};

/// Policy options, validated against a fixed set of recognized keys.
///
/// - `repo`: name of the repository collaborator used by query compilers.
///   The rule engine stores it and never dereferences it.
/// - `load_associations`: whether collaborators should load relations before
///   handing resources over for evaluation. Defaults to `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    repo: Option<String>,
    load_associations: bool,
}

impl Config {
    pub const OPTIONS: [&'static str; 2] = ["repo", "load_associations"];

    /// Builds a configuration from `(key, value)` options.
    ///
    /// Fails on the first unrecognized key or mistyped value.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            config.set(key.as_ref(), value.into())?;
        }
        Ok(config)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        match key {
            "repo" => {
                self.repo = match value {
                    Value::Null => None,
                    Value::Str(repo) => Some(repo),
                    other => return Err(invalid(key, "expected a name or nil", &other)),
                }
            }
            "load_associations" => {
                self.load_associations = value
                    .as_bool()
                    .ok_or_else(|| invalid(key, "expected a boolean", &value))?;
            }
            _ => return Err(Error::UnknownOption { key: key.into() }),
        }
        Ok(())
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn load_associations(&self) -> bool {
        self.load_associations
    }
}

fn invalid(key: &str, expected: &str, actual: &Value) -> Error {
    Error::InvalidOption {
        key: key.into(),
        reason: format!("{}, got {}", expected, actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let config = Config::from_options(Vec::<(&str, Value)>::new()).unwrap();

        assert_eq!(None, config.repo());
        assert!(!config.load_associations());
    }

    #[test]
    fn recognized_options() {
        let config = Config::from_options(vec![
            ("repo", Value::from("Blog.Repo")),
            ("load_associations", Value::from(true)),
        ])
        .unwrap();

        assert_eq!(Some("Blog.Repo"), config.repo());
        assert!(config.load_associations());
    }

    #[test]
    fn unrecognized_option_is_an_error() {
        assert_matches!(
            Config::from_options(vec![("preload", true)]),
            Err(Error::UnknownOption { key }) if key == "preload"
        );
    }

    #[test]
    fn mistyped_option_is_an_error() {
        assert_matches!(
            Config::from_options(vec![("load_associations", "yes")]),
            Err(Error::InvalidOption { key, .. }) if key == "load_associations"
        );
        assert_matches!(
            Config::from_options(vec![("repo", 1)]),
            Err(Error::InvalidOption { key, .. }) if key == "repo"
        );
    }
}
