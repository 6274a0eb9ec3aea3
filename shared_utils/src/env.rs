use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading settings from the process environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but its value could not be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: String, value: String },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Blank values are treated the same as unset ones.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    get_env_var_opt(name).ok_or_else(|| EnvError::Missing(name.to_string()))
}

/// Reads an optional environment variable. Blank values yield `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads and parses an environment variable, falling back to `default` when unset.
///
/// A value that is present but unparsable is an error rather than a silent fallback.
pub fn get_env_parse_or<T: FromStr>(name: &str, default: T) -> Result<T, EnvError> {
    match get_env_var_opt(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| EnvError::Invalid {
            name: name.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_var_is_an_error() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_MISSING") };
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert!(err.to_string().contains("SHARED_UTILS_TEST_MISSING"));
    }

    #[test]
    #[serial]
    fn blank_var_counts_as_unset() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BLANK", "   ") };
        assert!(get_env_var_opt("SHARED_UTILS_TEST_BLANK").is_none());
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_BLANK") };
    }

    #[test]
    #[serial]
    fn parse_or_uses_default_and_rejects_garbage() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
        assert_eq!(get_env_parse_or("SHARED_UTILS_TEST_NUM", 7u32).unwrap(), 7);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", "12") };
        assert_eq!(get_env_parse_or("SHARED_UTILS_TEST_NUM", 7u32).unwrap(), 12);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", "twelve") };
        assert!(matches!(
            get_env_parse_or("SHARED_UTILS_TEST_NUM", 7u32),
            Err(EnvError::Invalid { .. })
        ));
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
    }
}
