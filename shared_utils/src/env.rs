use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// A variable that is set but empty (or only whitespace) counts as missing,
/// since an empty credential is never what the caller wants.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_optional_env_var(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Reads an environment variable, returning `None` when it is unset or blank.
pub fn get_optional_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "SHARED_UTILS_TEST_SURELY_UNSET_VARIABLE";

    #[test]
    fn missing_variable_reports_its_name() {
        let err = get_env_var(UNSET).unwrap_err();
        assert_eq!(err.0, UNSET);
        assert!(err.to_string().contains(UNSET));
    }

    #[test]
    fn optional_lookup_of_unset_variable_is_none() {
        assert!(get_optional_env_var(UNSET).is_none());
    }

    #[test]
    fn present_variable_is_returned() {
        // PATH is set for any process cargo spawns.
        assert!(get_env_var("PATH").is_ok());
    }
}
