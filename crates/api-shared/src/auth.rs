/// Header carrying the client's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing x-api-key header")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the expected key from configuration.
///
/// Returns `Ok(())` if the key matches, or an error if it is absent or wrong.
pub fn validate_api_key(expected_key: &str, provided_key: Option<&str>) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::Missing)?;

    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_passes() {
        assert_eq!(validate_api_key("s3cret", Some("s3cret")), Ok(()));
    }

    #[test]
    fn missing_or_wrong_key_fails() {
        assert_eq!(validate_api_key("s3cret", None), Err(AuthError::Missing));
        assert_eq!(
            validate_api_key("s3cret", Some("guess")),
            Err(AuthError::Invalid)
        );
        assert_eq!(validate_api_key("s3cret", Some("")), Err(AuthError::Invalid));
    }
}
