use crate::types::vector::AuthenticationVector;

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    ZeroChallenge(&'static str),
    RepeatedChallenge,
    ZeroAnchorKey,
    ZeroTokenMac,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ZeroChallenge(field) => {
                write!(f, "Challenge {} is all zero", field)
            }
            ValidationError::RepeatedChallenge => {
                write!(f, "First and second challenge are identical")
            }
            ValidationError::ZeroAnchorKey => write!(f, "Anchor key is all zero"),
            ValidationError::ZeroTokenMac => write!(f, "Authentication token MAC is all zero"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Sanity checks the serving network runs on a vector before relaying it.
pub fn validate_authentication_vector(av: &AuthenticationVector) -> ValidationResult<()> {
    if av.first_challenge.is_zero() {
        return Err(ValidationError::ZeroChallenge("first"));
    }

    if av.second_challenge.is_zero() {
        return Err(ValidationError::ZeroChallenge("second"));
    }

    if av.first_challenge == av.second_challenge {
        return Err(ValidationError::RepeatedChallenge);
    }

    if av.kseaf.is_zero() {
        return Err(ValidationError::ZeroAnchorKey);
    }

    if av.autn.mac.iter().all(|b| *b == 0) {
        return Err(ValidationError::ZeroTokenMac);
    }

    Ok(())
}
