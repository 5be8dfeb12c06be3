use crate::{cookies, passwd, tokens, verification};
use thiserror::Error;

/// Outcome errors of the authentication workflow.
///
/// Everything that would tell a client whether an identity exists is folded
/// into [`AuthError::Failed`]; the specific reason is only logged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    InvalidInput(&'static str),
    #[error("failed authentication")]
    Failed,
    #[error("verification denied")]
    Denied,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<tokens::Error> for AuthError {
    fn from(err: tokens::Error) -> Self {
        if err.is_verification_failure() {
            Self::Failed
        } else {
            Self::internal(err)
        }
    }
}

impl From<passwd::Error> for AuthError {
    fn from(err: passwd::Error) -> Self {
        Self::internal(err)
    }
}

impl From<verification::Error> for AuthError {
    fn from(err: verification::Error) -> Self {
        Self::internal(err)
    }
}

impl From<cookies::Error> for AuthError {
    fn from(err: cookies::Error) -> Self {
        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_collapse_to_generic_failure() {
        let err = AuthError::from(tokens::Error::Expired);
        assert!(matches!(err, AuthError::Failed));
        assert_eq!(err.to_string(), "failed authentication");

        let err = AuthError::from(tokens::Error::NoSigningKey);
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
