use thiserror::Error;

use crate::models::ErrorKind;

/// Every failure the crawl core can produce.
///
/// Only [`ScoutError::Validation`] and [`ScoutError::Session`] end a session;
/// the rest are recovered where they occur and land in the error log.
#[derive(Error, Debug, Clone)]
pub enum ScoutError {
    #[error("invalid target: {0}")]
    Validation(String),

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("browser failed on {url}: {message}")]
    Render { url: String, message: String },

    #[error("could not parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("strategy {strategy} failed: {message}")]
    Strategy { strategy: String, message: String },

    #[error("session aborted: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        ScoutError::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn render(url: impl Into<String>, message: impl ToString) -> Self {
        ScoutError::Render {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn strategy(strategy: impl Into<String>, message: impl ToString) -> Self {
        ScoutError::Strategy {
            strategy: strategy.into(),
            message: message.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Validation(_) | ScoutError::Session(_))
    }

    /// Error-log category, or `None` for errors that are dropped silently.
    pub fn log_kind(&self) -> Option<ErrorKind> {
        match self {
            ScoutError::Network { .. } => Some(ErrorKind::Network),
            ScoutError::Render { .. } => Some(ErrorKind::Render),
            ScoutError::Strategy { .. } => Some(ErrorKind::Strategy),
            ScoutError::Session(_) => Some(ErrorKind::Session),
            ScoutError::Validation(_) | ScoutError::Parse { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ScoutError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        ScoutError::network(url, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_validation_and_session_are_fatal() {
        assert!(ScoutError::Validation("x".into()).is_fatal());
        assert!(ScoutError::Session("x".into()).is_fatal());
        assert!(!ScoutError::network("u", "timeout").is_fatal());
        assert!(!ScoutError::render("u", "no chrome").is_fatal());
        assert!(!ScoutError::strategy("sitemap", "boom").is_fatal());
    }

    #[test]
    fn test_clone_keeps_kind_and_message() {
        let err = ScoutError::render("https://example.com/", "tab crashed");
        let copy = err.clone();
        assert_eq!(copy.log_kind(), Some(ErrorKind::Render));
        assert_eq!(copy.to_string(), err.to_string());
    }

    #[test]
    fn test_parse_errors_are_not_logged() {
        let err = ScoutError::Parse {
            what: "json".into(),
            message: "eof".into(),
        };
        assert_eq!(err.log_kind(), None);
        assert_eq!(
            ScoutError::network("u", "reset").log_kind(),
            Some(ErrorKind::Network)
        );
    }
}
