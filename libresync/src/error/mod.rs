//! Error types for Resync
//!
//! Every failure a synchronization run can hit is expressed as a
//! [`ResyncError`]. Errors raised inside a single image's transaction are
//! captured by the scheduler and reported per item; they never abort the run.

use thiserror::Error;


/// Main error type for Resync operations
#[derive(Error, Debug)]
pub enum ResyncError {
    /// The image reference could not be parsed.
    #[error("Malformed image reference '{slug}': {reason}")]
    MalformedReference { slug: String, reason: String },

    /// The registry did not advertise a usable bearer-token endpoint.
    #[error("Authentication endpoint discovery failed for {registry}: {message}")]
    AuthDiscovery { registry: String, message: String },

    /// The token endpoint did not hand out a pull token.
    #[error("Could not get auth token for '{reference}' (status: {status_code:?}): {message}")]
    TokenFetch {
        reference: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The manifest request did not yield a content digest.
    #[error("Could not fetch remote digest for '{reference}' (status: {status_code:?}): {message}")]
    DigestFetch {
        reference: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A local image store operation (inspect, pull, tag, remove, history) failed.
    #[error("Failed to {operation} '{reference}': {message}")]
    LocalStore {
        operation: String,
        reference: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The freshly pulled image does not carry the digest the registry advertised.
    #[error("Failed to refresh image: {reference} (expected {expected:?}, found {actual:?})")]
    RefreshFailed {
        reference: String,
        expected: String,
        actual: String,
    },

    /// The platform secure store could not be queried.
    #[error("Secure store lookup for '{service}' failed: {message}")]
    SecureStore { service: String, message: String },

    /// Network-related errors (connection, timeout, DNS, retryable statuses)
    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid config file, missing settings)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Resync operations
pub type Result<T> = std::result::Result<T, ResyncError>;

impl ResyncError {
    /// Creates a new malformed reference error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    ///
    /// let err = ResyncError::malformed_reference("", "empty reference");
    /// assert!(matches!(err, ResyncError::MalformedReference { .. }));
    /// ```
    pub fn malformed_reference<S: Into<String>, R: Into<String>>(slug: S, reason: R) -> Self {
        Self::MalformedReference {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new authentication endpoint discovery error.
    pub fn auth_discovery<S: Into<String>, M: Into<String>>(registry: S, message: M) -> Self {
        Self::AuthDiscovery {
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new token fetch error.
    pub fn token_fetch<S: Into<String>, M: Into<String>>(
        reference: S,
        message: M,
        status_code: Option<u16>,
    ) -> Self {
        Self::TokenFetch {
            reference: reference.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new digest fetch error.
    pub fn digest_fetch<S: Into<String>, M: Into<String>>(
        reference: S,
        message: M,
        status_code: Option<u16>,
    ) -> Self {
        Self::DigestFetch {
            reference: reference.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new local store error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    ///
    /// let err = ResyncError::local_store("pull", "redis:6", "exit status 1");
    /// assert_eq!(err.to_string(), "Failed to pull 'redis:6': exit status 1");
    /// ```
    pub fn local_store<O, R, M>(operation: O, reference: R, message: M) -> Self
    where
        O: Into<String>,
        R: Into<String>,
        M: Into<String>,
    {
        Self::LocalStore {
            operation: operation.into(),
            reference: reference.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new local store error with a source error.
    pub fn local_store_with_source<O, R, M, E>(operation: O, reference: R, message: M, source: E) -> Self
    where
        O: Into<String>,
        R: Into<String>,
        M: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::LocalStore {
            operation: operation.into(),
            reference: reference.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new refresh verification error.
    pub fn refresh_failed<R, E, A>(reference: R, expected: E, actual: A) -> Self
    where
        R: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        Self::RefreshFailed {
            reference: reference.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new secure store error.
    pub fn secure_store<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::SecureStore {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a new network error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    ///
    /// let err = ResyncError::network("connection refused");
    /// assert!(matches!(err, ResyncError::Network { .. }));
    /// ```
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
            source: None,
        }
    }

    /// Creates a new network error carrying the HTTP status that caused it.
    pub fn network_status<S: Into<String>>(message: S, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
            source: None,
        }
    }

    /// Creates a new network error with a source error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    /// use std::io;
    ///
    /// let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
    /// let err = ResyncError::network_with_source("failed to connect", io_err);
    /// assert!(matches!(err, ResyncError::Network { .. }));
    /// ```
    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            status_code: None,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    ///
    /// let err = ResyncError::config("invalid config file", Some("/path/to/config.yaml"));
    /// assert!(matches!(err, ResyncError::Config { .. }));
    /// ```
    pub fn config<S: Into<String>>(message: S, path: Option<S>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, E>(message: S, path: Option<S>, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true when retrying the same call may succeed.
    ///
    /// Transport failures, rate limiting and server-side errors are transient.
    /// Protocol violations and local store failures are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::error::ResyncError;
    ///
    /// assert!(ResyncError::network_status("bad gateway", 502).is_transient());
    /// assert!(!ResyncError::network_status("not found", 404).is_transient());
    /// assert!(!ResyncError::local_store("pull", "redis", "denied").is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network {
                status_code: None, ..
            } => true,
            Self::Network {
                status_code: Some(code),
                ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}
