use async_trait::async_trait;
use std::collections::HashMap;

/// Extra STOMP headers to send with the CONNECT frame
pub type Headers = HashMap<String, String>;

/// Trait for providing CONNECT headers dynamically
///
/// Called on every `connect()`, so credentials or tokens that rotate
/// between sessions are picked up without rebuilding the client.
///
/// # Example
/// ```ignore
/// struct Credentials {
///     login: String,
///     passcode: String,
/// }
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for Credentials {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = HashMap::new();
///         headers.insert("login".to_string(), self.login.clone());
///         headers.insert("passcode".to_string(), self.passcode.clone());
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers to merge into the CONNECT frame
    ///
    /// `accept-version`, `host` and `heart-beat` are set by the client and
    /// cannot be overridden here.
    async fn get_headers(&self) -> Headers;
}

/// A header provider that adds nothing
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn get_headers(&self) -> Headers {
        HashMap::new()
    }
}

/// Fixed login/passcode credentials
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    login: String,
    passcode: String,
}

impl StaticCredentials {
    pub fn new(login: impl Into<String>, passcode: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            passcode: passcode.into(),
        }
    }
}

#[async_trait]
impl HeaderProvider for StaticCredentials {
    async fn get_headers(&self) -> Headers {
        let mut headers = HashMap::new();
        headers.insert("login".to_string(), self.login.clone());
        headers.insert("passcode".to_string(), self.passcode.clone());
        headers
    }
}
