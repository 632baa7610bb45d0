use reqwest::Method;
use serde::Serialize;

use super::ApiError;

/// An outbound call, described independently of the transport so it can be
/// dispatched more than once.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/courses/sessions/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Join a base URL and a request path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api", "/auth/login/"), "http://h/api/auth/login/");
        assert_eq!(join_url("http://h/api/", "auth/login/"), "http://h/api/auth/login/");
        assert_eq!(join_url("http://h/api//", "//courses/"), "http://h/api/courses/");
    }

    #[test]
    fn test_builder() {
        let req = ApiRequest::post("/courses/bookings/")
            .query("page", "2")
            .json(&serde_json::json!({"session": 5}))
            .expect("json body");
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(req.body, Some(serde_json::json!({"session": 5})));
    }
}
