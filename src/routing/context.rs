//! The parts of a request the router looks at.

use axum::http::{header, Method, Request};

/// Method, path, host and content type of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    host: Option<String>,
    content_type: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            host: None,
            content_type: None,
        }
    }

    /// Value of the `Host` header, port included when present.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Reads method, path, `Host` (falling back to the URI authority) and
    /// `Content-Type`. Header values that are not valid strings are ignored.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let header_value = |name: header::HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let host = header_value(header::HOST).or_else(|| {
            request
                .uri()
                .authority()
                .map(|authority| authority.as_str().to_string())
        });

        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            host,
            content_type: header_value(header::CONTENT_TYPE),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request_reads_headers() {
        let request = Request::builder()
            .method("PUT")
            .uri("/orders/7?expand=true")
            .header("Host", "shop.example.com:8443")
            .header("Content-Type", "application/json; charset=utf-8")
            .body(())
            .unwrap();

        let context = RequestContext::from_request(&request);
        assert_eq!(context.method(), &Method::PUT);
        assert_eq!(context.path(), "/orders/7");
        assert_eq!(context.host(), Some("shop.example.com:8443"));
        assert_eq!(context.content_type(), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn test_from_request_falls_back_to_authority() {
        let request = Request::builder()
            .uri("http://api.example.com/health")
            .body(())
            .unwrap();

        let context = RequestContext::from_request(&request);
        assert_eq!(context.host(), Some("api.example.com"));
        assert_eq!(context.content_type(), None);
    }
}
