use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Put => f.write_str("PUT"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First header with this name, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_value("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// How a response body is decoded, by content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeClass {
    /// `application/json` and `*+json`: parsed, falling back to text.
    Structured,
    /// `text/*`, XML and JavaScript.
    Text,
    /// `charset=binary` and everything else.
    Binary,
}

impl MimeClass {
    /// Classify a content type. A `charset=binary` parameter marks the body
    /// as binary whatever the media type; other parameters are ignored.
    pub fn of(content_type: &str) -> Self {
        let mut parts = content_type.split(';');
        let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let marked_binary = parts.any(|param| {
            param.split_once('=').is_some_and(|(name, value)| {
                name.trim().eq_ignore_ascii_case("charset")
                    && value.trim().trim_matches('"').eq_ignore_ascii_case("binary")
            })
        });
        if marked_binary {
            Self::Binary
        } else if essence == "application/json" || essence.ends_with("+json") {
            Self::Structured
        } else if essence.starts_with("text/")
            || essence == "application/xml"
            || essence.ends_with("+xml")
            || essence == "application/javascript"
        {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

/// A decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteData {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

/// A document as returned by the remote.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteDocument {
    pub data: RemoteData,
    pub mime_type: Option<String>,
    /// Remote revision token, taken from the `ETag` header.
    pub revision: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_classes() {
        assert_eq!(MimeClass::of("application/json"), MimeClass::Structured);
        assert_eq!(
            MimeClass::of("application/ld+json; charset=utf-8"),
            MimeClass::Structured
        );
        assert_eq!(MimeClass::of("Text/Plain"), MimeClass::Text);
        assert_eq!(MimeClass::of("image/svg+xml"), MimeClass::Text);
        assert_eq!(MimeClass::of("image/png"), MimeClass::Binary);
        assert_eq!(MimeClass::of("application/octet-stream"), MimeClass::Binary);
        assert_eq!(MimeClass::of("text/plain; charset=binary"), MimeClass::Binary);
        assert_eq!(MimeClass::of("application/json;Charset=\"BINARY\""), MimeClass::Binary);
        assert_eq!(MimeClass::of("text/plain; charset=utf-8"), MimeClass::Text);
    }

    #[test]
    fn headers_are_case_insensitive() {
        let resp = HttpResponse::new(200).header("Content-Type", "text/plain");
        assert_eq!(resp.content_type(), Some("text/plain"));
        let req = HttpRequest::new(Method::Get, "u").header("authorization", "Bearer t");
        assert_eq!(req.header_value("Authorization"), Some("Bearer t"));
    }
}
