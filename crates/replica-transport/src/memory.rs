use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::warn;

use crate::error::TransportResult;
use crate::transport::HttpBackend;
use crate::types::{HttpRequest, HttpResponse, Method};

struct StoredDocument {
    body: Vec<u8>,
    content_type: String,
    etag: u64,
}

/// An in-process document server.
///
/// GET returns the stored bytes with `Content-Type` and `ETag`, PUT replaces
/// them and bumps the ETag, DELETE removes them. Missing documents answer 404.
/// With a required token, any request without the matching bearer header
/// answers 401.
#[derive(Default)]
pub struct InMemoryBackend {
    documents: RwLock<HashMap<String, StoredDocument>>,
    token: Option<String>,
    requests: Mutex<Vec<HttpRequest>>,
    injected: Mutex<Option<u16>>,
    etags: Mutex<u64>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject requests not carrying `Authorization: Bearer <token>`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Seed a document without going through a request.
    pub fn insert(&self, url: &str, body: impl Into<Vec<u8>>, content_type: &str) {
        let etag = self.next_etag();
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                url.to_string(),
                StoredDocument {
                    body: body.into(),
                    content_type: content_type.to_string(),
                    etag,
                },
            );
    }

    pub fn contains(&self, url: &str) -> bool {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(url)
    }

    /// Answer the next request with `status` and an empty body.
    pub fn fail_next(&self, status: u16) {
        *self.injected.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_etag(&self) -> u64 {
        let mut etags = self.etags.lock().unwrap_or_else(PoisonError::into_inner);
        *etags += 1;
        *etags
    }

    fn authorized(&self, request: &HttpRequest) -> bool {
        match &self.token {
            None => true,
            Some(token) => request
                .header_value("authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .is_some_and(|given| given == token),
        }
    }

    fn document_response(status: u16, doc: &StoredDocument) -> HttpResponse {
        HttpResponse::new(status)
            .header("Content-Type", doc.content_type.clone())
            .header("ETag", format!("\"{}\"", doc.etag))
            .body(doc.body.clone())
    }
}

#[async_trait]
impl HttpBackend for InMemoryBackend {
    async fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(status) = self
            .injected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Ok(HttpResponse::new(status));
        }
        if !self.authorized(&request) {
            warn!(url = %request.url, "rejected request without a valid token");
            return Ok(HttpResponse::new(401).body("unauthorized"));
        }

        let response = match request.method {
            Method::Get => {
                let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
                match documents.get(&request.url) {
                    Some(doc) => Self::document_response(200, doc),
                    None => HttpResponse::new(404),
                }
            }
            Method::Put => {
                let doc = StoredDocument {
                    content_type: request
                        .header_value("content-type")
                        .unwrap_or("application/octet-stream")
                        .to_string(),
                    body: request.body.unwrap_or_default(),
                    etag: self.next_etag(),
                };
                let response = Self::document_response(200, &doc);
                self.documents
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(request.url, doc);
                response
            }
            Method::Delete => {
                let removed = self
                    .documents
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&request.url);
                match removed {
                    Some(_) => HttpResponse::new(204),
                    None => HttpResponse::new(404),
                }
            }
        };
        Ok(response)
    }
}
