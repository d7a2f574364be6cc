use async_trait::async_trait;
use tracing::debug;

use replica_types::Body;

use crate::error::{TransportError, TransportResult};
use crate::types::{HttpRequest, HttpResponse, Method, MimeClass, RemoteData, RemoteDocument};

/// Transport interface for the remote peer.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Fetch a document. A missing document is `Ok(None)`, a rejected token
    /// is [`TransportError::Unauthorized`].
    async fn get(&self, url: &str, token: &str) -> TransportResult<Option<RemoteDocument>>;

    /// Store a document, or delete it when `value` is `None`. Responses are
    /// interpreted as for [`get`](RemoteTransport::get).
    async fn set(
        &self,
        url: &str,
        value: Option<Body>,
        mime_type: &str,
        token: &str,
    ) -> TransportResult<Option<RemoteDocument>>;
}

/// The HTTP client underneath an [`HttpTransport`].
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse>;
}

/// [`RemoteTransport`] over an [`HttpBackend`], sending bearer tokens.
pub struct HttpTransport<B> {
    backend: B,
}

impl<B: HttpBackend> HttpTransport<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn send(&self, request: HttpRequest) -> TransportResult<Option<RemoteDocument>> {
        let (method, url) = (request.method, request.url.clone());
        let response = self.backend.send(request).await?;
        debug!(%method, url, status = response.status, "remote responded");
        interpret(response)
    }
}

#[async_trait]
impl<B: HttpBackend> RemoteTransport for HttpTransport<B> {
    async fn get(&self, url: &str, token: &str) -> TransportResult<Option<RemoteDocument>> {
        self.send(authorized(Method::Get, url, token)).await
    }

    async fn set(
        &self,
        url: &str,
        value: Option<Body>,
        mime_type: &str,
        token: &str,
    ) -> TransportResult<Option<RemoteDocument>> {
        let request = match value {
            None => authorized(Method::Delete, url, token),
            Some(body) => authorized(Method::Put, url, token)
                .header("Content-Type", mime_type)
                .body(body.as_bytes().to_vec()),
        };
        self.send(request).await
    }
}

fn authorized(method: Method, url: &str, token: &str) -> HttpRequest {
    HttpRequest::new(method, url).header("Authorization", format!("Bearer {token}"))
}

/// Map a response to the transport contract.
///
/// - 404 and 204: `Ok(None)`
/// - 401: [`TransportError::Unauthorized`]
/// - other non-2xx: [`TransportError::Status`]
/// - 2xx: the body decoded by [`MimeClass`]; structured bodies that fail to
///   parse come back as text
pub fn interpret(response: HttpResponse) -> TransportResult<Option<RemoteDocument>> {
    match response.status {
        404 | 204 => return Ok(None),
        401 => return Err(TransportError::Unauthorized),
        _ if !response.is_success() => {
            return Err(TransportError::Status {
                status: response.status,
                reason: String::from_utf8_lossy(&response.body).into_owned(),
            })
        }
        _ => {}
    }

    let mime_type = response.content_type().map(str::to_string);
    let revision = response.header_value("etag").map(str::to_string);
    let data = match mime_type.as_deref().map(MimeClass::of) {
        Some(MimeClass::Binary) => RemoteData::Binary(response.body),
        Some(MimeClass::Structured) => match serde_json::from_slice(&response.body) {
            Ok(value) => RemoteData::Json(value),
            Err(_) => text_or_binary(response.body),
        },
        Some(MimeClass::Text) | None => text_or_binary(response.body),
    };
    Ok(Some(RemoteDocument {
        data,
        mime_type,
        revision,
    }))
}

fn text_or_binary(body: Vec<u8>) -> RemoteData {
    match String::from_utf8(body) {
        Ok(text) => RemoteData::Text(text),
        Err(e) => RemoteData::Binary(e.into_bytes()),
    }
}
