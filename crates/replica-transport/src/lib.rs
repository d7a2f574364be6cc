//! Remote transport for the Replica store.
//!
//! [`RemoteTransport`] is the contract the synchronization loop talks to:
//! authenticated reads and writes of single documents by URL. The provided
//! [`HttpTransport`] interprets responses (missing documents, rejected
//! tokens, binary and structured bodies) over any [`HttpBackend`], so the
//! HTTP client itself stays pluggable. [`InMemoryBackend`] serves tests.

pub mod error;
pub mod memory;
pub mod transport;
pub mod types;

pub use error::{TransportError, TransportResult};
pub use memory::InMemoryBackend;
pub use transport::{interpret, HttpBackend, HttpTransport, RemoteTransport};
pub use types::{HttpRequest, HttpResponse, Method, MimeClass, RemoteData, RemoteDocument};
