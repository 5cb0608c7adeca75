//! NocoBase workflow node.
//!
//! Translates node operations (list, get, create, upload, workflow
//! triggers, ...) into NocoBase REST requests and adapts the responses.
//!
//! - [`builder`] -- pure mapping from [`OperationRequest`] to
//!   [`HttpRequestDescriptor`].
//! - [`upload`] -- filename / MIME resolution and multipart assembly.
//! - [`transport`] -- the seam that performs HTTP I/O (`reqwest` by default).
//! - [`client`] -- executes requests, including the workflow pre-check and
//!   the custom-collection post-filter.
//! - [`bulk`] -- sequential bulk record creation.
//! - [`search`] -- dropdown search helpers.
//! - [`node`] -- the per-item loop the workflow host drives.

pub mod builder;
pub mod bulk;
pub mod client;
pub mod credentials;
pub mod node;
pub mod operation;
pub mod request;
pub mod search;
pub mod transport;
pub mod upload;

pub use builder::build;
pub use client::NocoBaseClient;
pub use credentials::NocoBaseCredentials;
pub use operation::{Operation, OperationRequest};
pub use request::HttpRequestDescriptor;
