//! Client core for the todo service: session handling, the remote API
//! contract, and the controller that keeps the view in step with the server.
//!
//! # Overview
//! `ApiClient` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network (host-does-IO pattern). `TodoController`
//! drives those through a host-provided `Transport`, owns the `Session`
//! token, and renders results into a `View` the host displays.
//!
//! # Design
//! - `ApiClient` is stateless; it holds only `base_url`.
//! - Each remote operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit.
//! - The token is an explicit `Session` value, not ambient storage.
//! - The todo list in the `View` is replaced wholesale by every successful
//!   list response; there is no local reconciliation.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod controller;
pub mod error;
pub mod http;
pub mod session;
pub mod types;
pub mod view;

pub use client::ApiClient;
pub use controller::{AuthAction, CompletionState, Operation, TodoController};
pub use error::{ApiError, ClientError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use session::{AuthToken, Session};
pub use types::{Credentials, NewTodo, Todo, TodoId, UpdateTodo};
pub use view::{Notice, NoticeLevel, Screen, View};
