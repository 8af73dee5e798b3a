//! Host side of the todo client: configuration, the ureq transport, the
//! cookie jar, and the interactive shell that drives `TodoController`.

pub mod config;
pub mod cookie_jar;
pub mod observability;
pub mod shell;
pub mod transport;

pub use cookie_jar::CookieJar;
pub use shell::Shell;
pub use transport::UreqTransport;
