//! Client-side wiring around `chirp-core`: the transport boundary,
//! the store facade the UI talks to, and the session lifecycle that
//! owns the cache.
pub mod mock;
pub mod session;
pub mod store;
pub mod transport;

pub use session::Session;
pub use store::Store;
pub use transport::{ApiError, Transport};
