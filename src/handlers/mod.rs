//! Resource handlers bound to the API endpoints.
//!
//! Constructors take only what the handler uses: `XHandler::new([config], [decoder], [writer])`.
//! Handlers that touch storage keep a clone of the shared `AppState`; none see routing details.

pub mod project;
pub mod user;
