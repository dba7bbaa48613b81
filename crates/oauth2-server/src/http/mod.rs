//! Transport-neutral request and response model.
//!
//! Hosts translate their HTTP framework's request into a [`Request`] and render
//! the returned [`Response`]; grant logic never sees the transport.

mod request;
mod response;

pub use request::{BasicCredentials, Request};
pub use response::{Response, TokenPayload};
