pub mod request;
pub mod response;
pub mod server;

pub use crate::routing::Params;
pub use request::{parse_pairs, BodyData, Extra, Query, QueryValue, Request};
pub use response::{content_type_for, Body, BodyStream, Resource, Response};
pub use server::{install_signal_handler, Listening, Shutdown};
