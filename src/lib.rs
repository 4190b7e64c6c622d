//! Request parameter helpers for HTTP handlers: typed coercion of query
//! and JSON-body parameters, a declarative argument binder, subpath and
//! trailing-slash view helpers, resource traversal, settings parsing and
//! an aggregating authentication policy.

pub mod auth;
pub mod binder;
pub mod coerce;
pub mod error;
pub mod params;
pub mod request;
pub mod response;
pub mod route;
pub mod settings;
pub mod view;

pub use binder::{Binder, BoundArgs, BoundHandler};
pub use coerce::{coerce, FromParams, ParamValue, TypeDescriptor};
pub use error::Error;
pub use request::Request;
pub use response::Response;
