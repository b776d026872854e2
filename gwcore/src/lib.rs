//! Shared wire types for the multi-tenant gateway: the token codec, the
//! policy rule shape, the worker wire protocol, the audit record, and the
//! request-time error taxonomy. Every other gateway crate depends on this
//! one; it depends on nothing gateway-specific itself.

pub mod audit;
pub mod error;
pub mod policy;
pub mod proto;
pub mod token;

pub use error::RequestError;
pub use token::Claims;
