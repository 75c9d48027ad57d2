//! pep-core — wire contract for the PEP authorization daemon.
//!
//! The Hessian 1.0-subset envelope, the XACML object model, the mapping
//! between them, and the grid authorization vocabulary. Pure computation:
//! no I/O, no async. All other crates depend on this one.

pub mod codec;
pub mod hessian;
pub mod model;
pub mod profile;

pub use codec::{marshal_request, marshal_response, unmarshal_request, unmarshal_response};
pub use hessian::{DecodeError, EncodeError};
pub use model::{Decision, Request, Response};
