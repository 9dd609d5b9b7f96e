//! HTTP plumbing: request descriptors, the transport seam and the resilient
//! executor that every backend call goes through.

mod executor;
mod request;
mod transport;

pub use executor::{
    AttemptContext, Failure, RequestEvent, RequestExecutor, RequestState, RetryPolicy, transition,
};
pub use request::{
    ApiRequest, ApiResponse, AUTHORIZATION, CONTENT_TYPE, FilePart, HttpMethod, RequestBody,
    parse_api_error,
};
pub use transport::{GatedTransport, ReqwestTransport, Transport, TransportError};
