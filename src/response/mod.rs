//! Response envelope model and the shared success/failure classification.

pub mod envelope;
pub mod validator;

pub use envelope::{
    DataResponse, ErrorEntry, Payload, ResponseEnvelope, DECODE_ERROR_KEY, TRANSPORT_ERROR_KEY,
};
pub use validator::{Classification, ResponseValidator, UserFacingError, DEFAULT_AUTH_ERROR_KEYS};
