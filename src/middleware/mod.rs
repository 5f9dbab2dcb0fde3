pub mod auth;
pub mod pipeline;
pub mod response;

pub use auth::{bearer_token_middleware, verify_token_middleware, AuthorizedCaller, BearerCredential};
pub use pipeline::{Pipeline, Stage};
pub use response::{ApiResponse, ApiResult};
