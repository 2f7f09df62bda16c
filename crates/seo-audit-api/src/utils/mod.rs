pub mod error;
pub mod logger;
pub mod response;
pub mod validation;

pub use error::ApiError;
pub use response::{ok, ApiResponse, ApiResult};
pub use validation::{FieldErrors, ValidatedJson, ValidatedQuery};
