pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_worker_url};
