//! Shared infrastructure: errors, response envelope, logging, time.

pub mod error;
pub mod logger;
pub mod result;
pub mod time;

pub use error::{ApiResponse, AppError, ok, ok_with_message};
pub use result::AppResult;
pub use time::now_millis;
