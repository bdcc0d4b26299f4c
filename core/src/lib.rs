pub mod error;
pub mod grading;
pub mod lang;
pub mod repair;
pub mod sanitize;
