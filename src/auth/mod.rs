pub mod token;

pub use token::{validate_token, Claims};
