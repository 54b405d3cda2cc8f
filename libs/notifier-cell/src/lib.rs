pub mod channels;
pub mod error;
pub mod models;
pub mod services;

pub use channels::*;
pub use error::*;
pub use models::*;
pub use services::*;
