pub mod consumer;
pub mod delivery;
pub mod retry;

pub use consumer::*;
pub use delivery::*;
pub use retry::*;
