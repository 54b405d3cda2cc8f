pub mod alerts;
pub mod evaluator;
pub mod executor;
pub mod incident;
pub mod worker;

pub use alerts::*;
pub use evaluator::*;
pub use executor::*;
pub use incident::*;
pub use worker::*;
