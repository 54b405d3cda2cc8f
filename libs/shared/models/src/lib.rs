pub mod alert;
pub mod check;
pub mod incident;
pub mod monitor;

pub use alert::*;
pub use check::*;
pub use incident::*;
pub use monitor::*;
