pub mod diagnostics;
pub mod error;
pub mod health;
pub mod ready;
pub mod rooms;

pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use ready::*;
pub use rooms::*;
