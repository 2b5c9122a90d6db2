pub mod health;
pub mod diagnostics;
pub mod rooms;
pub mod not_found;

pub use health::*;
pub use diagnostics::*;
pub use rooms::*;
pub use not_found::*;
