pub mod docctx;
pub mod engine;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod room_table;
pub mod stats;
