pub mod args;
pub mod formatter;
pub mod handler;
