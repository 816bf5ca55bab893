pub mod common;
pub mod sql;
