//! Application services: catalog rules applied over repository traits.

pub mod books;
pub mod catalog;
pub mod error;
pub mod logs;
pub mod repos;
pub mod server_info;
pub mod stats;
pub mod visitors;
