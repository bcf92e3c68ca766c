//! API handlers organized by resource type.

mod books;
mod catalog;
mod logs;
mod system;

pub use books::*;
pub use catalog::*;
pub use logs::*;
pub use system::*;
