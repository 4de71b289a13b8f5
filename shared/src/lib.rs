pub mod protocol;
pub mod stats;
pub mod entities;
pub mod items;
pub mod abilities;
pub mod world;
pub mod content;

pub use protocol::*;
pub use stats::*;
pub use entities::*;
pub use items::*;
pub use abilities::*;
pub use world::*;
pub use content::{Content, ContentError};
