//! Database models, one module per table.

pub mod comment;
pub mod like;
pub mod metadata;
pub mod post;
pub mod stats;
pub mod user;

pub use comment::*;
pub use like::*;
pub use metadata::*;
pub use post::*;
pub use stats::*;
pub use user::*;
