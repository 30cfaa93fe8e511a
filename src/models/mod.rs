pub mod magic_link;
pub mod user;

pub use magic_link::{MagicLink, TokenState};
pub use user::{User, UserRole};
