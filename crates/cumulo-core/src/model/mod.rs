pub mod user;

pub use user::{Server, ServerVersion, User};
