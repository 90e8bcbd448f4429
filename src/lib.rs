pub mod h2;
pub mod request;
pub mod session;
pub mod stream;
pub mod types;
pub mod utils;

pub use request::PushRequest;
pub use session::{Session, SessionReport};
pub use types::*;
