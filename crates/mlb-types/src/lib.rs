pub mod errors;
pub mod message;
pub mod problem;
pub mod request;
pub mod scope;

pub use errors::*;
pub use message::*;
pub use problem::*;
pub use request::*;
pub use scope::*;
