pub mod errors;
pub mod responses;

pub use errors::*;
pub use responses::*;
