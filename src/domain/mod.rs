pub mod course;
pub mod signup;

pub use course::*;
pub use signup::*;
