pub mod library;
pub mod shared;

pub use library::TestLibrary;
pub use shared::SharedLibrary;
