pub mod macros;
pub mod signal;
