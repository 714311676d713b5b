pub mod emit;
pub mod trace;
pub mod version;
