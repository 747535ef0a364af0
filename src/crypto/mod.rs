pub mod commitment;
pub mod hash;
