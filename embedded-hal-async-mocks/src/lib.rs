pub mod delay;
pub mod digital;
