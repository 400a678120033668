pub mod orchestrate;
pub mod roster;
