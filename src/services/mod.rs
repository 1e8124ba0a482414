pub mod pin;
pub mod room;
