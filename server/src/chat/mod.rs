pub mod delivery;
pub mod messages;
pub mod presence;
