pub mod pick;
pub mod sequencer;
pub mod state;
pub mod team;
