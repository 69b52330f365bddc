// Input sources.

pub mod lirc;

pub use lirc::LircSocketListener;
