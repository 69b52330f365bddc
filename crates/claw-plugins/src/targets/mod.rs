// Controllable devices.

pub mod linux;
pub mod onkyo;
pub mod plex;

pub use linux::LinuxHost;
pub use onkyo::OnkyoReceiver;
pub use plex::PlexTarget;
