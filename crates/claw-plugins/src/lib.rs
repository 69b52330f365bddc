// claw-plugins: Concrete listeners and targets for the claw router.

pub mod error;
pub mod listeners;
pub mod targets;
pub mod transport;
pub mod wol;

pub use error::Error;
pub use listeners::LircSocketListener;
pub use targets::{LinuxHost, OnkyoReceiver, PlexTarget};
pub use transport::TransportConfig;

use claw_core::{CoreError, ListenerRegistry, TargetRegistry};

/// Register every built-in listener type.
pub fn register_listeners(registry: &mut ListenerRegistry) -> Result<(), CoreError> {
    registry.register(listeners::lirc::PLUGIN_TYPE, LircSocketListener::create)
}

/// Register every built-in target type.
pub fn register_targets(registry: &mut TargetRegistry) -> Result<(), CoreError> {
    registry.register(targets::onkyo::PLUGIN_TYPE, OnkyoReceiver::create)?;
    registry.register(targets::plex::PLUGIN_TYPE, PlexTarget::create)?;
    registry.register(targets::linux::PLUGIN_TYPE, LinuxHost::create)
}

/// Register every built-in target type with factories that start no
/// background work. Targets built this way still send commands.
pub fn register_offline_targets(registry: &mut TargetRegistry) -> Result<(), CoreError> {
    registry.register(targets::onkyo::PLUGIN_TYPE, OnkyoReceiver::create)?;
    registry.register(targets::plex::PLUGIN_TYPE, PlexTarget::create_offline)?;
    registry.register(targets::linux::PLUGIN_TYPE, LinuxHost::create)
}

/// Fresh registries holding every built-in plugin.
pub fn default_registries() -> Result<(ListenerRegistry, TargetRegistry), CoreError> {
    let mut listeners = ListenerRegistry::listeners();
    register_listeners(&mut listeners)?;
    let mut targets = TargetRegistry::targets();
    register_targets(&mut targets)?;
    Ok((listeners, targets))
}

/// Like [`default_registries`], with targets from
/// [`register_offline_targets`].
pub fn offline_registries() -> Result<(ListenerRegistry, TargetRegistry), CoreError> {
    let mut listeners = ListenerRegistry::listeners();
    register_listeners(&mut listeners)?;
    let mut targets = TargetRegistry::targets();
    register_offline_targets(&mut targets)?;
    Ok((listeners, targets))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_registries_know_builtin_types() {
        let (listeners, targets) = default_registries().unwrap();
        assert_eq!(listeners.types(), vec!["lircsocket"]);
        assert_eq!(targets.types(), vec!["linux", "onkyo", "plex"]);
    }

    #[test]
    fn offline_registries_build_plex_without_a_runtime() {
        let (_, targets) = offline_registries().unwrap();
        assert_eq!(targets.types(), vec!["linux", "onkyo", "plex"]);

        let mut params = claw_core::Params::new();
        params.insert("name".into(), "yBox".into());
        let spec = claw_core::PluginSpec::new("plex", params);
        assert!(targets.create("htpc", &spec).is_ok());
    }

    #[test]
    fn registering_twice_fails() {
        let (mut listeners, _) = default_registries().unwrap();
        assert!(register_listeners(&mut listeners).is_err());
    }
}
