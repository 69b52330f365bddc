// claw-core: Event aggregation, argument validation and dispatch between
// remote-control listeners and controllable targets.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod parameter;
pub mod registry;
pub mod stream;
pub mod target;
pub mod validation;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandMap, command_map, commands_to_json, parse_commands};
pub use dispatcher::{ANY_SOURCE, Action, Dispatch, Dispatcher, RouteResolver, RouteTable};
pub use error::CoreError;
pub use event::RemoteCommand;
pub use listener::Listener;
pub use parameter::CommandParameter;
pub use registry::{
    Factory, ListenerRegistry, Params, PluginSpec, Registry, TargetRegistry, parsed_param,
    required_param,
};
pub use stream::{CommandStream, StreamHandle};
pub use target::Target;
pub use validation::{ParameterType, ValidationError, Validator};
