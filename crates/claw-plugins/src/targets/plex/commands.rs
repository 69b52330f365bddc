// Plex remote-control API endpoints, one per vocabulary command.

use claw_core::{Command, CommandMap, CommandParameter, command_map};

use super::timeline::MediaType;

/// Capability a player must advertise for a group of endpoints.
pub const NAVIGATION: &str = "navigation";
pub const PLAYBACK: &str = "playback";

/// A resolved player request: path plus query pairs, minus `commandID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub capability: &'static str,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
}

struct Endpoint {
    name: &'static str,
    description: &'static str,
    capability: &'static str,
    path: &'static str,
}

const fn nav(name: &'static str, description: &'static str, path: &'static str) -> Endpoint {
    Endpoint {
        name,
        description,
        capability: NAVIGATION,
        path,
    }
}

const fn play(name: &'static str, description: &'static str, path: &'static str) -> Endpoint {
    Endpoint {
        name,
        description,
        capability: PLAYBACK,
        path,
    }
}

const ENDPOINTS: &[Endpoint] = &[
    nav("MoveUp", "Moves the selection up", "/player/navigation/moveUp"),
    nav("MoveDown", "Moves the selection down", "/player/navigation/moveDown"),
    nav("MoveLeft", "Moves the selection left", "/player/navigation/moveLeft"),
    nav("MoveRight", "Moves the selection right", "/player/navigation/moveRight"),
    nav("PageUp", "Scrolls a page up", "/player/navigation/pageUp"),
    nav("PageDown", "Scrolls a page down", "/player/navigation/pageDown"),
    nav("Select", "Activates the selected item", "/player/navigation/select"),
    nav("Back", "Goes back", "/player/navigation/back"),
    nav("Home", "Goes to the home screen", "/player/navigation/home"),
    nav("ContextMenu", "Opens the context menu", "/player/navigation/contextMenu"),
    nav("ToggleOSD", "Toggles the on-screen display", "/player/navigation/toggleOSD"),
    play("Play", "Starts playback", "/player/playback/play"),
    play("Pause", "Pauses playback", "/player/playback/pause"),
    play("Stop", "Stops playback", "/player/playback/stop"),
    play("SkipNext", "Skips to the next item", "/player/playback/skipNext"),
    play("SkipPrevious", "Skips to the previous item", "/player/playback/skipPrevious"),
    play("StepForward", "Steps forward", "/player/playback/stepForward"),
    play("StepBack", "Steps back", "/player/playback/stepBack"),
    play("BigStepForward", "Steps forward a large amount", "/player/playback/bigStepForward"),
    play("BigStepBack", "Steps back a large amount", "/player/playback/bigStepBack"),
];

const SET_PARAMETERS: &str = "/player/playback/setParameters";
const SEEK_TO: &str = "/player/playback/seekTo";

/// The full Plex vocabulary, including `PowerOn`.
pub fn vocabulary() -> CommandMap {
    let fixed = ENDPOINTS
        .iter()
        .map(|e| Command::new(e.name, e.description));
    let extra = [
        Command::new("PowerOn", "Wakes the player host"),
        Command::new("SetVolume", "Sets the player volume").with_parameter(
            CommandParameter::new("level", "Volume level").with_range(0, 100),
        ),
        Command::new("SeekTo", "Seeks to an offset").with_parameter(
            CommandParameter::new("offset", "Offset in milliseconds").with_bounds(Some(0), None),
        ),
    ];
    command_map(fixed.chain(extra))
}

/// Map a command and its validated arguments to a request. Playback
/// requests name `media` in their `type` query.
pub fn request(command: &str, args: &[String], media: MediaType) -> Option<Request> {
    let arg = || args.first().cloned().unwrap_or_default();
    let kind = ("type", media.to_string());
    match command {
        "SetVolume" => Some(Request {
            capability: PLAYBACK,
            path: SET_PARAMETERS,
            query: vec![("volume", arg()), kind],
        }),
        "SeekTo" => Some(Request {
            capability: PLAYBACK,
            path: SEEK_TO,
            query: vec![("offset", arg()), kind],
        }),
        _ => {
            let endpoint = ENDPOINTS.iter().find(|e| e.name == command)?;
            let query = if endpoint.capability == PLAYBACK {
                vec![kind]
            } else {
                Vec::new()
            };
            Some(Request {
                capability: endpoint.capability,
                path: endpoint.path,
                query,
            })
        }
    }
}
