// ── Command descriptors ──
//
// Describes what a target can do. Descriptors are not executable; the
// dispatcher uses them to validate arguments before calling the target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::parameter::{CommandParameter, ParameterDocument};
use crate::validation::ValidationError;

/// A target's vocabulary, keyed by command name.
pub type CommandMap = BTreeMap<String, Command>;

/// Key a set of commands by their names.
pub fn command_map(commands: impl IntoIterator<Item = Command>) -> CommandMap {
    commands
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect()
}

/// A named command with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    description: String,
    parameters: Vec<CommandParameter>,
}

impl Command {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a positional parameter.
    pub fn with_parameter(mut self, parameter: CommandParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[CommandParameter] {
        &self.parameters
    }

    /// Validate positional arguments and return their normalized values.
    ///
    /// Missing trailing arguments are fine when their parameters are
    /// optional; extra arguments are rejected.
    pub fn validate_args<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<String>, ValidationError> {
        if args.len() > self.parameters.len() {
            return Err(ValidationError::UnexpectedArguments {
                expected: self.parameters.len(),
                got: args.len(),
            });
        }
        let mut normalized = Vec::with_capacity(args.len());
        for (idx, param) in self.parameters.iter().enumerate() {
            match args.get(idx) {
                Some(raw) => normalized.push(param.validate(raw.as_ref())?),
                None if param.is_optional() => {}
                None => {
                    return Err(ValidationError::MissingArgument {
                        parameter: param.name().to_owned(),
                    });
                }
            }
        }
        Ok(normalized)
    }
}

// ── Vocabulary documents ─────────────────────────────────────────────
//
// { "commands": { "<name>": { "description": "...", "parameters": [...] } } }

#[derive(Debug, Serialize, Deserialize)]
struct VocabularyDocument {
    commands: BTreeMap<String, CommandDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommandDocument {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<ParameterDocument>,
}

/// Parse a vocabulary document into a [`CommandMap`].
///
/// Command names come from the document's keys. Any malformed entry fails
/// the whole load.
pub fn parse_commands(json: &str) -> Result<CommandMap, CoreError> {
    let doc: VocabularyDocument = serde_json::from_str(json)?;
    let mut commands = CommandMap::new();
    for (name, cmd) in doc.commands {
        if name.trim().is_empty() {
            return Err(CoreError::Vocabulary {
                message: "command name must not be empty".into(),
            });
        }
        let parameters = cmd
            .parameters
            .into_iter()
            .map(CommandParameter::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::Vocabulary {
                message: format!("command '{name}': {e}"),
            })?;
        let command = Command {
            name: name.clone(),
            description: cmd.description,
            parameters,
        };
        commands.insert(name, command);
    }
    Ok(commands)
}

/// Serialize a [`CommandMap`] into a vocabulary document.
pub fn commands_to_json(commands: &CommandMap) -> Result<String, CoreError> {
    let doc = VocabularyDocument {
        commands: commands
            .iter()
            .map(|(name, cmd)| {
                let entry = CommandDocument {
                    description: cmd.description.clone(),
                    parameters: cmd.parameters.iter().map(ParameterDocument::from).collect(),
                };
                (name.clone(), entry)
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::validation::ParameterType;

    fn volume() -> Command {
        Command::new("Volume", "Sets the volume")
            .with_parameter(CommandParameter::new("level", "The volume level").with_range(0, 77))
    }

    #[test]
    fn validate_args_normalizes() {
        assert_eq!(volume().validate_args(&["0x10"]).unwrap(), vec!["16"]);
        assert_eq!(volume().validate_args(&["100%"]).unwrap(), vec!["77"]);
    }

    #[test]
    fn validate_args_missing_required() {
        let err = volume().validate_args::<&str>(&[]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingArgument {
                parameter: "level".into()
            }
        );
    }

    #[test]
    fn validate_args_optional_may_be_omitted() {
        let cmd = Command::new("Seek", "Seek")
            .with_parameter(CommandParameter::new("offset", "").with_numeric().optional());
        assert!(cmd.validate_args::<&str>(&[]).unwrap().is_empty());
        assert_eq!(cmd.validate_args(&["010"]).unwrap(), vec!["8"]);
    }

    #[test]
    fn validate_args_rejects_extra() {
        let cmd = Command::new("PowerOn", "Powers on");
        assert_eq!(
            cmd.validate_args(&["now"]).unwrap_err(),
            ValidationError::UnexpectedArguments {
                expected: 0,
                got: 1
            }
        );
    }

    #[test]
    fn command_map_keys_by_name() {
        let map = command_map([volume(), Command::new("MuteOn", "Mutes")]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["MuteOn", "Volume"]);
        assert_eq!(map["Volume"].name(), "Volume");
    }

    const DOC: &str = r#"{
        "commands": {
            "Power": {
                "description": "Controls power",
                "parameters": [
                    {
                        "name": "state",
                        "description": "The power state",
                        "type": "list",
                        "validation": "on|off|toggle",
                        "optional": false
                    }
                ]
            },
            "Volume": {
                "description": "Sets the volume",
                "parameters": [
                    { "name": "level", "description": "", "type": "range", "validation": "0:77" },
                    { "name": "zone", "type": "numeric", "optional": true }
                ]
            },
            "VolumeUp": { "description": "Turns up the volume" }
        }
    }"#;

    #[test]
    fn parse_backfills_names() {
        let map = parse_commands(DOC).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["Power"].name(), "Power");
        assert_eq!(map["VolumeUp"].parameters().len(), 0);

        let zone = &map["Volume"].parameters()[1];
        assert_eq!(zone.param_type(), ParameterType::Numeric);
        assert!(zone.is_optional());
        assert_eq!(map["Power"].validate_args(&["ON"]).unwrap(), vec!["on"]);
    }

    #[test]
    fn round_trip_preserves_everything() {
        let first = parse_commands(DOC).unwrap();
        let json = commands_to_json(&first).unwrap();
        let second = parse_commands(&json).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn builder_vocabulary_round_trips() {
        let map = command_map([
            volume(),
            Command::new("Input", "Select input").with_parameter(
                CommandParameter::new("src", "Source").with_list(["HDMI1", "HDMI2"]),
            ),
            Command::new("Name", "Rename")
                .with_parameter(CommandParameter::new("n", "").with_regex("[a-z]+").optional()),
        ]);
        let reloaded = parse_commands(&commands_to_json(&map).unwrap()).unwrap();
        assert_eq!(map, reloaded);
    }

    #[test]
    fn malformed_document_fails_whole_load() {
        assert!(matches!(
            parse_commands("{ not json"),
            Err(CoreError::Vocabulary { .. })
        ));
        let bad_type = r#"{ "commands": { "A": { "parameters": [ { "name": "x", "type": "float" } ] } } }"#;
        assert!(parse_commands(bad_type).is_err());
    }

    #[test]
    fn empty_command_name_is_rejected() {
        let err = parse_commands(r#"{ "commands": { "": {} } }"#).unwrap_err();
        assert!(matches!(err, CoreError::Vocabulary { .. }));
    }

    #[test]
    fn custom_parameters_cannot_be_loaded() {
        let doc = r#"{ "commands": { "A": { "parameters": [ { "name": "x", "type": "custom" } ] } } }"#;
        let err = parse_commands(doc).unwrap_err();
        assert!(err.to_string().contains("command 'A'"), "{err}");
    }
}
