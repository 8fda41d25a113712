//! Funscript files turned into `stream:` commands.
//!
//! A funscript is a JSON document with a timestamped list of positions
//! (`{"actions": [{"at": ms, "pos": 0-100}, ...]}`). Playback timing is the
//! caller's business; this module only works out which command goes out when.

use json::JsonValue;
use log::info;
use thiserror::Error;

use crate::ble::Command;

#[derive(Error, Debug)]
pub enum FunscriptError {
    #[error("invalid funscript json: {0}")]
    Json(#[from] json::Error),
    #[error("invalid funscript: missing actions array")]
    MissingActions,
    #[error("invalid funscript: action {index} needs numeric 'at' and 'pos'")]
    BadAction { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    /// Milliseconds from the start of the media.
    pub at: u64,
    pub pos: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Funscript {
    /// Sorted by `at`.
    pub actions: Vec<Action>,
    pub version: Option<String>,
    pub inverted: bool,
    pub range: Option<u32>,
}

impl Funscript {
    pub fn parse(text: &str) -> Result<Self, FunscriptError> {
        let data = json::parse(text)?;

        let raw = &data["actions"];
        if !raw.is_array() {
            return Err(FunscriptError::MissingActions);
        }

        let mut actions = raw
            .members()
            .enumerate()
            .map(|(index, action)| {
                match (action["at"].as_u64(), action["pos"].as_f64()) {
                    (Some(at), Some(pos)) => Ok(Action { at, pos }),
                    _ => Err(FunscriptError::BadAction { index }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        actions.sort_by_key(|action| action.at);

        let version = match &data["version"] {
            JsonValue::Null => None,
            v => Some(v.as_str().map_or_else(|| v.dump(), str::to_string)),
        };
        let script = Funscript {
            actions,
            version,
            inverted: data["inverted"].as_bool().unwrap_or(false),
            range: data["range"].as_u32(),
        };

        info!("Loaded {} actions", script.actions.len());
        if let Some(version) = &script.version {
            info!("Funscript version: {}", version);
        }
        if script.inverted {
            info!("Script is inverted");
        }
        if let Some(range) = script.range {
            info!("Range: {}", range);
        }
        Ok(script)
    }

    /// Timestamp of the last action.
    pub fn duration_ms(&self) -> u64 {
        self.actions.last().map_or(0, |a| a.at)
    }

    /// The stream commands of a full playback, each paired with the media
    /// time it is due at.
    ///
    /// When playback reaches an action the device is sent towards the
    /// position of the following action, over the time between the two. The
    /// last action only marks the end. Actions sharing a timestamp with the
    /// previously sent one are skipped.
    pub fn stream_commands(&self) -> Vec<(u64, Command)> {
        self.stream_commands_from(None)
    }

    /// Like [`Funscript::stream_commands`], resuming after a seek: actions at
    /// or before `after_ms` are skipped.
    pub fn stream_commands_from(&self, after_ms: Option<u64>) -> Vec<(u64, Command)> {
        let mut last_sent = after_ms;
        let mut commands = Vec::new();

        for pair in self.actions.windows(2) {
            let (action, next) = (pair[0], pair[1]);
            if last_sent.map_or(false, |sent| action.at <= sent) {
                continue;
            }
            let time_to_next = (next.at - action.at) as f64;
            commands.push((action.at, Command::stream_rounded(next.pos, time_to_next)));
            last_sent = Some(action.at);
        }
        commands
    }
}
