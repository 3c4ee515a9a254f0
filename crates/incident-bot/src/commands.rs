//! `/incident` slash command parsing.

use std::collections::HashMap;
use std::str::FromStr;

use incident::IncidentStatus;

pub const HELP: &str = "*Usage*\n\
    • `/incident declare <title>` (or just `/incident <title>`) opens an incident request\n\
    • `/incident status <triage|handling|monitoring|closed> [note]` sets the status\n\
    • `/incident invite <@user|@group ...>` invites people to this incident\n\
    • `/incident help` shows this message";

const STATUS_USAGE: &str =
    "Please name a status: `/incident status <triage|handling|monitoring|closed> [note]`";

const INVITE_USAGE: &str = "Please list who to invite: `/incident invite @alice @oncall`";

/// The fields of a slash command invocation the bot reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

impl SlashCommand {
    /// Extract from a decoded form body; `None` if user or channel is missing.
    #[must_use]
    pub fn from_form(form: &HashMap<String, String>) -> Option<Self> {
        let field = |name: &str| form.get(name).map(|v| v.trim().to_string());
        let user_id = field("user_id").filter(|v| !v.is_empty())?;
        let channel_id = field("channel_id").filter(|v| !v.is_empty())?;
        Some(Self {
            text: field("text").unwrap_or_default(),
            user_id,
            channel_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Declare {
        title: String,
    },
    Status {
        status: IncidentStatus,
        note: Option<String>,
    },
    Invite {
        users: Vec<String>,
        groups: Vec<String>,
    },
    Help,
}

/// Parse command text. The error is a message for the invoking user.
pub fn parse(text: &str) -> Result<Command, String> {
    let text = text.trim();
    let (verb, rest) = text
        .split_once(char::is_whitespace)
        .map_or((text, ""), |(verb, rest)| (verb, rest.trim()));

    match verb.to_ascii_lowercase().as_str() {
        "" | "help" => Ok(Command::Help),
        "declare" => {
            if rest.is_empty() {
                Err("Please give the incident a title: `/incident declare <title>`".to_string())
            } else {
                Ok(Command::Declare {
                    title: rest.to_string(),
                })
            }
        }
        "status" => {
            let (wanted, note) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(status, note)| (status, note.trim()));
            if wanted.is_empty() {
                return Err(STATUS_USAGE.to_string());
            }
            let status = IncidentStatus::from_str(wanted).map_err(|e| e.to_string())?;
            Ok(Command::Status {
                status,
                note: (!note.is_empty()).then(|| note.to_string()),
            })
        }
        "invite" => {
            let (groups, users): (Vec<String>, Vec<String>) = rest
                .split_whitespace()
                .map(String::from)
                .partition(|reference| reference.starts_with("<!subteam^"));
            if users.is_empty() && groups.is_empty() {
                return Err(INVITE_USAGE.to_string());
            }
            Ok(Command::Invite { users, groups })
        }
        _ => Ok(Command::Declare {
            title: text.to_string(),
        }),
    }
}
