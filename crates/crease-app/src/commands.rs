// User commands typed at the prompt, and their parser.

use thiserror::Error;

use crease_core::ids::{PlayerId, SlotId};
use crease_core::wizard::WizardStep;

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Help,
    /// Redraw the current step.
    Show,
    /// Make a slot the active one.
    Slot(SlotId),
    NextSlot,
    PrevSlot,
    /// Filter the active slot's players by name or team.
    Search(String),
    /// Select or deselect a player.
    Pick(PlayerId),
    Captain(PlayerId),
    ViceCaptain(PlayerId),
    /// List same-slot players that could replace a selected one.
    Candidates(PlayerId),
    Replace { old: PlayerId, new: PlayerId },
    ClearAll,
    /// The single forward control: next slot, continue, finalize or submit.
    Forward,
    /// Jump back to an earlier step.
    Back(WizardStep),
    TeamName(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command `{0}` (type `help` for a list)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  show                  redraw the current step
  slot <id>             switch to a slot
  next | prev           move between slots
  search <text>         filter the active slot by name or team
  pick <player>         select or deselect a player
  captain <player>      choose the captain
  vice <player>         choose the vice-captain
  candidates <player>   list replacements for a selected player
  replace <old> <new>   swap a selected player for another in the same slot
  clear                 deselect everyone
  go                    press the forward button (next / continue / finalize / submit)
  back <1|2>            return to step 1 or 2
  name <team name>      set the team name
  quit                  leave without saving";

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<UserCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((v, r)) => (v, r.trim()),
        None => (line, ""),
    };

    let one_id = |usage: &'static str| -> Result<String, ParseError> {
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(id), None) => Ok(id.to_string()),
            _ => Err(ParseError::Usage(usage)),
        }
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "help" | "?" => UserCommand::Help,
        "show" | "ls" => UserCommand::Show,
        "slot" => UserCommand::Slot(SlotId::new(one_id("slot <id>")?)),
        "next" => UserCommand::NextSlot,
        "prev" => UserCommand::PrevSlot,
        "search" => UserCommand::Search(rest.to_string()),
        "pick" | "p" => UserCommand::Pick(PlayerId::new(one_id("pick <player>")?)),
        "captain" | "c" => UserCommand::Captain(PlayerId::new(one_id("captain <player>")?)),
        "vice" | "vc" => UserCommand::ViceCaptain(PlayerId::new(one_id("vice <player>")?)),
        "candidates" => UserCommand::Candidates(PlayerId::new(one_id("candidates <player>")?)),
        "replace" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            match parts.as_slice() {
                [old, new] => UserCommand::Replace {
                    old: PlayerId::from(*old),
                    new: PlayerId::from(*new),
                },
                _ => return Err(ParseError::Usage("replace <old> <new>")),
            }
        }
        "clear" => UserCommand::ClearAll,
        "go" | "continue" => UserCommand::Forward,
        "back" => match rest {
            "1" => UserCommand::Back(WizardStep::SelectPlayers),
            "2" => UserCommand::Back(WizardStep::ChooseLeaders),
            _ => return Err(ParseError::Usage("back <1|2>")),
        },
        "name" => {
            if rest.is_empty() {
                return Err(ParseError::Usage("name <team name>"));
            }
            UserCommand::TeamName(rest.to_string())
        }
        "quit" | "exit" | "q" => UserCommand::Quit,
        _ => return Err(ParseError::Unknown(verb.to_string())),
    };
    Ok(Some(cmd))
}
