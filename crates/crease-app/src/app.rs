// Command loop: reads user commands and applies them to one team builder
// session, pushing text for the terminal through `out_tx`.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crease_core::ids::PlayerId;
use crease_core::selection::Toggle;
use crease_core::session::TeamBuilder;
use crease_core::wizard::{ForwardAction, WizardError};

use crate::commands::{self, UserCommand, HELP};
use crate::render;

/// Parse lines from `reader` into commands until EOF or `quit`.
/// Parse errors are reported through `out_tx` and otherwise ignored.
///
/// Blocking: run it on its own thread, never on a runtime worker.
pub fn read_commands<R: BufRead>(
    reader: R,
    cmd_tx: mpsc::Sender<UserCommand>,
    out_tx: mpsc::Sender<String>,
) -> std::io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        match commands::parse(&line) {
            Ok(Some(cmd)) => {
                let quit = cmd == UserCommand::Quit;
                if cmd_tx.blocking_send(cmd).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!("Unparsed input {:?}: {}", line, e);
                let _ = out_tx.blocking_send(e.to_string());
            }
        }
    }
    Ok(())
}

/// Main command loop. Runs until `quit` or until the command channel closes.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    out_tx: mpsc::Sender<String>,
    mut builder: TeamBuilder,
) -> anyhow::Result<()> {
    info!("Command loop started");

    let blocked_tx = out_tx.clone();
    builder.on_blocked(Box::new(move |reason| {
        if blocked_tx.try_send(format!("! {reason}")).is_err() {
            warn!("Dropped blocked-selection notice: {}", reason);
        }
    }));

    if out_tx.send(render::builder(&builder)).await.is_err() {
        return Ok(());
    }

    while let Some(cmd) = cmd_rx.recv().await {
        if cmd == UserCommand::Quit {
            info!("Quit command received, shutting down");
            break;
        }
        for text in handle_user_command(&mut builder, cmd).await {
            if out_tx.send(text).await.is_err() {
                info!("Output channel closed, shutting down");
                return Ok(());
            }
        }
    }

    info!("Command loop exiting");
    Ok(())
}

fn player_name(b: &TeamBuilder, id: &PlayerId) -> String {
    b.state()
        .pool()
        .get(id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Redraw after a wizard move, or show why it was refused.
fn after_move(b: &TeamBuilder, result: Result<(), WizardError>) -> Vec<String> {
    match result {
        Ok(()) => vec![render::builder(b)],
        Err(e) => vec![e.to_string()],
    }
}

/// Apply one command. Refused selection changes produce no text here; the
/// blocked handler has already reported them.
pub async fn handle_user_command(b: &mut TeamBuilder, cmd: UserCommand) -> Vec<String> {
    match cmd {
        UserCommand::Help => vec![HELP.to_string()],
        UserCommand::Show => vec![render::builder(b)],

        UserCommand::Slot(slot) => {
            let result = b.select_slot(&slot);
            after_move(b, result)
        }
        UserCommand::NextSlot => {
            let result = b.next_slot();
            after_move(b, result)
        }
        UserCommand::PrevSlot => {
            let result = b.prev_slot();
            after_move(b, result)
        }
        UserCommand::Back(step) => {
            let result = b.go_to(step);
            after_move(b, result)
        }

        UserCommand::Search(query) => match b.active_slot_id() {
            Some(slot) => {
                let hits = b.state().pool().search(slot, &query);
                vec![render::player_list(b, &hits)]
            }
            None => vec!["No slot is active.".to_string()],
        },

        UserCommand::Pick(id) => match b.toggle(&id) {
            Ok(Toggle::Added) => vec![format!("Added {}.", player_name(b, &id))],
            Ok(Toggle::Removed) => vec![format!("Removed {}.", player_name(b, &id))],
            Err(_) => vec![],
        },
        UserCommand::Captain(id) => match b.set_captain(&id) {
            Ok(()) => vec![format!("Captain: {}.", player_name(b, &id))],
            Err(_) => vec![],
        },
        UserCommand::ViceCaptain(id) => match b.set_vice_captain(&id) {
            Ok(()) => vec![format!("Vice-captain: {}.", player_name(b, &id))],
            Err(_) => vec![],
        },
        UserCommand::Candidates(id) => {
            if !b.state().selection().contains(&id) {
                return vec![format!("{} is not in your squad.", player_name(b, &id))];
            }
            let candidates = b
                .state()
                .pool()
                .replacement_candidates(&id, b.state().selection());
            vec![render::player_list(b, &candidates)]
        }
        UserCommand::Replace { old, new } => match b.replace(&old, &new) {
            Ok(()) => vec![format!(
                "Replaced {} with {}.",
                player_name(b, &old),
                player_name(b, &new)
            )],
            Err(_) => vec![],
        },
        UserCommand::ClearAll => {
            b.clear_all();
            vec!["Selection cleared.".to_string(), render::builder(b)]
        }

        UserCommand::TeamName(name) => {
            b.set_team_name(name);
            vec![format!("Team name: {}", b.team_name())]
        }

        UserCommand::Forward => {
            let result = match b.wizard().forward_action(b.state()) {
                ForwardAction::NextSlot => b.next_slot(),
                ForwardAction::Continue => b.continue_to_leaders(),
                ForwardAction::Finalize => b.continue_to_review(),
                ForwardAction::Submit => {
                    return match b.submit().await {
                        Ok(outcome) => {
                            info!("Submitted team {} ({:?})", outcome.team.id, outcome.action);
                            vec![outcome.banner()]
                        }
                        Err(e) => {
                            warn!("Submit failed: {}", e);
                            vec![e.to_string()]
                        }
                    };
                }
            };
            after_move(b, result)
        }

        UserCommand::Quit => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crease_core::api::FantasyApi;
    use crease_core::catalog::Slot;
    use crease_core::enrollment::MountGuard;
    use crease_core::ids::ContestId;
    use crease_core::player::Player;
    use crease_core::session::{PageView, SessionOptions};
    use crease_store::{ContestSeed, LocalStore};

    fn store() -> Arc<LocalStore> {
        let store = LocalStore::open(":memory:").unwrap();
        store
            .upsert_slots(&[
                Slot::new("bat", "Batsman", 1, 2),
                Slot::new("bowl", "Bowler", 1, 2),
            ])
            .unwrap();
        let mut players = Vec::new();
        for slot in ["bat", "bowl"] {
            for i in 1..=3 {
                players.push(Player {
                    id: PlayerId::new(format!("{slot}{i}")),
                    name: format!("{slot} player {i}"),
                    team: "DV SPARTANS".into(),
                    slot_id: slot.into(),
                    price: 8.0,
                    points: 50.0,
                });
            }
        }
        store.upsert_players(&players).unwrap();
        store.upsert_contest(&ContestSeed::open("c1", "Weekend Cup")).unwrap();
        Arc::new(store)
    }

    async fn builder(store: &Arc<LocalStore>) -> TeamBuilder {
        let api: Arc<dyn FantasyApi> = Arc::clone(store) as Arc<dyn FantasyApi>;
        match TeamBuilder::load(
            api,
            Some(ContestId::from("c1")),
            &SessionOptions::default(),
            &MountGuard::new(),
        )
        .await
        .unwrap()
        {
            PageView::Builder(b) => *b,
            _ => panic!("expected the builder"),
        }
    }

    /// Feed `script` through the parser and the loop, returning all output.
    async fn drive(b: TeamBuilder, script: &str) -> Vec<String> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (out_tx, mut out_rx) = mpsc::channel(256);
        let reader = std::io::Cursor::new(script.to_string());
        let input_out = out_tx.clone();
        tokio::task::spawn_blocking(move || read_commands(reader, cmd_tx, input_out))
            .await
            .unwrap()
            .unwrap();
        run(cmd_rx, out_tx, b).await.unwrap();

        let mut out = Vec::new();
        while let Some(text) = out_rx.recv().await {
            out.push(text);
        }
        out
    }

    #[tokio::test]
    async fn full_session_creates_and_enrolls() {
        let store = store();
        let b = builder(&store).await;
        let out = drive(
            b,
            "pick bat1\npick bat2\npick bat3\ngo\npick bowl1\ngo\ncaptain bat1\nvice bowl1\ngo\nname Spartans XI\ngo\n",
        )
        .await;

        assert!(out.iter().any(|t| t == "! You can select at most 2 players from Batsman."));
        assert!(out.iter().any(|t| t == "Team created and entered into the contest."));
        assert_eq!(store.list_teams().unwrap()[0].team_name, "Spartans XI");
        assert_eq!(store.list_enrollments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forward_is_refused_until_leaders_chosen() {
        let store = store();
        let b = builder(&store).await;
        let out = drive(b, "pick bat1\ngo\npick bowl1\ngo\ngo\ncaptain bat1\ngo\n").await;
        assert!(out.iter().any(|t| t == "Please select a captain."));
        assert!(out.iter().any(|t| t == "Please select a vice-captain."));
        assert!(store.list_teams().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_without_name_is_refused() {
        let store = store();
        let b = builder(&store).await;
        let out = drive(
            b,
            "pick bat1\ngo\npick bowl1\ngo\ncaptain bat1\nvice bowl1\ngo\ngo\n",
        )
        .await;
        assert!(out.iter().any(|t| t == "Please enter a team name."));
        assert!(store.list_teams().unwrap().is_empty());
    }

    #[tokio::test]
    async fn parse_errors_and_quit() {
        let store = store();
        let b = builder(&store).await;
        let out = drive(b, "dance\nquit\npick bat1\n").await;
        assert!(out.iter().any(|t| t.starts_with("unknown command `dance`")));
        assert!(!out.iter().any(|t| t.starts_with("Added")));
    }

    #[tokio::test]
    async fn candidates_list_same_slot_unselected() {
        let store = store();
        let mut b = builder(&store).await;
        b.toggle(&PlayerId::from("bat1")).unwrap();
        let out = handle_user_command(&mut b, UserCommand::Candidates(PlayerId::from("bat1"))).await;
        assert!(out[0].contains("bat2"));
        assert!(out[0].contains("bat3"));
        assert!(!out[0].contains("bowl1"));

        let out = handle_user_command(&mut b, UserCommand::Candidates(PlayerId::from("bat2"))).await;
        assert_eq!(out, vec!["bat player 2 is not in your squad.".to_string()]);
    }
}
