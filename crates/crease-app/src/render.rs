// Plain-text views of the builder for the terminal.

use crease_core::api::Team;
use crease_core::enrollment::Reconciliation;
use crease_core::player::Player;
use crease_core::session::TeamBuilder;
use crease_core::wizard::{ForwardAction, WizardStep};

pub fn forward_label(action: ForwardAction) -> &'static str {
    match action {
        ForwardAction::NextSlot => "Next",
        ForwardAction::Continue => "Continue",
        ForwardAction::Finalize => "Finalize",
        ForwardAction::Submit => "Submit",
    }
}

/// The current wizard step, with the forward control and its blocker.
pub fn builder(b: &TeamBuilder) -> String {
    let wizard = b.wizard();
    let state = b.state();
    let mut out = format!(
        "== Step {} of 3: {} ==\n",
        wizard.step_number(),
        wizard.step().title()
    );

    if let Some(rec) = b.reconciliation() {
        if rec.state == crease_core::enrollment::EnrollmentState::EnrolledWithoutTeam {
            out.push_str("Note: this contest entry had no team attached; saving will attach one.\n");
        }
    }
    if b.is_edit_mode() {
        out.push_str("Editing your saved team.\n");
    }

    match wizard.step() {
        WizardStep::SelectPlayers => {
            out.push_str(&state.catalog().instruction());
            out.push('\n');
            out.push_str(&slot_tabs(b));
            if let Some(slot) = b.active_slot_id() {
                let players: Vec<&Player> = state.pool().in_slot(slot).collect();
                out.push_str(&player_list(b, &players));
            }
        }
        WizardStep::ChooseLeaders => {
            out.push_str("Pick a captain and a vice-captain from your squad.\n");
            out.push_str(&squad(b));
        }
        WizardStep::Review => {
            let name = if b.team_name().is_empty() {
                "(not set, use `name <team name>`)"
            } else {
                b.team_name()
            };
            out.push_str(&format!("Team name: {name}\n"));
            out.push_str(&squad(b));
            let summary = state.summary(b.points());
            out.push_str(&format!(
                "{} players, total price {:.1}, total points {:.1}\n",
                summary.players, summary.total_price, summary.total_points
            ));
        }
    }

    let action = wizard.forward_action(state);
    match wizard.forward_blocker(state) {
        Ok(()) => out.push_str(&format!("[go] {}\n", forward_label(action))),
        Err(reason) => out.push_str(&format!("[go] {} (disabled: {reason})\n", forward_label(action))),
    }
    out
}

fn slot_tabs(b: &TeamBuilder) -> String {
    let state = b.state();
    let active = b.active_slot_id();
    let tabs: Vec<String> = state
        .catalog()
        .iter()
        .map(|slot| {
            let marker = if Some(&slot.id) == active { "*" } else { " " };
            let met = if state.slot_minimum_met(&slot.id) { "" } else { " !" };
            format!(
                "{marker}{} ({}) {}/{}{met}",
                slot.name,
                slot.id,
                state.count_for_slot(&slot.id),
                slot.max_select
            )
        })
        .collect();
    format!(
        "{}\nSelected {}/{}\n",
        tabs.join(" |"),
        state.selection().len(),
        state.catalog().total_max()
    )
}

/// One line per player: `[x]` selected, `[-]` unavailable, `[ ]` open.
pub fn player_list(b: &TeamBuilder, players: &[&Player]) -> String {
    if players.is_empty() {
        return "  (no players)\n".to_string();
    }
    let state = b.state();
    let mut out = String::new();
    for p in players {
        let mark = if state.selection().contains(&p.id) {
            "[x]"
        } else if state.is_player_disabled(&p.id) {
            "[-]"
        } else {
            "[ ]"
        };
        out.push_str(&format!(
            "  {mark} {:<6} {:<20} {:<16} {:>5.1} {:>6.1}\n",
            p.id.as_str(),
            p.name,
            p.team,
            p.price,
            b.points().points_for(p)
        ));
    }
    out
}

fn squad(b: &TeamBuilder) -> String {
    let state = b.state();
    let selection = state.selection();
    let mut out = String::new();
    for slot in state.catalog().iter() {
        for p in state.selected_in_slot(&slot.id) {
            let role = if selection.captain() == Some(&p.id) {
                " (C)"
            } else if selection.vice_captain() == Some(&p.id) {
                " (VC)"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {:<14} {:<6} {}{role}\n",
                slot.name,
                p.id.as_str(),
                p.name
            ));
        }
    }
    if out.is_empty() {
        out.push_str("  (no players selected)\n");
    }
    out
}

pub fn view_only(rec: &Reconciliation, team: &Team) -> String {
    let mut out = format!(
        "You have already joined contest {} with \"{}\".\n",
        rec.contest_id, team.team_name
    );
    for id in &team.player_ids {
        let role = if team.captain_id.as_ref() == Some(id) {
            " (C)"
        } else if team.vice_captain_id.as_ref() == Some(id) {
            " (VC)"
        } else {
            ""
        };
        out.push_str(&format!("  {id}{role}\n"));
    }
    out
}

pub fn support_needed(rec: &Reconciliation) -> String {
    format!(
        "Your entry in contest {} has no team attached. Please contact support.\n",
        rec.contest_id
    )
}
