// The team builder running end to end against the SQLite store.

use std::sync::Arc;

use crease_core::api::FantasyApi;
use crease_core::catalog::Slot;
use crease_core::enrollment::{EnrollmentState, MountGuard};
use crease_core::ids::{ContestId, PlayerId};
use crease_core::player::PointsOverride;
use crease_core::session::{PageView, SessionOptions, TeamBuilder};
use crease_core::submit::{EnrollOutcome, SaveAction};
use crease_core::wizard::WizardStep;
use crease_store::import::players_from_reader;
use crease_store::{ContestSeed, LocalStore};

const PLAYERS: &str = "\
id,name,team,slot,price,points
bat1,Arjun Rao,DV SPARTANS,bat,9.5,120
bat2,Ravi Kumar,DV SPARTANS,bat,8,95
bat3,Sam Patel,Royal Strikers,bat,7.5,80
bowl1,Kiran Das,DV SPARTANS,bowl,8,100
bowl2,Dev Shah,Royal Strikers,bowl,7,70
bowl3,Omar Ali,Royal Strikers,bowl,6.5,60
";

fn seeded_store() -> Arc<LocalStore> {
    let store = LocalStore::open(":memory:").unwrap();
    store
        .upsert_slots(&[
            Slot::new("bat", "Batsman", 2, 3),
            Slot::new("bowl", "Bowler", 2, 3),
        ])
        .unwrap();
    let players = players_from_reader(PLAYERS.as_bytes()).unwrap();
    assert_eq!(store.upsert_players(&players).unwrap(), 6);
    store.upsert_contest(&ContestSeed::open("c1", "Weekend Cup")).unwrap();
    Arc::new(store)
}

fn pid(s: &str) -> PlayerId {
    PlayerId::from(s)
}

async fn load(store: &Arc<LocalStore>, contest: &str) -> PageView {
    let api: Arc<dyn FantasyApi> = Arc::clone(store) as Arc<dyn FantasyApi>;
    TeamBuilder::load(
        api,
        Some(ContestId::from(contest)),
        &SessionOptions::default(),
        &MountGuard::new(),
    )
    .await
    .unwrap()
}

async fn builder(store: &Arc<LocalStore>, contest: &str) -> TeamBuilder {
    match load(store, contest).await {
        PageView::Builder(b) => *b,
        _ => panic!("expected the builder"),
    }
}

/// Pick two of each slot, both leaders, and move to review.
fn fill(b: &mut TeamBuilder) {
    for id in ["bat1", "bat2"] {
        b.toggle(&pid(id)).unwrap();
    }
    b.next_slot().unwrap();
    for id in ["bowl1", "bowl2"] {
        b.toggle(&pid(id)).unwrap();
    }
    b.continue_to_leaders().unwrap();
    b.set_captain(&pid("bat1")).unwrap();
    b.set_vice_captain(&pid("bowl1")).unwrap();
    b.continue_to_review().unwrap();
    b.set_team_name("Spartans XI");
}

#[tokio::test]
async fn create_enroll_then_page_is_view_only() {
    let store = seeded_store();
    let mut b = builder(&store, "c1").await;
    assert_eq!(b.reconciliation().map(|r| r.state), Some(EnrollmentState::NotEnrolled));
    fill(&mut b);

    let outcome = b.submit().await.unwrap();
    assert_eq!(outcome.action, SaveAction::Created);
    assert!(matches!(outcome.enrollment, EnrollOutcome::Enrolled(_)));
    assert_eq!(outcome.banner(), "Team created and entered into the contest.");

    match load(&store, "c1").await {
        PageView::ViewOnly { reconciliation, team } => {
            assert_eq!(reconciliation.state, EnrollmentState::EnrolledWithTeam);
            assert_eq!(team.id, outcome.team.id);
            assert_eq!(team.captain_id, Some(pid("bat1")));
        }
        _ => panic!("expected the view-only page"),
    }
}

#[tokio::test]
async fn closed_contest_saves_team_and_reports_partial() {
    let store = seeded_store();
    let mut closed = ContestSeed::open("c2", "Final");
    closed.status = "archived".into();
    store.upsert_contest(&closed).unwrap();

    let mut b = builder(&store, "c2").await;
    fill(&mut b);
    let outcome = b.submit().await.unwrap();
    assert!(outcome.is_partial());
    assert_eq!(
        outcome.banner(),
        "Team saved, contest join failed: Contest is not open for enrollment"
    );
    assert_eq!(store.list_teams().unwrap().len(), 1);
    assert!(store.list_enrollments().unwrap().is_empty());

    // Reloading finds the saved team through its contest binding and
    // reopens it for editing; a resubmit updates rather than duplicates.
    let mut again = builder(&store, "c2").await;
    assert!(again.is_edit_mode());
    assert_eq!(again.team_name(), "Spartans XI");
    assert_eq!(again.state().selection().len(), 4);
    // A reopened builder starts on the first slot of step 1.
    assert_eq!(again.wizard().step(), WizardStep::SelectPlayers);
    assert_eq!(again.active_slot_id().map(|s| s.as_str()), Some("bat"));
    again.toggle(&pid("bat3")).unwrap();
    assert!(again.continue_to_leaders().is_err());
    again.next_slot().unwrap();
    again.continue_to_leaders().unwrap();
    again.continue_to_review().unwrap();
    let second = again.submit().await.unwrap();
    assert_eq!(second.action, SaveAction::Updated);
    assert_eq!(store.list_teams().unwrap().len(), 1);
    assert_eq!(second.team.player_ids.len(), 5);
}

#[tokio::test]
async fn contest_points_and_eligibility_flow_through() {
    let store = seeded_store();
    let mut spartans = ContestSeed::open("c3", "Spartans Derby");
    spartans.allowed_teams = vec!["DV SPARTANS".into()];
    store.upsert_contest(&spartans).unwrap();
    store
        .set_contest_points(
            &ContestId::from("c3"),
            &[PointsOverride {
                player_id: pid("bat1"),
                points: 7.0,
            }],
        )
        .unwrap();

    let b = builder(&store, "c3").await;
    assert_eq!(b.state().pool().len(), 3);
    assert!(!b.state().pool().contains(&pid("bat3")));
    assert_eq!(b.points().points_for(b.state().pool().get(&pid("bat1")).unwrap()), 7.0);
}

#[tokio::test]
async fn unknown_contest_enroll_is_partial_not_fatal() {
    let store = seeded_store();
    let mut b = builder(&store, "ghost").await;
    fill(&mut b);
    let outcome = b.submit().await.unwrap();
    assert!(outcome.is_partial());
    assert_eq!(outcome.action, SaveAction::Created);
}
