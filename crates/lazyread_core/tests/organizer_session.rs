use lazyread_core::db::open_db_in_memory;
use lazyread_core::{
    CardId, CardRepository, DeckId, MoveOutcome, OrderedQueue, OrganizerSession, QueueError,
    Settings, SqliteCardRepository, SqliteQueueStore,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use std::collections::BTreeMap;

fn seed_deck(conn: &Connection, titles: &[&str]) -> (DeckId, Vec<CardId>) {
    let repo = SqliteCardRepository::try_new(conn).expect("open card repository");
    let deck_id = repo.create_deck("Reading").expect("create deck");
    let cards = titles
        .iter()
        .map(|title| {
            let mut fields = BTreeMap::new();
            fields.insert("Title".to_string(), title.to_string());
            let note_id = repo.create_note("IR3", &fields).expect("create note");
            repo.create_card(note_id, deck_id).expect("create card")
        })
        .collect();
    (deck_id, cards)
}

fn open_queue<'a>(
    conn: &'a Connection,
    settings: &Settings,
) -> OrderedQueue<SqliteQueueStore<'a>> {
    let store = SqliteQueueStore::try_new(conn, settings.managed_schema()).expect("open store");
    OrderedQueue::new(store)
}

#[test]
fn open_labels_entries_with_padded_positions() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, &["<b>First</b> read", "Second", "Third"]);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    let session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect("open organizer");

    assert_eq!(session.order(), cards);
    assert_eq!(session.entries()[0].label, "❰ 1 ❱\tFirst read");
    assert_eq!(session.entries()[2].label, "❰ 3 ❱\tThird");
}

#[test]
fn open_on_empty_deck_is_rejected() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, _) = seed_deck(&conn, &[]);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    let err = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect_err("empty deck has nothing to organize");
    assert!(matches!(err, QueueError::EmptyQueue(id) if id == deck_id));
}

#[test]
fn save_commits_local_moves() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, &["a", "b", "c", "d"]);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    let mut session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect("open organizer");
    session.select_indices(&[3]);
    assert_eq!(session.move_to_top().expect("move to top"), MoveOutcome::Moved);
    session.select_indices(&[1]);
    session.move_down().expect("move down");

    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), cards);
    session.save(&queue).expect("save organizer order");
    assert_eq!(
        queue.snapshot_ids(deck_id).expect("snapshot ids"),
        vec![cards[3], cards[1], cards[0], cards[2]]
    );
}

#[test]
fn dropping_session_discards_changes() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, &["a", "b", "c"]);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    {
        let mut session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
            .expect("open organizer");
        session.select_indices(&[2]);
        session.move_to_top().expect("move to top");
    }

    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), cards);
}

#[test]
fn save_after_external_suspension_fails_until_refresh() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, &["a", "b", "c"]);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    let mut session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect("open organizer");
    session.select_indices(&[0, 2]);

    SqliteCardRepository::try_new(&conn)
        .expect("open card repository")
        .set_suspended(cards[1], true)
        .expect("set suspended");

    let stale = session.clone();
    assert!(matches!(
        stale.save(&queue),
        Err(QueueError::MembershipMismatch(_))
    ));

    session.refresh(&queue).expect("refresh organizer");
    assert_eq!(session.order(), vec![cards[0], cards[2]]);
    assert_eq!(session.selected_ids(), vec![cards[0], cards[2]]);

    session.select_indices(&[1]);
    session.move_up().expect("move up");
    session.save(&queue).expect("save organizer order");
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), vec![cards[2], cards[0]]);
}

#[test]
fn randomize_then_save_keeps_membership() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let titles: Vec<String> = (0..12).map(|index| format!("article {index}")).collect();
    let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
    let (deck_id, cards) = seed_deck(&conn, &refs);
    let settings = Settings::default();
    let queue = open_queue(&conn, &settings);

    let mut session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect("open organizer");
    session.randomize_with(&mut StdRng::seed_from_u64(9));
    let shuffled = session.order();
    session.save(&queue).expect("save organizer order");

    let committed = queue.snapshot_ids(deck_id).expect("snapshot ids");
    assert_eq!(committed, shuffled);
    let mut sorted = committed;
    sorted.sort();
    let mut expected = cards;
    expected.sort();
    assert_eq!(sorted, expected);
}

#[test]
fn priority_mode_labels_show_priority() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, _) = seed_deck(&conn, &["low", "high", "unset"]);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let notes: Vec<_> = repo
        .list_deck_cards(deck_id)
        .expect("list deck cards")
        .into_iter()
        .map(|card| card.note_id)
        .collect();
    repo.set_note_field(notes[0], "Priority", "2").expect("set note field");
    repo.set_note_field(notes[1], "Priority", "9").expect("set note field");

    let settings = Settings {
        prio_enabled: true,
        organizer_format: "[{info}] {title}".to_string(),
        ..Settings::default()
    };
    let queue = open_queue(&conn, &settings);
    let mut session = OrganizerSession::open(&queue, deck_id, settings.organizer_options())
        .expect("open organizer");

    let labels: Vec<&str> = session
        .entries()
        .iter()
        .map(|entry| entry.label.as_str())
        .collect();
    assert_eq!(labels, vec!["[2] low", "[9] high", "[] unset"]);

    let mut rng = StdRng::seed_from_u64(21);
    for _ in 0..20 {
        session.randomize_with(&mut rng);
        assert_eq!(session.entries()[2].item.title, "unset");
    }
}
