use lazyread_core::db::open_db_in_memory;
use lazyread_core::{
    AnsweredCard, CardId, CardQueue, CardRepository, DeckId, ManagedSchema, OrderedQueue,
    QueueError, QueueStore, RepoError, SqliteCardRepository, SqliteQueueStore,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use uuid::Uuid;

fn schema(prio_enabled: bool) -> ManagedSchema {
    ManagedSchema {
        model_name: "IR3".to_string(),
        title_field: "Title".to_string(),
        prio_field: "Priority".to_string(),
        prio_enabled,
    }
}

fn add_card(repo: &SqliteCardRepository<'_>, deck_id: DeckId, model: &str, title: &str) -> CardId {
    let mut fields = BTreeMap::new();
    fields.insert("Title".to_string(), title.to_string());
    let note_id = repo.create_note(model, &fields).expect("create note");
    repo.create_card(note_id, deck_id).expect("create card")
}

fn seed_deck(conn: &Connection, count: usize) -> (DeckId, Vec<CardId>) {
    let repo = SqliteCardRepository::try_new(conn).expect("open card repository");
    let deck_id = repo.create_deck("Reading").expect("create deck");
    let cards = (0..count)
        .map(|index| add_card(&repo, deck_id, "IR3", &format!("article {index}")))
        .collect();
    (deck_id, cards)
}

fn open_queue(conn: &Connection) -> OrderedQueue<SqliteQueueStore<'_>> {
    let store = SqliteQueueStore::try_new(conn, schema(false)).expect("open store");
    OrderedQueue::new(store)
}

fn snapshot_ids(store: &SqliteQueueStore<'_>, deck_id: DeckId) -> Vec<CardId> {
    store
        .query_active_items(deck_id)
        .expect("query active items")
        .into_iter()
        .map(|item| item.card_id)
        .collect()
}

#[test]
fn snapshot_lists_managed_cards_in_creation_order() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 4);
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    let items = store.query_active_items(deck_id).expect("query active items");
    assert_eq!(items.iter().map(|item| item.card_id).collect::<Vec<_>>(), cards);
    assert_eq!(items[2].title, "article 2");
    assert!(items.iter().all(|item| item.deck_id == deck_id));
    assert!(items.iter().all(|item| item.priority.is_none()));
}

#[test]
fn snapshot_excludes_suspended_and_unmanaged_cards() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let basic = add_card(&repo, deck_id, "Basic", "flashcard");
    repo.set_suspended(cards[1], true).expect("set suspended");

    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");
    let ids = snapshot_ids(&store, deck_id);
    assert_eq!(ids, vec![cards[0], cards[2]]);
    assert!(!ids.contains(&basic));

    repo.set_suspended(cards[1], false).expect("set suspended");
    assert_eq!(snapshot_ids(&store, deck_id).len(), 3);
}

#[test]
fn snapshot_is_scoped_to_one_deck() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_a, cards_a) = seed_deck(&conn, 2);
    let (deck_b, cards_b) = seed_deck(&conn, 3);
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    assert_eq!(snapshot_ids(&store, deck_a), cards_a);
    assert_eq!(snapshot_ids(&store, deck_b), cards_b);
    assert!(snapshot_ids(&store, Uuid::new_v4()).is_empty());
}

#[test]
fn priorities_are_read_only_in_priority_mode() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let notes: Vec<_> = repo
        .list_deck_cards(deck_id)
        .expect("list deck cards")
        .into_iter()
        .map(|card| card.note_id)
        .collect();
    repo.set_note_field(notes[0], "Priority", "7").expect("set note field");
    repo.set_note_field(notes[1], "Priority", "urgent").expect("set note field");

    let plain = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");
    assert!(plain
        .query_active_items(deck_id)
        .expect("query active items")
        .iter()
        .all(|item| item.priority.is_none()));

    let prio = SqliteQueueStore::try_new(&conn, schema(true)).expect("open store");
    let items = prio.query_active_items(deck_id).expect("query active items");
    assert_eq!(items[0].card_id, cards[0]);
    assert_eq!(items[0].priority, Some(7));
    assert_eq!(items[1].priority, None);
    assert_eq!(items[2].priority, None);
}

#[test]
fn commit_scoped_writes_order_and_clears_host_scheduling() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    repo.mark_reviewed(cards[0], 12).expect("mark card reviewed");

    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");
    let order = vec![cards[2], cards[0], cards[1]];
    store.commit_scoped(&order).expect("commit scoped order");

    assert_eq!(snapshot_ids(&store, deck_id), order);
    let records = repo.list_deck_cards(deck_id).expect("list deck cards");
    assert_eq!(
        records.iter().map(|record| record.due).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let reviewed = repo.get_card(cards[0]).expect("read card").expect("card exists");
    assert_eq!(reviewed.queue, CardQueue::New);
    assert_eq!(reviewed.interval_days, 0);
}

#[test]
fn commit_with_unknown_card_rolls_back_every_write() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    repo.mark_reviewed(cards[0], 5).expect("mark card reviewed");
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    let ghost = Uuid::new_v4();
    let err = store
        .commit_scoped(&[cards[2], cards[0], ghost, cards[1]])
        .expect_err("commit must fail");
    assert!(matches!(err, RepoError::CardNotFound(id) if id == ghost));

    assert_eq!(snapshot_ids(&store, deck_id), cards);
    let untouched = repo.get_card(cards[0]).expect("read card").expect("card exists");
    assert_eq!(untouched.queue, CardQueue::Review);
    assert_eq!(untouched.interval_days, 5);
}

#[test]
fn commit_order_rejects_duplicates_without_writing() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    let err = store
        .commit_order(&[cards[2], cards[2], cards[0]])
        .expect_err("commit must fail");
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert_eq!(snapshot_ids(&store, deck_id), cards);
}

#[test]
fn partial_orders_are_rejected_without_writing() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    repo.mark_reviewed(cards[1], 7).expect("mark card reviewed");
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    let err = store
        .commit_order(&[cards[2]])
        .expect_err("single card is not the whole deck");
    assert!(matches!(err, RepoError::InvalidData(_)), "{err}");
    let err = store
        .commit_scoped(&[cards[1]])
        .expect_err("single card is not the whole deck");
    assert!(matches!(err, RepoError::InvalidData(_)), "{err}");

    assert_eq!(snapshot_ids(&store, deck_id), cards);
    let records = repo.list_deck_cards(deck_id).expect("list deck cards");
    assert_eq!(
        records.iter().map(|record| record.due).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let reviewed = repo.get_card(cards[1]).expect("read card").expect("card exists");
    assert_eq!(reviewed.queue, CardQueue::Review);
    assert_eq!(reviewed.interval_days, 7);
}

#[test]
fn orders_mixing_decks_or_inactive_cards_are_rejected() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 2);
    let (other_deck, others) = seed_deck(&conn, 1);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let store = SqliteQueueStore::try_new(&conn, schema(false)).expect("open store");

    let err = store
        .commit_order(&[cards[1], cards[0], others[0]])
        .expect_err("card from another deck");
    assert!(matches!(err, RepoError::InvalidData(_)), "{err}");

    repo.set_suspended(cards[0], true).expect("set suspended");
    let err = store
        .commit_scoped(&[cards[1], cards[0]])
        .expect_err("suspended card is not active");
    assert!(matches!(err, RepoError::InvalidData(_)), "{err}");

    store.commit_scoped(&[cards[1]]).expect("commit scoped order");
    assert_eq!(snapshot_ids(&store, deck_id), vec![cards[1]]);
    assert_eq!(snapshot_ids(&store, other_deck), others);
}

#[test]
fn reorder_commits_explicit_permutation() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 4);
    let queue = open_queue(&conn);

    let order = vec![cards[3], cards[1], cards[0], cards[2]];
    queue.reorder(deck_id, &order).expect("reorder commits");
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), order);
}

#[test]
fn reorder_with_mismatched_membership_commits_nothing() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let queue = open_queue(&conn);

    let missing = queue.reorder(deck_id, &[cards[2], cards[0]]).expect_err("reorder must fail");
    match missing {
        QueueError::MembershipMismatch(mismatch) => {
            assert_eq!(mismatch.missing, vec![cards[1]]);
            assert!(mismatch.unexpected.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }

    let stranger = Uuid::new_v4();
    let extra = queue
        .reorder(deck_id, &[cards[2], cards[0], cards[1], stranger])
        .expect_err("reorder must fail");
    assert!(matches!(
        extra,
        QueueError::MembershipMismatch(ref mismatch) if mismatch.unexpected == vec![stranger]
    ));

    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), cards);
}

#[test]
fn reorder_after_suspension_must_use_fresh_snapshot() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let queue = open_queue(&conn);

    let stale = queue.snapshot_ids(deck_id).expect("snapshot ids");
    repo.set_suspended(cards[1], true).expect("set suspended");

    assert!(matches!(
        queue.reorder(deck_id, &stale),
        Err(QueueError::MembershipMismatch(_))
    ));
    queue.reorder(deck_id, &[cards[2], cards[0]]).expect("reorder commits");
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), vec![cards[2], cards[0]]);
}

#[test]
fn reposition_moves_card_and_shifts_the_rest() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 5);
    let queue = open_queue(&conn);
    let card = AnsweredCard {
        card_id: cards[0],
        deck_id,
    };

    let moved = queue.reposition(card, 3).expect("reposition commits");
    assert_eq!(moved.position, 3);
    assert_eq!(moved.total, 5);
    assert_eq!(
        queue.snapshot_ids(deck_id).expect("snapshot ids"),
        vec![cards[1], cards[2], cards[0], cards[3], cards[4]]
    );

    let tail = queue.reposition(card, 99).expect("reposition commits");
    assert_eq!(tail.position, 99);
    assert_eq!(tail.total, 5);
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids")[4], cards[0]);
}

#[test]
fn reposition_of_inactive_card_is_rejected() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 3);
    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    repo.set_suspended(cards[0], true).expect("set suspended");
    let queue = open_queue(&conn);

    let err = queue
        .reposition(
            AnsweredCard {
                card_id: cards[0],
                deck_id,
            },
            1,
        )
        .expect_err("reposition must fail");
    assert!(matches!(err, QueueError::ItemNotInQueue { card_id, .. } if card_id == cards[0]));
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), vec![cards[1], cards[2]]);
}

#[test]
fn new_cards_are_appended_after_committed_order() {
    let conn = open_db_in_memory().expect("open in-memory deck store");
    let (deck_id, cards) = seed_deck(&conn, 2);
    let queue = open_queue(&conn);
    queue.reorder(deck_id, &[cards[1], cards[0]]).expect("reorder commits");

    let repo = SqliteCardRepository::try_new(&conn).expect("open card repository");
    let fresh = add_card(&repo, deck_id, "IR3", "new article");
    assert_eq!(
        queue.snapshot_ids(deck_id).expect("snapshot ids"),
        vec![cards[1], cards[0], fresh]
    );

    repo.delete_card(cards[0]).expect("delete card");
    assert_eq!(queue.snapshot_ids(deck_id).expect("snapshot ids"), vec![cards[1], fresh]);
}
