//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `lazyread_core` linkage without a host reviewer.
//! - Run one answer against an in-memory deck and print the resulting order.
//!
//! Usage: `lazyread [settings.json]`
//!
//! Logs go to `$LAZYREAD_LOG_DIR`, or `<tmp>/lazyread/logs` when unset.

use lazyread_core::{
    answer_buttons, default_log_level, init_logging, interval_label_for_code, open_db_in_memory,
    AnswerEffect, AnsweredCard, CardRepository, OrderedQueue, Outcome, Scheduler, Settings,
    SqliteCardRepository, SqliteQueueStore,
};
use std::collections::BTreeMap;
use std::error::Error;
use std::ffi::OsString;
use std::path::PathBuf;

const DEMO_CARDS: usize = 10;
const LOG_DIR_ENV: &str = "LAZYREAD_LOG_DIR";

fn log_dir(configured: Option<OsString>) -> PathBuf {
    configured
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("lazyread").join("logs"))
}

fn main() -> Result<(), Box<dyn Error>> {
    let log_dir = log_dir(std::env::var_os(LOG_DIR_ENV));
    init_logging(default_log_level(), &log_dir.to_string_lossy())?;
    println!("lazyread log_dir={}", log_dir.display());
    println!("lazyread_core ping={}", lazyread_core::ping());
    println!("lazyread_core version={}", lazyread_core::core_version());

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    for button in answer_buttons(settings.prio_enabled) {
        println!(
            "button code={} label={:?} interval={:?}",
            button.code,
            button.label,
            interval_label_for_code(button.code)
        );
    }

    let conn = open_db_in_memory()?;
    let repo = SqliteCardRepository::try_new(&conn)?;
    let deck_id = repo.create_deck("Demo")?;
    let mut cards = Vec::with_capacity(DEMO_CARDS);
    for index in 1..=DEMO_CARDS {
        let mut fields = BTreeMap::new();
        fields.insert(settings.title_field.clone(), format!("Article {index}"));
        let note_id = repo.create_note(&settings.model_name, &fields)?;
        cards.push(repo.create_card(note_id, deck_id)?);
    }

    let store = SqliteQueueStore::try_new(&conn, settings.managed_schema())?;
    let scheduler = Scheduler::new(
        OrderedQueue::new(store),
        settings.policy_table()?,
        settings.prio_enabled,
    );
    let answered = AnsweredCard {
        card_id: cards[0],
        deck_id,
    };
    let effect = scheduler.answer(answered, Outcome::Later.code(), |ease| {
        println!("host ease={ease}");
    })?;
    match &effect {
        AnswerEffect::Repositioned { position, .. } => println!("answer position={position}"),
        AnswerEffect::MovedToTail { position } => println!("answer tail={position}"),
        other => println!("answer effect={other:?}"),
    }
    if let Some(notice) = effect.notice() {
        println!("notice {}", notice.message);
    }

    for (index, item) in scheduler.queue().snapshot(deck_id)?.iter().enumerate() {
        println!("{:>2} {}", index + 1, item.title);
    }
    Ok(())
}
