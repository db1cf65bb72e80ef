use std::sync::Arc;
use std::time::Duration;

use quire_core::channel::InMemoryHub;
use quire_core::presence::{editing_summary, typing_summary};
use quire_core::store::{DocumentStore, MemoryStore};
use quire_core::{
    AppContext, CollabConfig, CollabSession, Document, Resolution, SessionEvent, UserProfile,
};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep, timeout};

use crate::cli::Scenario;
use crate::error::CliError;

/// Time for session drivers to process in-flight frames
const SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub passed: bool,
    pub steps: Vec<String>,
}

impl ScenarioReport {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            steps: Vec::new(),
        }
    }

    pub fn step(&mut self, line: impl Into<String>) {
        self.steps.push(line.into());
    }

    pub fn check(&mut self, ok: bool, what: impl AsRef<str>) {
        let marker = if ok { "ok" } else { "FAILED" };
        self.steps.push(format!("{marker}: {}", what.as_ref()));
        self.passed &= ok;
    }

    pub fn lines(&self) -> Vec<String> {
        let verdict = if self.passed { "passed" } else { "failed" };
        let mut lines = vec![format!("== {} ({verdict})", self.name)];
        lines.extend(self.steps.iter().map(|step| format!("   {step}")));
        lines
    }
}

pub async fn run_simulate(scenario: Scenario, as_json: bool) -> Result<(), CliError> {
    let config = CollabConfig::default();
    let scenarios = match scenario {
        Scenario::All => vec![Scenario::Debounce, Scenario::Conflict, Scenario::Typing],
        single => vec![single],
    };

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let report = match scenario {
            Scenario::Debounce => debounce_scenario(&config).await?,
            Scenario::Conflict => conflict_scenario(&config).await?,
            Scenario::Typing | Scenario::All => typing_scenario(&config).await?,
        };
        reports.push(report);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            for line in report.lines() {
                println!("{line}");
            }
        }
    }

    match reports.iter().find(|report| !report.passed) {
        Some(failed) => Err(CliError::ScenarioFailed(failed.name.to_string())),
        None => Ok(()),
    }
}

/// Two clients with their own sessions on one shared note
struct Clients {
    store: Arc<MemoryStore>,
    document: Document,
    alice: CollabSession,
    bob: CollabSession,
}

impl Clients {
    async fn open(config: &CollabConfig, content: &str) -> Result<Self, CliError> {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(InMemoryHub::new());
        let alice = UserProfile::new("alice").with_full_name("Alice");
        let bob = UserProfile::new("bob").with_full_name("Bob");

        let document = Document::new(alice.id.clone(), "Shared note", content);
        store.insert(&document).await?;

        let context = AppContext::new(alice, store.clone(), hub, config.clone())?;
        let alice_session = CollabSession::open(&context, document.id).await?;
        let bob_session = CollabSession::open(&context.for_user(bob), document.id).await?;
        alice_session.start_editing().await?;
        bob_session.start_editing().await?;
        sleep(SETTLE).await;

        Ok(Self {
            store,
            document,
            alice: alice_session,
            bob: bob_session,
        })
    }

    async fn stored_content(&self) -> Result<Option<String>, CliError> {
        Ok(self
            .store
            .select(self.document.id)
            .await?
            .map(|document| document.content))
    }

    async fn close(self) -> Result<(), CliError> {
        self.alice.close().await?;
        self.bob.close().await?;
        Ok(())
    }
}

async fn wait_for_event(
    rx: &mut broadcast::Receiver<SessionEvent>,
    within: Duration,
    matches: impl Fn(&SessionEvent) -> bool,
) -> Option<SessionEvent> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return Some(event),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    };
    timeout(within, wait).await.ok().flatten()
}

pub async fn debounce_scenario(config: &CollabConfig) -> Result<ScenarioReport, CliError> {
    let mut report = ScenarioReport::new("debounce");
    let clients = Clients::open(config, "").await?;
    let mut events = clients.alice.subscribe();

    for prefix in ["H", "He", "Hel", "Hell", "Hello"] {
        clients.alice.save_note_content(prefix)?;
        sleep(config.debounce() / 10).await;
    }
    report.step("alice typed \"Hello\" one keystroke at a time");

    let saved = wait_for_event(&mut events, config.debounce() * 3, |event| {
        matches!(event, SessionEvent::Saved { .. })
    })
    .await;
    report.check(saved.is_some(), "saved once the quiet period elapsed");

    let writes = clients.store.write_count();
    report.check(writes == 1, format!("exactly one write issued ({writes})"));
    let stored = clients.stored_content().await?;
    report.check(stored.as_deref() == Some("Hello"), "store holds \"Hello\"");
    report.check(
        clients.alice.last_saved().is_some(),
        "last saved timestamp is set",
    );

    clients.close().await?;
    Ok(report)
}

pub async fn conflict_scenario(config: &CollabConfig) -> Result<ScenarioReport, CliError> {
    let mut report = ScenarioReport::new("conflict");
    let clients = Clients::open(config, "Hello").await?;
    let mut alice_events = clients.alice.subscribe();

    // Bob's window closes first while Alice's edit is still pending.
    clients.bob.save_note_content("Hello world")?;
    sleep(config.debounce() / 2).await;
    clients.alice.save_note_content("Hello there")?;
    report.step("bob saved \"Hello world\" while alice had \"Hello there\" unsaved");

    let detected = wait_for_event(&mut alice_events, config.debounce() * 3, |event| {
        matches!(event, SessionEvent::ConflictDetected { .. })
    })
    .await;
    let Some(SessionEvent::ConflictDetected { conflict }) = detected else {
        report.check(false, "alice sees a conflict");
        clients.close().await?;
        return Ok(report);
    };
    report.check(
        conflict.local_value == "Hello there"
            && conflict.remote_value == "Hello world"
            && conflict.remote_user.as_str() == "bob",
        format!(
            "conflict on {}: local \"{}\", remote \"{}\" from {}",
            conflict.field, conflict.local_value, conflict.remote_value, conflict.remote_user
        ),
    );

    let expected = format!("Hello there{}Hello world", config.merge_separator);
    let resolved = clients
        .alice
        .resolve_conflict(conflict.id, Resolution::Merge)?;
    report.check(
        resolved.value.as_deref() == Some(expected.as_str()),
        "merge joins both values around the separator",
    );

    let saved = wait_for_event(&mut alice_events, config.debounce() * 3, |event| {
        matches!(event, SessionEvent::Saved { .. })
    })
    .await;
    report.check(saved.is_some(), "merged value saved");
    let stored = clients.stored_content().await?;
    report.check(
        stored.as_deref() == Some(expected.as_str()),
        "store holds the merged value",
    );

    sleep(SETTLE).await;
    report.check(
        clients.bob.document().content == expected,
        "bob received the merged value",
    );

    clients.close().await?;
    Ok(report)
}

pub async fn typing_scenario(config: &CollabConfig) -> Result<ScenarioReport, CliError> {
    let mut report = ScenarioReport::new("typing");
    let clients = Clients::open(config, "").await?;
    let mut bob_events = clients.bob.subscribe();

    let sent = clients.alice.broadcast_user_typing().await;
    report.check(sent, "alice's typing signal was accepted");

    let started = wait_for_event(&mut bob_events, SETTLE * 10, |event| {
        matches!(event, SessionEvent::TypingStarted { .. })
    })
    .await;
    report.check(started.is_some(), "bob sees alice typing");
    let roster = clients.bob.editing_users();
    let editing = editing_summary(&roster);
    report.check(editing == "1 editing", format!("bob's status bar: {editing}"));
    if let Some(summary) = typing_summary(&roster) {
        report.step(format!("bob's indicator: {summary}"));
    }

    let stopped = wait_for_event(
        &mut bob_events,
        config.typing_expiry() + SETTLE * 5,
        |event| matches!(event, SessionEvent::TypingStopped { .. }),
    )
    .await;
    report.check(
        stopped.is_some(),
        format!(
            "indicator cleared {}ms after the last signal",
            config.typing_expiry_ms
        ),
    );
    report.check(
        clients
            .bob
            .editing_users()
            .iter()
            .all(|participant| !participant.is_typing),
        "no one shown as typing",
    );

    clients.close().await?;
    Ok(report)
}
