//! Deterministic scenario harness for the trigger engine.
//!
//! Drives an in-memory engine through a scripted day — a one-shot time
//! reminder, a daily home geofence, a snooze round — on a manual clock and
//! prints a JSON report of every emitted firing. Useful as a smoke check
//! that dispatch gating behaves end-to-end without an OS.

use chrono::{Duration, TimeZone, Utc};
use remi::model::{
    Category, CreateLocationReminder, CreateTimeReminder, Priority, RecurrencePolicy,
    TriggerDirection,
};
use remi::testkit::{FakeSpatialService, FakeTimeService};
use remi::triggers::spatial::spatial_handle_for;
use remi::{EngineConfig, ManualClock, ReminderStore, SqliteStore, Transition, TriggerEngine};
use std::sync::Arc;
use tokio::sync::mpsc;

fn main() {
    if let Err(e) = run() {
        eprintln!("remi-sim failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let start = Utc
        .with_ymd_and_hms(2026, 3, 4, 9, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid scenario start time"))?;

    let store = Arc::new(SqliteStore::open_in_memory()?);
    let clock = Arc::new(ManualClock::new(start));
    let (fire_tx, mut fire_rx) = mpsc::unbounded_channel();
    let engine = TriggerEngine::new(
        store.clone(),
        Arc::new(FakeTimeService::default()),
        Arc::new(FakeSpatialService::default()),
        clock.clone(),
        EngineConfig::default(),
        fire_tx,
    );

    let mut steps = Vec::new();
    let mut record = |label: &str, fire_rx: &mut mpsc::UnboundedReceiver<remi::FirePayload>| {
        let mut fired = Vec::new();
        while let Ok(payload) = fire_rx.try_recv() {
            fired.push(serde_json::json!({
                "id": payload.id,
                "title": payload.title,
                "body": payload.body,
            }));
        }
        steps.push(serde_json::json!({ "step": label, "fired": fired }));
    };

    // A one-shot reminder five minutes out.
    let call_mom = engine.create_time_reminder(CreateTimeReminder {
        message: "call mom".to_owned(),
        scheduled_time: start + Duration::minutes(5),
        recurrence: None,
        priority: Priority::High,
        category: Category::Personal,
    })?;
    record("create call-mom reminder", &mut fire_rx);

    clock.set(start + Duration::minutes(5));
    engine.dispatcher().handle_time_trigger(&call_mom)?;
    record("wake-up at +5m", &mut fire_rx);

    // Duplicate delivery must be a no-op.
    engine.dispatcher().handle_time_trigger(&call_mom)?;
    record("duplicate wake-up", &mut fire_rx);

    // A daily geofence at home.
    let bins = engine.create_location_reminder(CreateLocationReminder {
        message: "take out bins".to_owned(),
        latitude: 55.9533,
        longitude: -3.1883,
        radius_meters: 120.0,
        place_name: Some("home".to_owned()),
        direction: TriggerDirection::Enter,
        policy: RecurrencePolicy::Daily,
        time_constraint: None,
        priority: Priority::Normal,
        category: Category::Personal,
    })?;
    let bins_handle = spatial_handle_for(&bins);

    engine
        .dispatcher()
        .handle_spatial_transition(&bins_handle, Transition::Enter)?;
    record("arrive home", &mut fire_rx);

    clock.advance(Duration::minutes(10));
    engine
        .dispatcher()
        .handle_spatial_transition(&bins_handle, Transition::Enter)?;
    record("arrive home again (same day)", &mut fire_rx);

    clock.advance(Duration::days(1));
    engine
        .dispatcher()
        .handle_spatial_transition(&bins_handle, Transition::Enter)?;
    record("arrive home next day", &mut fire_rx);

    // Snooze gate: suppressed inside the window, fires after.
    engine.snooze(&bins, 30)?;
    clock.advance(Duration::minutes(10));
    engine
        .dispatcher()
        .handle_spatial_transition(&bins_handle, Transition::Enter)?;
    record("arrive home while snoozed", &mut fire_rx);

    clock.advance(Duration::days(1));
    engine
        .dispatcher()
        .handle_spatial_transition(&bins_handle, Transition::Enter)?;
    record("arrive home after snooze elapsed", &mut fire_rx);

    let history: Vec<String> = store
        .fire_history(20)?
        .into_iter()
        .map(|entry| format!("{} {}", entry.at.format("%Y-%m-%d %H:%M"), entry.summary))
        .collect();

    let report = serde_json::json!({
        "scenario_start": start.to_rfc3339(),
        "steps": steps,
        "fire_history": history,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
