//! Dispatch, scheduled sweeps and job execution end to end.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use parkhub_core::config::SchedulerConfig;
use parkhub_core::time::Clock;
use parkhub_entity::job::{JobStatus, Task};
use parkhub_worker::{CadenceScheduler, Message, Recipient};

use crate::helpers::TestApp;

fn with_subject(messages: &[Message], subject: &str) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.subject == subject)
        .cloned()
        .collect()
}

fn channel_posts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| matches!(m.recipient, Recipient::Channel { .. }))
        .map(|m| m.body.clone())
        .collect()
}

/// Park for `minutes` and vacate.
async fn settled_stay(app: &TestApp, principal: &parkhub_service::Principal, minutes: i64) {
    let lot_id = app.engine.query.list_lots().await.unwrap()[0].lot.id;
    let reservation = app.engine.allocator.book(principal, lot_id, 1).await.unwrap()[0].clone();
    app.engine
        .lifecycle
        .confirm_park(principal, reservation.id)
        .await
        .unwrap();
    app.advance_minutes(minutes);
    app.engine
        .lifecycle
        .vacate(principal, reservation.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_new_lot_is_announced_and_indexed() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 2, 20.0).await;

    assert_eq!(app.runner.run_until_idle().await, 2);

    assert_eq!(
        channel_posts(&app.notifier.sent()),
        vec!["New parking lot available: Central Plaza at 12 MG Road"]
    );
    let found = app.engine.query.search_lots("plaza").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].lot.id, lot.id);
}

#[tokio::test]
async fn test_export_job_delivers_csv() {
    let app = TestApp::new();
    app.lot("Central Plaza", 2, 20.0).await;
    let (alice, principal) = app.user("alice").await;
    settled_stay(&app, &principal, 45).await;

    let job = app
        .queue
        .enqueue_task(&Task::ExportHistoryCsv { user_id: alice.id })
        .await
        .unwrap();
    app.runner.run_until_idle().await;

    let done = app.queue.find(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result.unwrap()["exported"], 1);

    let sent = app.notifier.sent();
    let exports = with_subject(&sent, "Your ParkHub History Export");
    assert_eq!(exports.len(), 1);
    let attachment = &exports[0].attachments[0];
    assert_eq!(attachment.file_name, "alice_parking_history_20240601.csv");
    let csv = String::from_utf8(attachment.bytes.clone()).unwrap();
    assert_eq!(
        csv.lines().nth(1).unwrap(),
        "Central Plaza,1,2024-06-01 14:30:00,2024-06-01 14:30:00,2024-06-01 15:15:00,20.00"
    );
    assert!(channel_posts(&sent).contains(
        &"Hi alice, your CSV export is complete and has been sent to your email: alice@example.com."
            .to_string()
    ));
}

#[tokio::test]
async fn test_export_without_history_sends_nothing() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice").await;

    let job = app
        .queue
        .enqueue_task(&Task::ExportHistoryCsv { user_id: alice.id })
        .await
        .unwrap();
    app.runner.run_until_idle().await;

    assert_eq!(
        app.queue.find(job.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_undeliverable_export_is_retried_then_failed() {
    let app = TestApp::new();
    app.lot("Central Plaza", 1, 20.0).await;
    let (ghost, principal) = app.user("ghost").await;
    settled_stay(&app, &principal, 60).await;
    app.notifier.break_mailbox("ghost@example.com");

    let job = app
        .queue
        .enqueue_task(&Task::ExportHistoryCsv { user_id: ghost.id })
        .await
        .unwrap();

    app.runner.run_until_idle().await;
    let retrying = app.queue.find(job.id).await.unwrap().unwrap();
    assert_eq!(retrying.status, JobStatus::Pending);
    assert_eq!(retrying.attempts, 1);

    for _ in 0..3 {
        app.advance_minutes(1);
        app.runner.run_until_idle().await;
    }

    let failed = app.queue.find(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 3);
    assert!(
        failed
            .error_message
            .unwrap()
            .contains("connection refused")
    );
    assert_eq!(app.queue.stats().await.unwrap().failed, 1);
}

#[tokio::test]
async fn test_daily_reminder_fires_on_cadence() {
    let app = TestApp::new();
    app.lot("Central Plaza", 2, 20.0).await;
    let (_, active) = app.user("active").await;
    app.user("idle").await;
    settled_stay(&app, &active, 60).await;
    app.runner.run_until_idle().await;

    let scheduler = CadenceScheduler::from_config(
        app.queue.clone(),
        &SchedulerConfig::default(),
        app.clock.now(),
    )
    .await
    .unwrap();

    // 19:00 at UTC+05:30.
    let due = Utc.with_ymd_and_hms(2024, 6, 1, 13, 30, 0).unwrap();
    assert_eq!(scheduler.next_fire("daily_reminder_sweep").await, Some(due));
    assert!(scheduler.fire_due(app.clock.now()).await.is_empty());

    app.clock.set(due);
    assert_eq!(
        scheduler.fire_due(app.clock.now()).await,
        vec!["daily_reminder_sweep"]
    );
    assert!(scheduler.fire_due(app.clock.now()).await.is_empty());
    assert_eq!(
        scheduler.next_fire("daily_reminder_sweep").await,
        Some(due + chrono::Duration::days(1))
    );

    assert_eq!(app.runner.run_until_idle().await, 1);
    let sent = app.notifier.sent();
    let reminders = with_subject(&sent, "A Friendly Reminder from ParkHub");
    assert_eq!(reminders.len(), 1);
    assert!(matches!(
        &reminders[0].recipient,
        Recipient::User { username, .. } if username == "idle"
    ));
    assert_eq!(
        channel_posts(&sent).last().unwrap(),
        "Sent reminders to 1/1 inactive users"
    );
}

#[tokio::test]
async fn test_monthly_report_fires_on_first_of_month() {
    let app = TestApp::new();
    app.lot("Central Plaza", 2, 20.0).await;
    let (_, alice) = app.user("alice").await;
    settled_stay(&app, &alice, 150).await;
    app.runner.run_until_idle().await;

    let scheduler = Arc::new(
        CadenceScheduler::from_config(
            app.queue.clone(),
            &SchedulerConfig::default(),
            app.clock.now(),
        )
        .await
        .unwrap(),
    );

    // 01:00 on July 1st at UTC+05:30.
    let due = Utc.with_ymd_and_hms(2024, 6, 30, 19, 30, 0).unwrap();
    assert_eq!(scheduler.next_fire("monthly_report_sweep").await, Some(due));

    app.clock.set(due);
    let fired = scheduler.fire_due(app.clock.now()).await;
    assert!(fired.contains(&"monthly_report_sweep".to_string()));
    app.runner.run_until_idle().await;

    let sent = app.notifier.sent();
    let reports = with_subject(&sent, "Your ParkHub Monthly Report");
    assert_eq!(reports.len(), 1);
    let attachment = &reports[0].attachments[0];
    assert_eq!(attachment.file_name, "alice_report_2024_07.html");
    let html = String::from_utf8(attachment.bytes.clone()).unwrap();
    assert!(html.contains("&#8377;50.00"));
    assert!(channel_posts(&sent).contains(&"Processed and sent reports for 1/1 users".to_string()));
}
