//! Park confirmation, vacate and cost settlement.

use parkhub_entity::spot::SpotStatus;
use parkhub_service::EngineError;

use crate::helpers::TestApp;

async fn settle_after(minutes: i64) -> f64 {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 1, 20.0).await;
    let (_, driver) = app.user("driver").await;
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();

    app.engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
    app.advance_minutes(minutes);

    let settled = app
        .engine
        .lifecycle
        .vacate(&driver, reservation.id)
        .await
        .unwrap();
    assert!(!settled.is_active);
    settled.parking_cost.unwrap()
}

#[tokio::test]
async fn test_short_stay_bills_one_hour() {
    assert_eq!(settle_after(45).await, 20.00);
}

#[tokio::test]
async fn test_fractional_hours_are_billed_exactly() {
    assert_eq!(settle_after(150).await, 50.00);
    assert_eq!(settle_after(100).await, 33.33);
}

#[tokio::test]
async fn test_cancel_before_parking_is_free() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 1, 20.0).await;
    let (_, driver) = app.user("driver").await;
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();
    app.advance_minutes(300);

    let cancelled = app
        .engine
        .lifecycle
        .vacate(&driver, reservation.id)
        .await
        .unwrap();

    assert_eq!(cancelled.parking_cost, Some(0.0));
    assert!(cancelled.parking_timestamp.is_none());
    assert_eq!(app.spots(lot.id).await[0].status, SpotStatus::Available);
}

#[tokio::test]
async fn test_spot_status_follows_lifecycle() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 1, 20.0).await;
    let (_, driver) = app.user("driver").await;
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();
    assert_eq!(app.spots(lot.id).await[0].status, SpotStatus::Booked);

    app.engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
    assert_eq!(app.spots(lot.id).await[0].status, SpotStatus::Occupied);

    app.engine
        .lifecycle
        .vacate(&driver, reservation.id)
        .await
        .unwrap();
    assert_eq!(app.spots(lot.id).await[0].status, SpotStatus::Available);
}

#[tokio::test]
async fn test_double_park_is_rejected() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 1, 20.0).await;
    let (_, driver) = app.user("driver").await;
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();

    let parked = app
        .engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
    app.advance_minutes(10);

    let err = app
        .engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyParked(id) if id == reservation.id));

    let history = app
        .engine
        .query
        .user_reservations(driver.user_id)
        .await
        .unwrap();
    assert_eq!(
        history[0].reservation.parking_timestamp,
        parked.parking_timestamp
    );
}

#[tokio::test]
async fn test_foreign_or_settled_reservation_is_not_found() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 1, 20.0).await;
    let (_, owner) = app.user("owner").await;
    let (_, other) = app.user("other").await;
    let reservation = app.engine.allocator.book(&owner, lot.id, 1).await.unwrap()[0].clone();

    let err = app
        .engine
        .lifecycle
        .vacate(&other, reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    app.engine
        .lifecycle
        .vacate(&owner, reservation.id)
        .await
        .unwrap();
    let err = app
        .engine
        .lifecycle
        .confirm_park(&owner, reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
