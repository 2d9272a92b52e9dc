//! Spot allocation under contention.

use std::collections::HashSet;

use parkhub_entity::spot::SpotStatus;
use parkhub_service::EngineError;

use crate::helpers::TestApp;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_bookings_claim_distinct_spots() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 8, 20.0).await;
    let lot_id = lot.id;

    let mut principals = Vec::new();
    for i in 0..8 {
        principals.push(app.user(&format!("driver{i}")).await.1);
    }

    let handles: Vec<_> = principals
        .into_iter()
        .map(|p| {
            let allocator = app.engine.allocator.clone();
            tokio::spawn(async move { allocator.book(&p, lot_id, 1).await })
        })
        .collect();

    let mut claimed = HashSet::new();
    for result in futures::future::join_all(handles).await {
        let reservations = result.unwrap().unwrap();
        assert_eq!(reservations.len(), 1);
        assert!(claimed.insert(reservations[0].spot_id), "spot claimed twice");
    }
    assert_eq!(claimed.len(), 8);

    let spots = app.spots(lot.id).await;
    assert!(spots.iter().all(|s| s.status == SpotStatus::Booked));

    let (_, late) = app.user("latecomer").await;
    let err = app.engine.allocator.book(&late, lot.id, 1).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCapacity {
            requested: 1,
            available: 0
        }
    ));
}

#[tokio::test]
async fn test_booking_more_than_available_changes_nothing() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 4, 20.0).await;
    let (_, first) = app.user("first").await;
    let (_, second) = app.user("second").await;

    app.engine.allocator.book(&first, lot.id, 2).await.unwrap();
    let before = app.spots(lot.id).await;

    let err = app
        .engine
        .allocator
        .book(&second, lot.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCapacity {
            requested: 3,
            available: 2
        }
    ));

    assert_eq!(app.spots(lot.id).await, before);
    assert!(
        app.engine
            .query
            .user_reservations(second.user_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_multi_spot_booking_takes_lowest_numbers() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 5, 20.0).await;
    let (_, driver) = app.user("driver").await;

    let reservations = app.engine.allocator.book(&driver, lot.id, 3).await.unwrap();
    assert_eq!(reservations.len(), 3);

    let booked: Vec<i32> = app
        .spots(lot.id)
        .await
        .into_iter()
        .filter(|s| s.status == SpotStatus::Booked)
        .map(|s| s.spot_number)
        .collect();
    assert_eq!(booked, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_admin_cannot_book() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 2, 20.0).await;

    let err = app
        .engine
        .allocator
        .book(&app.admin, lot.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_invalid_counts_are_rejected() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 2, 20.0).await;
    let (_, driver) = app.user("driver").await;

    for requested in [0, -1, 51] {
        let err = app
            .engine
            .allocator
            .book(&driver, lot.id, requested)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "{requested}");
    }
}
