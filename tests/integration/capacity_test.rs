//! Lot resize and delete safety.

use std::collections::HashSet;

use parkhub_core::types::id::{SpotId, UserId};
use parkhub_entity::lot::LotUpdate;
use parkhub_entity::spot::SpotStatus;
use parkhub_service::{EngineError, Principal};

use crate::helpers::{TestApp, meta};

/// Book every spot of a lot and park in spot number `park_in`.
async fn fill_and_park(app: &TestApp, lot_id: parkhub_core::types::id::LotId, park_in: i32) {
    let (_, driver) = app.user("driver").await;
    let total = app.spots(lot_id).await.len() as i64;
    let reservations = app.engine.allocator.book(&driver, lot_id, total).await.unwrap();

    let spot = app
        .spots(lot_id)
        .await
        .into_iter()
        .find(|s| s.spot_number == park_in)
        .unwrap();
    let reservation = reservations.iter().find(|r| r.spot_id == spot.id).unwrap();
    app.engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_shrink_over_occupied_spot_is_rejected() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 5, 20.0).await;
    fill_and_park(&app, lot.id, 4).await;
    let before = app.spots(lot.id).await;

    let err = app
        .engine
        .capacity
        .resize_lot(&app.admin, lot.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CapacityConflict { spot_number: 4 }));

    let stored = app.store.find_lot(lot.id).await.unwrap().unwrap();
    assert_eq!(stored.total_spots, 5);
    assert_eq!(app.spots(lot.id).await, before);
}

#[tokio::test]
async fn test_shrink_below_occupied_spot_succeeds() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 5, 20.0).await;
    fill_and_park(&app, lot.id, 2).await;

    let resized = app
        .engine
        .capacity
        .resize_lot(&app.admin, lot.id, 3)
        .await
        .unwrap();
    assert_eq!(resized.total_spots, 3);
    app.assert_capacity_consistent(lot.id).await;

    let statuses: Vec<SpotStatus> = app.spots(lot.id).await.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SpotStatus::Booked, SpotStatus::Occupied, SpotStatus::Booked]
    );
}

#[tokio::test]
async fn test_shrink_displaces_booked_spots() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 3, 20.0).await;
    let (_, driver) = app.user("driver").await;
    app.engine.allocator.book(&driver, lot.id, 3).await.unwrap();

    app.engine
        .capacity
        .resize_lot(&app.admin, lot.id, 1)
        .await
        .unwrap();

    app.assert_capacity_consistent(lot.id).await;
    let remaining = app
        .engine
        .query
        .user_reservations(driver.user_id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].spot_number, 1);
}

#[tokio::test]
async fn test_grow_appends_available_spots() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 2, 20.0).await;
    let (_, driver) = app.user("driver").await;
    app.engine.allocator.book(&driver, lot.id, 2).await.unwrap();

    app.engine
        .capacity
        .resize_lot(&app.admin, lot.id, 5)
        .await
        .unwrap();

    app.assert_capacity_consistent(lot.id).await;
    let spots = app.spots(lot.id).await;
    assert!(spots[..2].iter().all(|s| s.status == SpotStatus::Booked));
    assert!(spots[2..].iter().all(|s| s.status == SpotStatus::Available));
}

#[tokio::test]
async fn test_delete_with_occupied_spot_is_rejected() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 3, 20.0).await;
    let (_, driver) = app.user("driver").await;
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();
    app.engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
    let before = app.spots(lot.id).await;

    let err = app
        .engine
        .capacity
        .delete_lot(&app.admin, lot.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CapacityConflict { spot_number: 1 }));
    assert_eq!(app.spots(lot.id).await, before);

    app.engine
        .lifecycle
        .vacate(&driver, reservation.id)
        .await
        .unwrap();
    app.engine
        .capacity
        .delete_lot(&app.admin, lot.id)
        .await
        .unwrap();

    assert!(app.store.find_lot(lot.id).await.unwrap().is_none());
    assert!(app.spots(lot.id).await.is_empty());
    assert!(
        app.engine
            .query
            .user_reservations(driver.user_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_update_lot_changes_meta_price_and_capacity() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 2, 20.0).await;

    let updated = app
        .engine
        .capacity
        .update_lot(
            &app.admin,
            lot.id,
            LotUpdate {
                meta: Some(meta("Harbour Front")),
                price_per_hour: Some(35.0),
                total_spots: Some(4),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.location_name, "Harbour Front");
    assert_eq!(updated.price_per_hour, 35.0);
    assert_eq!(updated.total_spots, 4);
    app.assert_capacity_consistent(lot.id).await;
}

#[tokio::test]
async fn test_lot_administration_validates_input() {
    let app = TestApp::new();

    let mut bad_pincode = meta("Central Plaza");
    bad_pincode.pincode = "56001".into();
    for (m, spots, price) in [
        (bad_pincode, 2, 20.0),
        (meta("Central Plaza"), 0, 20.0),
        (meta("Central Plaza"), 2, 0.0),
    ] {
        let err = app
            .engine
            .capacity
            .create_lot(&app.admin, m, spots, price)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    let (_, driver) = app.user("driver").await;
    let err = app
        .engine
        .capacity
        .create_lot(&driver, meta("Central Plaza"), 2, 20.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let lot = app.lot("Central Plaza", 2, 20.0).await;
    let err = app
        .engine
        .capacity
        .resize_lot(&app.admin, lot.id, -1)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

/// Every active reservation of `users` must point at a live spot.
async fn assert_no_orphaned_reservations(app: &TestApp, users: &[UserId], live: &HashSet<SpotId>) {
    for user in users {
        for detail in app.store.reservation_history(*user).await.unwrap() {
            if detail.reservation.is_active {
                assert!(
                    live.contains(&detail.reservation.spot_id),
                    "active reservation on a removed spot"
                );
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resize_and_booking_race_keeps_lot_consistent() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 12, 20.0).await;
    let lot_id = lot.id;

    // Leave only spot 10 occupied.
    let (_, parker) = app.user("parker").await;
    let held = app.engine.allocator.book(&parker, lot_id, 12).await.unwrap();
    let spots = app.spots(lot_id).await;
    let spot10 = spots.iter().find(|s| s.spot_number == 10).unwrap().id;
    for reservation in &held {
        if reservation.spot_id == spot10 {
            app.engine
                .lifecycle
                .confirm_park(&parker, reservation.id)
                .await
                .unwrap();
        } else {
            app.engine
                .lifecycle
                .vacate(&parker, reservation.id)
                .await
                .unwrap();
        }
    }

    let mut bookers: Vec<Principal> = Vec::new();
    for i in 0..8 {
        bookers.push(app.user(&format!("racer{i}")).await.1);
    }

    let mut bookings = Vec::new();
    for p in bookers.clone() {
        let allocator = app.engine.allocator.clone();
        bookings.push(tokio::spawn(async move { allocator.book(&p, lot_id, 1).await }));
    }
    let mut resizes = Vec::new();
    for target in [6, 11, 14, 9] {
        let capacity = app.engine.capacity.clone();
        let admin = app.admin;
        resizes.push(tokio::spawn(async move {
            (target, capacity.resize_lot(&admin, lot_id, target).await)
        }));
    }

    for result in futures::future::join_all(bookings).await {
        match result.unwrap() {
            Ok(reservations) => assert_eq!(reservations.len(), 1),
            Err(EngineError::InsufficientCapacity { .. }) => {}
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    for result in futures::future::join_all(resizes).await {
        match result.unwrap() {
            (_, Ok(_)) => {}
            (target, Err(EngineError::CapacityConflict { spot_number })) => {
                assert!(target < 10);
                assert_eq!(spot_number, 10);
            }
            (_, Err(other)) => panic!("unexpected resize error: {other}"),
        }
    }

    app.assert_capacity_consistent(lot_id).await;
    let spots = app.spots(lot_id).await;
    let occupied = spots.iter().find(|s| s.id == spot10).unwrap();
    assert_eq!(occupied.status, SpotStatus::Occupied);

    let live: HashSet<_> = spots.iter().map(|s| s.id).collect();
    let mut users: Vec<UserId> = bookers.iter().map(|p| p.user_id).collect();
    users.push(parker.user_id);
    assert_no_orphaned_reservations(&app, &users, &live).await;

    let mut active = 0;
    for user in &users {
        let history = app.store.reservation_history(*user).await.unwrap();
        active += history.iter().filter(|d| d.reservation.is_active).count();
    }
    let held = spots
        .iter()
        .filter(|s| s.status != SpotStatus::Available)
        .count();
    assert_eq!(active, held);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_racing_bookings_leaves_nothing_behind() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 6, 20.0).await;
    let lot_id = lot.id;

    let mut bookers: Vec<Principal> = Vec::new();
    for i in 0..6 {
        bookers.push(app.user(&format!("racer{i}")).await.1);
    }

    let mut bookings = Vec::new();
    for p in bookers.clone() {
        let allocator = app.engine.allocator.clone();
        bookings.push(tokio::spawn(async move { allocator.book(&p, lot_id, 1).await }));
    }
    let capacity = app.engine.capacity.clone();
    let admin = app.admin;
    let delete = tokio::spawn(async move { capacity.delete_lot(&admin, lot_id).await });

    for result in futures::future::join_all(bookings).await {
        match result.unwrap() {
            Ok(_) | Err(EngineError::NotFound(_)) => {}
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    delete.await.unwrap().unwrap();

    assert!(app.store.find_lot(lot_id).await.unwrap().is_none());
    assert!(app.spots(lot_id).await.is_empty());
    let users: Vec<UserId> = bookers.iter().map(|p| p.user_id).collect();
    assert_no_orphaned_reservations(&app, &users, &HashSet::new()).await;
}
