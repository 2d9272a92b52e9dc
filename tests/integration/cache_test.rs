//! Reads after writes never see stale cache entries.

use crate::helpers::TestApp;

#[tokio::test]
async fn test_listing_reflects_every_mutation() {
    let app = TestApp::new();
    let lot = app.lot("Central Plaza", 3, 20.0).await;
    let (_, driver) = app.user("driver").await;

    let listed = app.engine.query.list_lots().await.unwrap();
    assert_eq!(listed[0].available, 3);
    // Served from cache the second time.
    app.engine.query.list_lots().await.unwrap();
    assert!(app.engine.cache.stats().hits >= 1);

    let generation = app.engine.cache.generation();
    let reservation = app.engine.allocator.book(&driver, lot.id, 1).await.unwrap()[0].clone();
    assert!(app.engine.cache.generation() > generation);
    let listed = app.engine.query.list_lots().await.unwrap();
    assert_eq!((listed[0].available, listed[0].booked), (2, 1));

    app.engine
        .lifecycle
        .confirm_park(&driver, reservation.id)
        .await
        .unwrap();
    let listed = app.engine.query.list_lots().await.unwrap();
    assert_eq!((listed[0].booked, listed[0].occupied), (0, 1));

    app.engine
        .capacity
        .resize_lot(&app.admin, lot.id, 5)
        .await
        .unwrap();
    let detail = app.engine.query.lot_detail(lot.id).await.unwrap();
    assert_eq!(detail.spots.len(), 5);
    assert_eq!(detail.lot.total_spots, 5);

    app.engine
        .lifecycle
        .vacate(&driver, reservation.id)
        .await
        .unwrap();
    let listed = app.engine.query.list_lots().await.unwrap();
    assert_eq!(listed[0].available, 5);

    let history = app
        .engine
        .query
        .user_reservations(driver.user_id)
        .await
        .unwrap();
    assert!(!history[0].reservation.is_active);
}

#[tokio::test]
async fn test_lot_creation_and_deletion_refresh_listing() {
    let app = TestApp::new();
    assert!(app.engine.query.list_lots().await.unwrap().is_empty());

    let lot = app.lot("Central Plaza", 1, 20.0).await;
    assert_eq!(app.engine.query.list_lots().await.unwrap().len(), 1);

    app.engine
        .capacity
        .delete_lot(&app.admin, lot.id)
        .await
        .unwrap();
    assert!(app.engine.query.list_lots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_sees_lot_once_index_catches_up() {
    let app = TestApp::new();
    let lot = app.lot("Riverside Deck", 2, 15.0).await;

    // The index sync job has not run yet.
    assert!(app.engine.query.search_lots("riverside").await.unwrap().is_empty());

    app.runner.run_until_idle().await;

    let found = app.engine.query.search_lots("riverside").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].lot.id, lot.id);
}
