mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use rust_decimal::Decimal;
use sqlx::PgPool;

#[sqlx::test]
async fn test_feed_lists_future_bets_of_group_mates(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1, 2]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let bruno = create_test_account(&app, "Bruno", 10).await;
    let group = create_test_group(&app, &ana, "Sunday Runners").await;
    app.state.groups.join_group(bruno.id, &group.invite_code).await.unwrap();

    let offer = create_test_offer(&app, 47, 1, 3).await;
    app.state.ledger.place_stake(bruno.id, offer.id, Decimal::from(2)).await.unwrap();

    let feed = app.state.feed.friends_future_bets(ana.id).await.unwrap();

    assert_eq!(feed.total, 1);
    let entry = &feed.bets[0];
    assert_eq!(entry.peer.id, bruno.id);
    assert_eq!(entry.peer.email, "bruno@example.com");
    assert_eq!(entry.offer.id, offer.id);
    assert_eq!(entry.race_info.id, 47);
    assert_eq!(entry.race_info.name, "Race 47");
    assert_eq!(entry.shared_groups.len(), 1);
    assert_eq!(entry.shared_groups[0].code, group.invite_code);
}

#[sqlx::test]
async fn test_feed_excludes_own_and_past_bets(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1]);
    app.gateway.add_race_in_days(48, 10, &[2]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let bruno = create_test_account(&app, "Bruno", 10).await;
    let group = create_test_group(&app, &ana, "Sunday Runners").await;
    app.state.groups.join_group(bruno.id, &group.invite_code).await.unwrap();

    let future = create_test_offer(&app, 47, 1, 3).await;
    let soon_past = create_test_offer(&app, 48, 2, 3).await;
    app.state.ledger.place_stake(ana.id, future.id, Decimal::from(1)).await.unwrap();
    app.state.ledger.place_stake(bruno.id, soon_past.id, Decimal::from(1)).await.unwrap();

    // Race 48 has since started
    app.gateway.add_race(48, Utc::now() - Duration::hours(2), &[2]);

    let feed = app.state.feed.friends_future_bets(ana.id).await.unwrap();
    assert_eq!(feed.total, 0);
    assert!(feed.bets.is_empty());
}

#[sqlx::test]
async fn test_feed_lists_all_shared_groups_once(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1]);
    app.gateway.add_race_in_days(48, 10, &[2]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let bruno = create_test_account(&app, "Bruno", 10).await;
    let first = create_test_group(&app, &ana, "Sunday Runners").await;
    let second = create_test_group(&app, &bruno, "Track Club").await;
    app.state.groups.join_group(bruno.id, &first.invite_code).await.unwrap();
    app.state.groups.join_group(ana.id, &second.invite_code).await.unwrap();

    let a = create_test_offer(&app, 47, 1, 3).await;
    let b = create_test_offer(&app, 48, 2, 3).await;
    app.state.ledger.place_stake(bruno.id, a.id, Decimal::from(1)).await.unwrap();
    app.state.ledger.place_stake(bruno.id, b.id, Decimal::from(1)).await.unwrap();

    let calls_before = app.gateway.race_calls();
    let feed = app.state.feed.friends_future_bets(ana.id).await.unwrap();

    assert_eq!(feed.total, 2);
    for entry in &feed.bets {
        assert_eq!(entry.shared_groups.len(), 2);
    }
    assert_eq!(app.gateway.race_calls() - calls_before, 2);
}

#[sqlx::test]
async fn test_feed_memoises_race_lookups(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    app.gateway.add_race_in_days(47, 10, &[1, 2]);
    let ana = create_test_account(&app, "Ana", 10).await;
    let bruno = create_test_account(&app, "Bruno", 10).await;
    let carla = create_test_account(&app, "Carla", 10).await;
    let group = create_test_group(&app, &ana, "Sunday Runners").await;
    app.state.groups.join_group(bruno.id, &group.invite_code).await.unwrap();
    app.state.groups.join_group(carla.id, &group.invite_code).await.unwrap();

    let first = create_test_offer(&app, 47, 1, 3).await;
    let second = create_test_offer(&app, 47, 2, 5).await;
    app.state.ledger.place_stake(bruno.id, first.id, Decimal::from(1)).await.unwrap();
    app.state.ledger.place_stake(carla.id, second.id, Decimal::from(1)).await.unwrap();

    let calls_before = app.gateway.race_calls();
    let feed = app.state.feed.friends_future_bets(ana.id).await.unwrap();

    assert_eq!(feed.total, 2);
    assert_eq!(app.gateway.race_calls() - calls_before, 1);
}

#[sqlx::test]
async fn test_feed_empty_without_groups_or_mates(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let loner = create_test_account(&app, "Ana", 10).await;

    let feed = app.state.feed.friends_future_bets(loner.id).await.unwrap();
    assert_eq!(feed.total, 0);

    create_test_group(&app, &loner, "Solo").await;
    let feed = app.state.feed.friends_future_bets(loner.id).await.unwrap();
    assert_eq!(feed.total, 0);
}
