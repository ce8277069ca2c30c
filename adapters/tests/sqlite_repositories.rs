//! Repository round-trips against an in-memory SQLite database.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use domain::coords::{Point, Rectangle, Size, TileCoord};
use domain::record::{DiffStatus, HistoryChange, ProjectRecord, ProjectState, StreakKind};

use pixel_hawk_adapters::outgoing::sqlite_sqlx::project_repository::SqliteProjectRepository;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::schema::ensure_schema;
use pixel_hawk_adapters::outgoing::sqlite_sqlx::tile_repository::SqliteTileRepository;
use pixel_hawk_application::ports::outgoing::project_repository::ProjectRepositoryPort;
use pixel_hawk_application::ports::outgoing::tile_repository::TileRepositoryPort;

const NOW: i64 = 1_700_000_000;

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    ensure_schema(&pool).await.unwrap();
    pool
}

async fn insert_person(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO person (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

async fn insert_project(pool: &SqlitePool, record: &ProjectRecord) -> i64 {
    sqlx::query(
        r"INSERT INTO project
              (owner_id, name, state, x, y, width, height, first_seen, last_check,
               last_snapshot, max_completion_pixels, max_completion_percent,
               max_completion_time, total_progress, total_regress,
               largest_regress_pixels, largest_regress_time, change_streak_kind,
               change_streak_count, nochange_streak_count,
               recent_rate_pixels_per_hour, recent_rate_window_start,
               has_missing_tiles, last_log_message)
          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.owner_id)
    .bind(&record.name)
    .bind(record.state.code())
    .bind(i64::from(record.x))
    .bind(i64::from(record.y))
    .bind(i64::from(record.width))
    .bind(i64::from(record.height))
    .bind(record.first_seen)
    .bind(record.last_check)
    .bind(record.last_snapshot)
    .bind(record.max_completion_pixels)
    .bind(record.max_completion_percent)
    .bind(record.max_completion_time)
    .bind(record.total_progress)
    .bind(record.total_regress)
    .bind(record.largest_regress_pixels)
    .bind(record.largest_regress_time)
    .bind(record.change_streak_kind.as_str())
    .bind(record.change_streak_count)
    .bind(record.nochange_streak_count)
    .bind(record.recent_rate_pixels_per_hour)
    .bind(record.recent_rate_window_start)
    .bind(record.has_missing_tiles)
    .bind(&record.last_log_message)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

fn sample_project(owner_id: i64) -> ProjectRecord {
    let rect = Rectangle::from_point_size(Point::new(12_567, 34_890), Size::new(80, 40));
    let mut record = ProjectRecord::from_rect(owner_id, "flag", rect, NOW - 9000);
    record.max_completion_pixels = 123;
    record.max_completion_percent = 61.5;
    record.max_completion_time = NOW - 4000;
    record.total_progress = 500;
    record.total_regress = 77;
    record.change_streak_kind = StreakKind::Progress;
    record.change_streak_count = 3;
    record.recent_rate_pixels_per_hour = 12.25;
    record.recent_rate_window_start = NOW - 3600;
    record.has_missing_tiles = false;
    record.last_log_message = "flag: 123px remaining".to_string();
    record
}

#[tokio::test]
async fn project_record_round_trips_byte_equal() {
    let pool = pool().await;
    let repo = SqliteProjectRepository::new(pool.clone());
    let owner = insert_person(&pool, "Kiva").await;

    let mut record = sample_project(owner);
    record.id = insert_project(&pool, &record).await;

    let loaded = repo
        .load_projects(&[ProjectState::Active, ProjectState::Passive])
        .await
        .unwrap();
    assert_eq!(loaded, vec![record.clone()]);

    // Mutate every diff-facing field, update, and reload.
    record.last_check = NOW;
    record.last_snapshot = NOW;
    record.max_completion_pixels = 3;
    record.change_streak_kind = StreakKind::Mixed;
    record.nochange_streak_count = 9;
    record.last_log_message = "flag: 3px remaining".to_string();
    repo.update_project(&record).await.unwrap();

    let reloaded = repo.load_projects(&[ProjectState::Active]).await.unwrap();
    assert_eq!(reloaded, vec![record]);
}

#[tokio::test]
async fn inactive_projects_are_not_loaded() {
    let pool = pool().await;
    let repo = SqliteProjectRepository::new(pool.clone());
    let owner = insert_person(&pool, "Kiva").await;

    let mut inactive = sample_project(owner);
    inactive.state = ProjectState::Inactive;
    insert_project(&pool, &inactive).await;

    let loaded = repo
        .load_projects(&[ProjectState::Active, ProjectState::Passive])
        .await
        .unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn record_diff_appends_history_and_updates_project() {
    let pool = pool().await;
    let repo = SqliteProjectRepository::new(pool.clone());
    let owner = insert_person(&pool, "Kiva").await;

    let mut record = sample_project(owner);
    record.id = insert_project(&pool, &record).await;

    record.last_check = NOW;
    record.total_progress += 10;
    let change = HistoryChange {
        id: 0,
        project_id: record.id,
        timestamp: NOW,
        status: DiffStatus::InProgress,
        num_remaining: 113,
        num_target: 320,
        completion_percent: 64.6875,
        progress_pixels: 10,
        regress_pixels: 0,
    };
    repo.record_diff(&record, &change).await.unwrap();

    let history_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM history_change WHERE project_id = ?")
            .bind(record.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(history_count, 1);

    let (status, remaining): (i64, i64) = sqlx::query_as(
        "SELECT status, num_remaining FROM history_change WHERE project_id = ?",
    )
    .bind(record.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(status, DiffStatus::InProgress.code());
    assert_eq!(remaining, 113);

    let loaded = repo.load_projects(&[ProjectState::Active]).await.unwrap();
    assert_eq!(loaded[0].total_progress, record.total_progress);

    // Appends keep increasing ids; timestamps are caller-monotonic.
    let second = HistoryChange {
        timestamp: NOW + 97,
        ..change
    };
    let first_id = repo.insert_history(&change).await.unwrap();
    let second_id = repo.insert_history(&second).await.unwrap();
    assert!(second_id > first_id);
}

#[tokio::test]
async fn sync_project_tiles_reconciles_links() {
    let pool = pool().await;
    let repo = SqliteProjectRepository::new(pool.clone());
    let tiles = SqliteTileRepository::new(pool.clone());
    let owner = insert_person(&pool, "Kiva").await;

    let mut record = sample_project(owner);
    record.id = insert_project(&pool, &record).await;

    let rect_tiles: BTreeSet<TileCoord> =
        [TileCoord::new(12, 34), TileCoord::new(13, 34)].into();
    repo.sync_project_tiles(record.id, &rect_tiles).await.unwrap();

    // Tile rows exist and start burning.
    let row = tiles.get_tile(TileCoord::new(12, 34)).await.unwrap().unwrap();
    assert!(row.is_burning());
    assert_eq!(row.heat, 999);

    let listed = tiles.list_tiles_for_active_projects().await.unwrap();
    assert_eq!(listed.len(), 2);

    // Shrinking the set drops the stale link but keeps the tile row.
    let smaller: BTreeSet<TileCoord> = [TileCoord::new(12, 34)].into();
    repo.sync_project_tiles(record.id, &smaller).await.unwrap();
    let listed = tiles.list_tiles_for_active_projects().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(tiles.get_tile(TileCoord::new(13, 34)).await.unwrap().is_some());

    // Overlap queries follow the links.
    let overlapping = repo
        .projects_overlapping(TileCoord::new(12, 34))
        .await
        .unwrap();
    assert_eq!(overlapping.len(), 1);
    assert_eq!(overlapping[0].id, record.id);
    assert!(
        repo.projects_overlapping(TileCoord::new(13, 34))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn person_counts_cover_distinct_tiles_of_active_projects() {
    let pool = pool().await;
    let repo = SqliteProjectRepository::new(pool.clone());
    let owner = insert_person(&pool, "Kiva").await;

    // Two active projects sharing one tile, plus a passive one that must
    // not count.
    let mut first = sample_project(owner);
    first.id = insert_project(&pool, &first).await;
    repo.sync_project_tiles(
        first.id,
        &[TileCoord::new(0, 0), TileCoord::new(1, 0)].into(),
    )
    .await
    .unwrap();

    let mut second = sample_project(owner);
    second.name = "banner".to_string();
    second.id = insert_project(&pool, &second).await;
    repo.sync_project_tiles(
        second.id,
        &[TileCoord::new(1, 0), TileCoord::new(2, 0)].into(),
    )
    .await
    .unwrap();

    let mut passive = sample_project(owner);
    passive.name = "dormant".to_string();
    passive.state = ProjectState::Passive;
    passive.id = insert_project(&pool, &passive).await;
    repo.sync_project_tiles(passive.id, &[TileCoord::new(9, 9)].into())
        .await
        .unwrap();

    let person = repo.refresh_person_counts(owner).await.unwrap();
    assert_eq!(person.watched_tiles_count, 3);
    assert_eq!(person.active_projects_count, 2);
    assert_eq!(person.name, "Kiva");

    let listed = repo.list_persons().await.unwrap();
    assert_eq!(listed, vec![person]);
}
