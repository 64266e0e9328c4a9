// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::colors;
use crate::events::{ChangeNotifier, StoreEvent};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, migrate::MigrateDatabase};
use std::path::Path;
use tracker_common::{
    Category, CreateTrackerPayload, Schedule, Tracker, TrackerKind, TrackerRecord,
    UpdateTrackerPayload,
};
use tracing::{debug, info, warn};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE COLLATE NOCASE,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trackers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        color TEXT NOT NULL,
        emoji TEXT NOT NULL,
        schedule TEXT NOT NULL,
        kind TEXT NOT NULL,
        category_id INTEGER NULL REFERENCES categories(id) ON DELETE SET NULL,
        pinned BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracker_records (
        tracker_id INTEGER NOT NULL REFERENCES trackers(id) ON DELETE CASCADE,
        record_date DATE NOT NULL,
        PRIMARY KEY (tracker_id, record_date)
    );
    "#,
];

/// Establishes the database connection pool.
/// If the database does not exist, it creates it, along with its directory.
/// It also ensures all tables exist.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        if let Some(parent) = database_file(database_url).and_then(Path::parent) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// A private in-memory database. Pinned to one connection, since every
/// SQLite connection to `:memory:` opens a separate database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    create_schema(&pool).await?;

    Ok(pool)
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to create tables")?;
    }
    info!("Tracker tables are ready.");
    Ok(())
}

fn database_file(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

/// Whether an error from the store was caused by a UNIQUE constraint, such as
/// two categories racing for the same title.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .filter_map(|e| e.as_database_error())
        .any(|e| e.is_unique_violation())
}

#[derive(sqlx::FromRow)]
struct TrackerRow {
    id: i64,
    name: String,
    color: String,
    emoji: String,
    schedule: String,
    kind: TrackerKind,
    category_id: Option<i64>,
    pinned: bool,
    created_at: DateTime<Utc>,
}

impl TrackerRow {
    fn into_tracker(self) -> Tracker {
        let schedule = Schedule::try_decode(&self.schedule).unwrap_or_else(|e| {
            warn!(
                "Tracker {} has an unreadable schedule {:?} ({}); treating it as always due.",
                self.id, self.schedule, e
            );
            Schedule::empty()
        });
        Tracker {
            id: self.id,
            name: self.name,
            color: self.color,
            emoji: self.emoji,
            schedule,
            kind: self.kind,
            category_id: self.category_id,
            pinned: self.pinned,
            created_at: self.created_at,
        }
    }
}

/// Irregular events are always persisted with the full weekday set.
fn stored_schedule(kind: TrackerKind, schedule: &Schedule) -> Schedule {
    match kind {
        TrackerKind::IrregularEvent => Schedule::every_day(),
        TrackerKind::Habit => schedule.clone(),
    }
}

/// The persistence side of the tracker: trackers, categories and completion
/// records, with a change event published after every write that changed
/// something.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    events: ChangeNotifier,
}

impl Store {
    pub fn new(pool: SqlitePool, events: ChangeNotifier) -> Self {
        Self { pool, events }
    }

    pub fn events(&self) -> &ChangeNotifier {
        &self.events
    }

    // --- Trackers ---

    /// All trackers in creation order.
    pub async fn list_trackers(&self) -> Result<Vec<Tracker>> {
        let rows = sqlx::query_as::<_, TrackerRow>("SELECT * FROM trackers ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to retrieve trackers from DB")?;

        Ok(rows.into_iter().map(TrackerRow::into_tracker).collect())
    }

    pub async fn get_tracker(&self, tracker_id: i64) -> Result<Option<Tracker>> {
        let row = sqlx::query_as::<_, TrackerRow>("SELECT * FROM trackers WHERE id = ?")
            .bind(tracker_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to retrieve tracker with ID: {tracker_id}"))?;

        Ok(row.map(TrackerRow::into_tracker))
    }

    pub async fn count_trackers(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trackers")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count trackers")?;

        Ok(count as usize)
    }

    /// Inserts a new tracker. A missing color is picked from the palette,
    /// avoiding colors other trackers already use.
    pub async fn create_tracker(&self, payload: CreateTrackerPayload) -> Result<Tracker> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let color = match payload.color {
            Some(color) => color,
            None => {
                let used: Vec<String> = sqlx::query_scalar("SELECT color FROM trackers")
                    .fetch_all(&mut *tx)
                    .await
                    .context("Failed to read tracker colors")?;
                colors::pick_color(&used)
            }
        };
        let schedule = stored_schedule(payload.kind, &payload.schedule);
        let created_at = Utc::now();

        debug!(
            "Insert values: name={}, emoji={}, color={}, kind={:?}, schedule={}, category_id={:?}",
            payload.name,
            payload.emoji,
            color,
            payload.kind,
            schedule.encode(),
            payload.category_id
        );

        let id = sqlx::query(
            "INSERT INTO trackers (name, color, emoji, schedule, kind, category_id, pinned, created_at) VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&payload.name)
        .bind(&color)
        .bind(&payload.emoji)
        .bind(schedule.encode())
        .bind(payload.kind)
        .bind(payload.category_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert tracker into DB")?
        .last_insert_rowid();

        tx.commit().await.context("Failed to commit new tracker")?;

        let tracker = Tracker {
            id,
            name: payload.name,
            color,
            emoji: payload.emoji,
            schedule,
            kind: payload.kind,
            category_id: payload.category_id,
            pinned: false,
            created_at,
        };
        self.events.publish(StoreEvent::TrackersChanged { tracker_id: id });

        Ok(tracker)
    }

    /// Replaces a tracker's editable fields. A missing color or kind keeps
    /// the current one. Returns `None` when no tracker has this ID.
    pub async fn update_tracker(
        &self,
        tracker_id: i64,
        payload: UpdateTrackerPayload,
    ) -> Result<Option<Tracker>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let existing = sqlx::query_as::<_, TrackerRow>("SELECT * FROM trackers WHERE id = ?")
            .bind(tracker_id)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to retrieve tracker with ID: {tracker_id}"))?;
        let Some(existing) = existing.map(TrackerRow::into_tracker) else {
            return Ok(None);
        };

        let color = payload.color.unwrap_or(existing.color);
        let kind = payload.kind.unwrap_or(existing.kind);
        let schedule = stored_schedule(kind, &payload.schedule);

        let updated = sqlx::query(
            "UPDATE trackers SET name = ?, color = ?, emoji = ?, schedule = ?, kind = ?, category_id = ? WHERE id = ?",
        )
        .bind(&payload.name)
        .bind(&color)
        .bind(&payload.emoji)
        .bind(schedule.encode())
        .bind(kind)
        .bind(payload.category_id)
        .bind(tracker_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update tracker with ID: {tracker_id}"))?
        .rows_affected();

        tx.commit().await.context("Failed to commit tracker update")?;

        if updated == 0 {
            return Ok(None);
        }
        info!("Updated tracker with ID: {}", tracker_id);
        self.events.publish(StoreEvent::TrackersChanged { tracker_id });

        Ok(Some(Tracker {
            name: payload.name,
            color,
            emoji: payload.emoji,
            schedule,
            kind,
            category_id: payload.category_id,
            ..existing
        }))
    }

    pub async fn set_tracker_pinned(&self, tracker_id: i64, pinned: bool) -> Result<Option<Tracker>> {
        let result = sqlx::query("UPDATE trackers SET pinned = ? WHERE id = ?")
            .bind(pinned)
            .bind(tracker_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to pin tracker with ID: {tracker_id}"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.events.publish(StoreEvent::TrackersChanged { tracker_id });

        self.get_tracker(tracker_id).await
    }

    /// Deletes a tracker and all of its records.
    /// Returns true if a tracker was deleted, false if no tracker with the given ID was found.
    pub async fn delete_tracker(&self, tracker_id: i64) -> Result<bool> {
        debug!("Attempting to delete tracker with ID: {}", tracker_id);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let records = sqlx::query("DELETE FROM tracker_records WHERE tracker_id = ?")
            .bind(tracker_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete records of tracker {tracker_id}"))?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM trackers WHERE id = ?")
            .bind(tracker_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete tracker with ID: {tracker_id}"))?
            .rows_affected();

        tx.commit().await.context("Failed to commit tracker deletion")?;

        info!(
            "Deleted {} trackers and {} records for tracker ID: {}",
            deleted, records, tracker_id
        );
        if deleted > 0 {
            self.events.publish(StoreEvent::TrackersChanged { tracker_id });
        }

        Ok(deleted > 0)
    }

    // --- Categories ---

    /// All categories ordered by title.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY title COLLATE NOCASE ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to retrieve categories from DB")
    }

    pub async fn get_category(&self, category_id: i64) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to retrieve category with ID: {category_id}"))
    }

    /// Case-insensitive lookup, used to keep titles unique.
    pub async fn find_category_by_title(&self, title: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE title = ? COLLATE NOCASE")
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up category by title")
    }

    pub async fn create_category(&self, title: &str) -> Result<Category> {
        let created_at = Utc::now();
        let id = sqlx::query("INSERT INTO categories (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .context("Failed to insert category into DB")?
            .last_insert_rowid();

        info!("Category {:?} created with ID: {}", title, id);
        self.events.publish(StoreEvent::CategoriesChanged { category_id: id });

        Ok(Category {
            id,
            title: title.to_string(),
            created_at,
        })
    }

    pub async fn rename_category(&self, category_id: i64, title: &str) -> Result<Option<Category>> {
        let result = sqlx::query("UPDATE categories SET title = ? WHERE id = ?")
            .bind(title)
            .bind(category_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to rename category with ID: {category_id}"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.events.publish(StoreEvent::CategoriesChanged { category_id });

        self.get_category(category_id).await
    }

    /// Deletes a category. Its trackers are kept, without a category.
    pub async fn delete_category(&self, category_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("UPDATE trackers SET category_id = NULL WHERE category_id = ?")
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach trackers from category")?;
        let deleted = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete category with ID: {category_id}"))?
            .rows_affected();

        tx.commit().await.context("Failed to commit category deletion")?;

        if deleted > 0 {
            info!("Deleted category with ID: {}", category_id);
            self.events.publish(StoreEvent::CategoriesChanged { category_id });
        }

        Ok(deleted > 0)
    }

    // --- Records ---

    pub async fn list_records(&self) -> Result<Vec<TrackerRecord>> {
        sqlx::query_as::<_, TrackerRecord>(
            "SELECT tracker_id, record_date FROM tracker_records ORDER BY record_date ASC, tracker_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to retrieve records from DB")
    }

    /// Marks a tracker completed on a day. Marking twice, or marking a
    /// tracker that does not exist, changes nothing.
    /// Returns true if a record was inserted.
    pub async fn add_record(&self, tracker_id: i64, day: NaiveDate) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO tracker_records (tracker_id, record_date) SELECT id, ? FROM trackers WHERE id = ?",
        )
        .bind(day)
        .bind(tracker_id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to add record for tracker {tracker_id} on {day}"))?
        .rows_affected()
            > 0;

        if inserted {
            info!("Tracker {} completed on {}.", tracker_id, day);
            self.events.publish(StoreEvent::RecordsChanged { tracker_id });
        } else {
            debug!("No record added for tracker {} on {}.", tracker_id, day);
        }

        Ok(inserted)
    }

    /// Unmarks a tracker on a day. Missing records are ignored.
    /// Returns true if a record was removed.
    pub async fn remove_record(&self, tracker_id: i64, day: NaiveDate) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM tracker_records WHERE tracker_id = ? AND record_date = ?")
            .bind(tracker_id)
            .bind(day)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove record for tracker {tracker_id} on {day}"))?
            .rows_affected()
            > 0;

        if removed {
            info!("Tracker {} no longer completed on {}.", tracker_id, day);
            self.events.publish(StoreEvent::RecordsChanged { tracker_id });
        }

        Ok(removed)
    }
}
