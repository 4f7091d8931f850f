use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::coordinator::CampusStore;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Evidence, HotspotEvent, Role, Severity, Task, TaskStatus, TaskTiming, User, WasteCategory,
    WasteLog,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let users = vec![
        ("Priya Raman", "priya.raman@ecocampus.edu", Role::Admin),
        ("Marcus Bell", "marcus.bell@ecocampus.edu", Role::BlockAdmin),
        ("Tomás Ortega", "tomas.ortega@ecocampus.edu", Role::Staff),
        ("Grace Mwangi", "grace.mwangi@ecocampus.edu", Role::Staff),
        ("Lena Fischer", "lena.fischer@ecocampus.edu", Role::Student),
        ("Arjun Mehta", "arjun.mehta@ecocampus.edu", Role::Student),
    ];

    for (name, email, role) in users {
        upsert_user(pool, name, email, role).await?;
    }

    let today = Utc::now().date_naive();
    let logs = vec![
        ("seed-001", "lena.fischer@ecocampus.edu", "Hostel A", "Wet", 12.0, "High", 6),
        ("seed-002", "arjun.mehta@ecocampus.edu", "Main Canteen", "Wet", 18.5, "Critical", 5),
        ("seed-003", "lena.fischer@ecocampus.edu", "Library", "Dry", 3.2, "Low", 5),
        ("seed-004", "arjun.mehta@ecocampus.edu", "CS Block Lab 2", "E-waste", 7.0, "High", 4),
        ("seed-005", "lena.fischer@ecocampus.edu", "Main Canteen", "Recyclable", 9.4, "Normal", 3),
        ("seed-006", "arjun.mehta@ecocampus.edu", "Chemistry Lab", "Hazardous", 2.5, "Critical", 2),
        ("seed-007", "lena.fischer@ecocampus.edu", "Hostel A", "Dry", 6.1, "Normal", 1),
        ("seed-008", "arjun.mehta@ecocampus.edu", "Main Canteen", "Wet", 21.0, "High", 0),
    ];

    for (source_key, email, location, category, quantity_kg, severity, days_ago) in logs {
        let reporter_id = user_id_by_email(pool, email).await?;
        let reported_at = midnight_utc(today - ChronoDuration::days(days_ago))
            + ChronoDuration::hours(9);

        sqlx::query(
            r#"
            INSERT INTO ecocampus.waste_logs
            (id, reporter_id, location, category, quantity_kg, description, status, severity,
             source_key, reported_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, '', 'Reported', $6, $7, $8, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reporter_id)
        .bind(location)
        .bind(category)
        .bind(quantity_kg)
        .bind(severity)
        .bind(source_key)
        .bind(reported_at)
        .execute(pool)
        .await?;
    }

    let admin_id = user_id_by_email(pool, "priya.raman@ecocampus.edu").await?;
    let tasks = vec![
        ("seed-001", "tomas.ortega@ecocampus.edu", "Verified", "High", 5),
        ("seed-002", "tomas.ortega@ecocampus.edu", "Completed", "Urgent", 3),
        ("seed-004", "grace.mwangi@ecocampus.edu", "In Progress", "Normal", 30),
        ("seed-006", "grace.mwangi@ecocampus.edu", "Completed", "Urgent", 2),
        ("seed-008", "tomas.ortega@ecocampus.edu", "Assigned", "High", 0),
    ];

    for (source_key, staff_email, status, priority, hours_taken) in tasks {
        let staff_id = user_id_by_email(pool, staff_email).await?;
        let row = sqlx::query(
            "SELECT id, reported_at FROM ecocampus.waste_logs WHERE source_key = $1",
        )
        .bind(source_key)
        .fetch_one(pool)
        .await?;
        let waste_log_id: Uuid = row.try_get("id")?;
        let assigned_at: DateTime<Utc> = row.try_get("reported_at")?;
        let updated_at = assigned_at + ChronoDuration::hours(hours_taken);
        let finished = matches!(status, "Completed" | "Verified");

        let inserted = sqlx::query(
            r#"
            INSERT INTO ecocampus.tasks
            (id, waste_log_id, assigned_by, assigned_to, status, priority, image_url,
             created_at, assigned_at, completed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10)
            ON CONFLICT (waste_log_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(waste_log_id)
        .bind(admin_id)
        .bind(staff_id)
        .bind(status)
        .bind(priority)
        .bind(finished.then(|| format!("https://uploads.ecocampus.edu/{source_key}.jpg")))
        .bind(assigned_at)
        .bind(finished.then_some(updated_at))
        .bind(updated_at)
        .execute(pool)
        .await?;

        if inserted.rows_affected() > 0 {
            sqlx::query(
                "UPDATE ecocampus.waste_logs SET status = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(waste_log_id)
            .bind(status)
            .bind(updated_at)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

async fn upsert_user(pool: &PgPool, name: &str, email: &str, role: Role) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO ecocampus.users (id, full_name, email, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?
    .try_get("id")?;
    Ok(id)
}

async fn user_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query("SELECT id FROM ecocampus.users WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .with_context(|| format!("no user with email {email}"))?
        .try_get("id")?;
    Ok(id)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// First day of a trailing query window; windows are at least one day.
pub fn window_start(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - ChronoDuration::days(since_days.max(1))
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<User> {
    let row = sqlx::query(
        "SELECT id, full_name, email, role FROM ecocampus.users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CoreError::not_found("user", email))?;
    Ok(user_from_row(&row)?)
}

pub async fn fetch_users(pool: &PgPool) -> anyhow::Result<Vec<User>> {
    let rows = sqlx::query("SELECT id, full_name, email, role FROM ecocampus.users")
        .fetch_all(pool)
        .await?;
    let users = rows
        .iter()
        .map(user_from_row)
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(users)
}

/// Daily sum of reported quantity since `since_date`, oldest first.
pub async fn fetch_daily_totals(
    pool: &PgPool,
    since_date: NaiveDate,
) -> anyhow::Result<Vec<(NaiveDate, f64)>> {
    let rows = sqlx::query(
        "SELECT (reported_at AT TIME ZONE 'UTC')::date AS day, SUM(quantity_kg) AS qty \
         FROM ecocampus.waste_logs \
         WHERE reported_at >= $1 \
         GROUP BY day \
         ORDER BY day",
    )
    .bind(midnight_utc(since_date))
    .fetch_all(pool)
    .await?;

    let mut totals = Vec::with_capacity(rows.len());
    for row in rows {
        totals.push((row.try_get("day")?, row.try_get("qty")?));
    }
    debug!(target: "ecocampus::db", days = totals.len(), "daily totals fetched");
    Ok(totals)
}

pub async fn fetch_hotspot_events(
    pool: &PgPool,
    since_date: NaiveDate,
) -> anyhow::Result<Vec<HotspotEvent>> {
    let rows = sqlx::query(
        "SELECT location, severity, quantity_kg \
         FROM ecocampus.waste_logs \
         WHERE reported_at >= $1 \
         ORDER BY reported_at",
    )
    .bind(midnight_utc(since_date))
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let severity: String = row.try_get("severity")?;
        events.push(HotspotEvent {
            location_id: row.try_get("location")?,
            severity: severity.parse()?,
            quantity_kg: row.try_get("quantity_kg")?,
        });
    }
    debug!(target: "ecocampus::db", events = events.len(), "hotspot events fetched");
    Ok(events)
}

/// Assigned tasks with the hours elapsed between creation and last update.
pub async fn fetch_task_timings(pool: &PgPool) -> anyhow::Result<Vec<TaskTiming>> {
    let rows = sqlx::query(
        "SELECT assigned_to, status, \
         (EXTRACT(EPOCH FROM (updated_at - created_at)) / 3600.0)::float8 AS response_time_hrs \
         FROM ecocampus.tasks \
         WHERE assigned_to IS NOT NULL \
         ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut timings = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.try_get("status")?;
        timings.push(TaskTiming {
            staff_id: row.try_get("assigned_to")?,
            status: status.parse()?,
            response_time_hrs: row.try_get("response_time_hrs")?,
        });
    }
    debug!(target: "ecocampus::db", tasks = timings.len(), "task timings fetched");
    Ok(timings)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        reporter_name: String,
        reporter_email: String,
        location: String,
        category: String,
        quantity_kg: f64,
        severity: String,
        description: String,
        reported_on: NaiveDate,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let category: WasteCategory = row
            .category
            .parse()
            .with_context(|| format!("row {}", line + 1))?;
        let severity: Severity = row
            .severity
            .parse()
            .with_context(|| format!("row {}", line + 1))?;
        if !row.quantity_kg.is_finite() || row.quantity_kg < 0.0 {
            anyhow::bail!("row {}: quantity_kg must be non-negative", line + 1);
        }

        let reporter_id: Uuid = sqlx::query(
            r#"
            INSERT INTO ecocampus.users (id, full_name, email, role)
            VALUES ($1, $2, $3, 'student')
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.reporter_name)
        .bind(&row.reporter_email)
        .fetch_one(pool)
        .await?
        .try_get("id")?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let reported_at = midnight_utc(row.reported_on);

        let result = sqlx::query(
            r#"
            INSERT INTO ecocampus.waste_logs
            (id, reporter_id, location, category, quantity_kg, description, status, severity,
             source_key, reported_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'Reported', $7, $8, $9, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reporter_id)
        .bind(row.location.trim())
        .bind(category.as_str())
        .bind(row.quantity_kg)
        .bind(&row.description)
        .bind(severity.as_str())
        .bind(source_key)
        .bind(reported_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(target: "ecocampus::db", inserted, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}

fn user_from_row(row: &PgRow) -> CoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        role: role.parse()?,
    })
}

fn waste_log_from_row(row: &PgRow) -> CoreResult<WasteLog> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let severity: String = row.try_get("severity")?;
    Ok(WasteLog {
        id: row.try_get("id")?,
        reporter_id: row.try_get("reporter_id")?,
        location: row.try_get("location")?,
        category: category.parse()?,
        quantity_kg: row.try_get("quantity_kg")?,
        description: row.try_get("description")?,
        status: status.parse()?,
        severity: severity.parse()?,
        reported_at: row.try_get("reported_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn task_from_row(row: &PgRow) -> CoreResult<Task> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(Task {
        id: row.try_get("id")?,
        waste_log_id: row.try_get("waste_log_id")?,
        assigned_by: row.try_get("assigned_by")?,
        assigned_to: row.try_get("assigned_to")?,
        status: status.parse()?,
        priority: priority.parse()?,
        evidence: Evidence {
            image_url: row.try_get("image_url")?,
            notes: row.try_get("notes")?,
        },
        assigned_at: row.try_get("assigned_at")?,
        completed_at: row.try_get("completed_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const WASTE_LOG_COLUMNS: &str = "id, reporter_id, location, category, quantity_kg, description, \
     status, severity, reported_at, updated_at";

const TASK_COLUMNS: &str = "id, waste_log_id, assigned_by, assigned_to, status, priority, \
     image_url, notes, assigned_at, completed_at, updated_at";

/// Postgres-backed store for the coordinator. Every call is bounded by
/// `timeout`; an elapsed timeout is a retryable storage error.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> CoreResult<T>
    where
        F: Future<Output = CoreResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                CoreError::storage_retryable(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl CampusStore for PgStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        self.bounded("get_user", async {
            let row = sqlx::query(
                "SELECT id, full_name, email, role FROM ecocampus.users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            row.as_ref().map(user_from_row).transpose()
        })
        .await
    }

    async fn get_waste_log(&self, id: Uuid) -> CoreResult<Option<WasteLog>> {
        self.bounded("get_waste_log", async {
            let query =
                format!("SELECT {WASTE_LOG_COLUMNS} FROM ecocampus.waste_logs WHERE id = $1");
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(waste_log_from_row).transpose()
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> CoreResult<Option<Task>> {
        self.bounded("get_task", async {
            let query = format!("SELECT {TASK_COLUMNS} FROM ecocampus.tasks WHERE id = $1");
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(task_from_row).transpose()
        })
        .await
    }

    async fn task_for_waste_log(&self, waste_log_id: Uuid) -> CoreResult<Option<Task>> {
        self.bounded("task_for_waste_log", async {
            let query =
                format!("SELECT {TASK_COLUMNS} FROM ecocampus.tasks WHERE waste_log_id = $1");
            let row = sqlx::query(&query)
                .bind(waste_log_id)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(task_from_row).transpose()
        })
        .await
    }

    async fn insert_waste_log(&self, log: &WasteLog) -> CoreResult<()> {
        self.bounded("insert_waste_log", async {
            sqlx::query(
                r#"
                INSERT INTO ecocampus.waste_logs
                (id, reporter_id, location, category, quantity_kg, description, status,
                 severity, reported_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(log.id)
            .bind(log.reporter_id)
            .bind(&log.location)
            .bind(log.category.as_str())
            .bind(log.quantity_kg)
            .bind(&log.description)
            .bind(log.status.as_str())
            .bind(log.severity.as_str())
            .bind(log.reported_at)
            .bind(log.updated_at)
            .execute(&self.pool)
            .await?;
            Ok::<(), CoreError>(())
        })
        .await
    }

    async fn insert_assignment(&self, task: &Task, log: &WasteLog) -> CoreResult<()> {
        self.bounded("insert_assignment", async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                INSERT INTO ecocampus.tasks
                (id, waste_log_id, assigned_by, assigned_to, status, priority, image_url,
                 notes, created_at, assigned_at, completed_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $9)
                "#,
            )
            .bind(task.id)
            .bind(task.waste_log_id)
            .bind(task.assigned_by)
            .bind(task.assigned_to)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(&task.evidence.image_url)
            .bind(&task.evidence.notes)
            .bind(task.updated_at)
            .bind(task.assigned_at)
            .bind(task.completed_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE ecocampus.waste_logs SET status = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(log.id)
            .bind(log.status.as_str())
            .bind(log.updated_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<(), CoreError>(())
        })
        .await
    }

    async fn save_transition(
        &self,
        task: &Task,
        previous: TaskStatus,
        log: &WasteLog,
    ) -> CoreResult<()> {
        self.bounded("save_transition", async {
            let mut tx = self.pool.begin().await?;
            let updated = sqlx::query(
                r#"
                UPDATE ecocampus.tasks
                SET status = $2, image_url = $3, notes = $4, completed_at = $5, updated_at = $6
                WHERE id = $1 AND status = $7
                "#,
            )
            .bind(task.id)
            .bind(task.status.as_str())
            .bind(&task.evidence.image_url)
            .bind(&task.evidence.notes)
            .bind(task.completed_at)
            .bind(task.updated_at)
            .bind(previous.as_str())
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(CoreError::conflict(format!(
                    "task {} is no longer {previous}",
                    task.id
                )));
            }

            sqlx::query(
                "UPDATE ecocampus.waste_logs SET status = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(log.id)
            .bind(log.status.as_str())
            .bind(log.updated_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<(), CoreError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midnight_is_start_of_day_utc() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let at = midnight_utc(date);
        assert_eq!(at.to_rfc3339(), "2026-03-14T00:00:00+00:00");
    }

    #[test]
    fn window_covers_at_least_one_day() {
        let today = Utc::now().date_naive();
        assert_eq!(window_start(7), today - ChronoDuration::days(7));
        assert_eq!(window_start(0), today - ChronoDuration::days(1));
        assert_eq!(window_start(-3), window_start(1));
    }

    #[tokio::test]
    async fn elapsed_timeout_is_retryable() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://ecocampus@localhost/ecocampus")
            .unwrap();
        let store = PgStore::new(pool, Duration::from_millis(10));
        let err = store
            .bounded("sleep", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), CoreError>(())
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
