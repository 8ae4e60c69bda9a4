//! SQLite-backed store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::{
    NewNotificationLog, NewPackage, NewPriceHistory, NotificationLogEntry, NotificationLogStatus,
    NotificationStore, Package, PackageStore, PriceChangeUpdate, PriceHistoryEntry, RequoteStatus,
    RunLockStore, StoreError,
};

/// SQLite-backed store for packages, price history, notification log and run locks.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                destination TEXT,
                current_price REAL NOT NULL,
                original_price REAL,
                variance_pct REAL,
                requote_status TEXT NOT NULL DEFAULT 'pending',
                monitor_enabled INTEGER NOT NULL DEFAULT 1,
                needs_manual_review INTEGER NOT NULL DEFAULT 0,
                creative_update_needed INTEGER NOT NULL DEFAULT 0,
                manual_quote_notified_at TEXT,
                air_cost REAL,
                land_cost REAL,
                agency_fee REAL,
                departure_date TEXT,
                airline_code TEXT,
                airline_name TEXT,
                flight_numbers TEXT,
                expires_at TEXT,
                last_sync_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_packages_external_id ON packages(external_id);
            CREATE INDEX IF NOT EXISTS idx_packages_last_sync ON packages(last_sync_at);
            CREATE INDEX IF NOT EXISTS idx_packages_requote_status ON packages(requote_status);

            -- Append-only: rows are created once per detected change, never mutated
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
                new_price REAL NOT NULL,
                previous_price REAL NOT NULL,
                variance_amount REAL NOT NULL,
                variance_pct REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_price_history_package ON price_history(package_id);

            CREATE TABLE IF NOT EXISTS notification_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                notification_type TEXT NOT NULL,
                channel TEXT NOT NULL,
                recipient TEXT NOT NULL,
                package_id INTEGER,
                title TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notification_log_package ON notification_log(package_id);
            CREATE INDEX IF NOT EXISTS idx_notification_log_created ON notification_log(created_at);

            CREATE TABLE IF NOT EXISTS run_locks (
                name TEXT PRIMARY KEY,
                acquired_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn row_to_package(row: &rusqlite::Row) -> rusqlite::Result<Package> {
        let requote_status: String = row.get(7)?;
        let manual_quote_notified_at: Option<String> = row.get(11)?;
        let expires_at: Option<String> = row.get(19)?;
        let last_sync_at: Option<String> = row.get(20)?;

        Ok(Package {
            id: row.get(0)?,
            external_id: row.get(1)?,
            title: row.get(2)?,
            destination: row.get(3)?,
            current_price: row.get(4)?,
            original_price: row.get(5)?,
            variance_pct: row.get(6)?,
            requote_status: RequoteStatus::parse(&requote_status)
                .unwrap_or(RequoteStatus::Pending),
            monitor_enabled: row.get(8)?,
            needs_manual_review: row.get(9)?,
            creative_update_needed: row.get(10)?,
            manual_quote_notified_at: Self::parse_timestamp(manual_quote_notified_at),
            air_cost: row.get(12)?,
            land_cost: row.get(13)?,
            agency_fee: row.get(14)?,
            departure_date: row.get(15)?,
            airline_code: row.get(16)?,
            airline_name: row.get(17)?,
            flight_numbers: row.get(18)?,
            expires_at: Self::parse_timestamp(expires_at),
            last_sync_at: Self::parse_timestamp(last_sync_at),
        })
    }

    const PACKAGE_COLUMNS: &'static str = "id, external_id, title, destination, current_price, \
         original_price, variance_pct, requote_status, monitor_enabled, needs_manual_review, \
         creative_update_needed, manual_quote_notified_at, air_cost, land_cost, agency_fee, \
         departure_date, airline_code, airline_name, flight_numbers, expires_at, last_sync_at";

    fn query_package(
        conn: &Connection,
        where_clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> Result<Package, StoreError> {
        let sql = format!(
            "SELECT {} FROM packages WHERE {}",
            Self::PACKAGE_COLUMNS,
            where_clause
        );
        conn.query_row(&sql, [param], Self::row_to_package)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound("package".to_string())
                }
                _ => StoreError::Database(e.to_string()),
            })
    }

    fn query_packages(
        conn: &Connection,
        suffix: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Package>, StoreError> {
        let sql = format!("SELECT {} FROM packages {}", Self::PACKAGE_COLUMNS, suffix);
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params, Self::row_to_package)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut packages = Vec::new();
        for row in rows {
            packages.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(packages)
    }

    fn update_package(
        conn: &Connection,
        id: i64,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<(), StoreError> {
        let affected = conn
            .execute(sql, params)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("package {}", id)));
        }
        Ok(())
    }
}

impl PackageStore for SqliteStore {
    fn insert_package(&self, pkg: &NewPackage) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO packages (external_id, title, destination, current_price, monitor_enabled, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                pkg.external_id,
                pkg.title,
                pkg.destination,
                pkg.current_price,
                pkg.monitor_enabled,
                pkg.expires_at.map(|dt| dt.to_rfc3339()),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn get_package(&self, id: i64) -> Result<Package, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::query_package(&conn, "id = ?", &id)
    }

    fn get_by_external_id(&self, external_id: &str) -> Result<Package, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::query_package(&conn, "external_id = ?", &external_id)
    }

    fn refresh_candidates(&self, limit: usize) -> Result<Vec<Package>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        // NULL last_sync_at sorts first: never-synced packages win ties
        Self::query_packages(
            &conn,
            "WHERE monitor_enabled = 1 AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY last_sync_at IS NOT NULL, last_sync_at ASC
             LIMIT ?",
            &[&now, &(limit as i64)],
        )
    }

    fn apply_price_change(&self, id: i64, change: &PriceChangeUpdate) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let destination = if change.destinations.is_empty() {
            None
        } else {
            Some(change.destinations.join(", "))
        };

        Self::update_package(
            &conn,
            id,
            "UPDATE packages SET
                original_price = COALESCE(original_price, current_price),
                current_price = ?,
                variance_pct = ?,
                needs_manual_review = ?,
                air_cost = ?,
                land_cost = ?,
                agency_fee = ?,
                departure_date = ?,
                airline_code = ?,
                airline_name = ?,
                flight_numbers = ?,
                destination = COALESCE(?, destination),
                manual_quote_notified_at = CASE WHEN ? THEN NULL
                    ELSE manual_quote_notified_at END,
                last_sync_at = ?
             WHERE id = ?",
            &[
                &change.new_price,
                &change.variance_pct,
                &change.needs_manual_review,
                &change.costs.air_cost,
                &change.costs.land_cost,
                &change.costs.agency_fee,
                &change.costs.departure_date,
                &change.costs.airline_code,
                &change.costs.airline_name,
                &change.costs.flight_numbers,
                &destination,
                &change.needs_manual_review,
                &now,
                &id,
            ],
        )
    }

    fn touch_sync(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        Self::update_package(
            &conn,
            id,
            "UPDATE packages SET last_sync_at = ? WHERE id = ?",
            &[&now, &id],
        )
    }

    fn insert_history(&self, entry: &NewPriceHistory) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO price_history (package_id, new_price, previous_price, variance_amount, variance_pct, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.package_id,
                entry.new_price,
                entry.previous_price,
                entry.variance_amount,
                entry.variance_pct,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn history_for(&self, package_id: i64) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, package_id, new_price, previous_price, variance_amount, variance_pct, created_at
                 FROM price_history WHERE package_id = ? ORDER BY created_at DESC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![package_id], |row| {
                let created_at_str: String = row.get(6)?;
                Ok(PriceHistoryEntry {
                    id: row.get(0)?,
                    package_id: row.get(1)?,
                    new_price: row.get(2)?,
                    previous_price: row.get(3)?,
                    variance_amount: row.get(4)?,
                    variance_pct: row.get(5)?,
                    created_at: Self::parse_timestamp(Some(created_at_str))
                        .unwrap_or_else(Utc::now),
                })
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn set_requote_status(&self, id: i64, status: RequoteStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::update_package(
            &conn,
            id,
            "UPDATE packages SET requote_status = ? WHERE id = ?",
            &[&status.as_str(), &id],
        )
    }

    fn reset_checking(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE packages SET requote_status = 'pending' WHERE requote_status = 'checking'",
                [],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(affected as u64)
    }

    fn pending_requotes(&self) -> Result<Vec<Package>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::query_packages(
            &conn,
            "WHERE monitor_enabled = 1 AND requote_status = 'pending' ORDER BY id",
            &[],
        )
    }

    fn needs_manual_unnotified(&self) -> Result<Vec<Package>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::query_packages(
            &conn,
            "WHERE needs_manual_review = 1 AND manual_quote_notified_at IS NULL ORDER BY id",
            &[],
        )
    }

    fn mark_manual_quote_notified(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        Self::update_package(
            &conn,
            id,
            "UPDATE packages SET manual_quote_notified_at = ? WHERE id = ?",
            &[&now, &id],
        )
    }

    fn set_creative_update_needed(&self, id: i64, needed: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::update_package(
            &conn,
            id,
            "UPDATE packages SET creative_update_needed = ? WHERE id = ?",
            &[&needed, &id],
        )
    }
}

impl NotificationStore for SqliteStore {
    fn insert_log(&self, log: &NewNotificationLog) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let payload = serde_json::to_string(&log.payload)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO notification_log (notification_type, channel, recipient, package_id, title, payload, status, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                log.notification_type,
                log.channel,
                log.recipient,
                log.package_id,
                log.title,
                payload,
                log.status.as_str(),
                log.error,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn recent_logs(&self, limit: i64) -> Result<Vec<NotificationLogEntry>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, notification_type, channel, recipient, package_id, title, payload, status, error, created_at
                 FROM notification_log ORDER BY created_at DESC, id DESC LIMIT ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let payload_json: String = row.get(6)?;
                let status: String = row.get(7)?;
                let created_at_str: String = row.get(9)?;

                Ok(NotificationLogEntry {
                    id: row.get(0)?,
                    notification_type: row.get(1)?,
                    channel: row.get(2)?,
                    recipient: row.get(3)?,
                    package_id: row.get(4)?,
                    title: row.get(5)?,
                    payload: serde_json::from_str(&payload_json)
                        .unwrap_or(serde_json::Value::Null),
                    status: NotificationLogStatus::parse(&status)
                        .unwrap_or(NotificationLogStatus::Failed),
                    error: row.get(8)?,
                    created_at: Self::parse_timestamp(Some(created_at_str))
                        .unwrap_or_else(Utc::now),
                })
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }
        Ok(entries)
    }
}

impl RunLockStore for SqliteStore {
    fn try_acquire(&self, name: &str, ttl: Duration) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        // Expired holders are treated as crashed and swept first
        conn.execute(
            "DELETE FROM run_locks WHERE name = ? AND expires_at <= ?",
            params![name, now.to_rfc3339()],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let inserted = conn
            .execute(
                "INSERT INTO run_locks (name, acquired_at, expires_at) VALUES (?, ?, ?)
                 ON CONFLICT(name) DO NOTHING",
                params![name, now.to_rfc3339(), (now + ttl).to_rfc3339()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    fn release(&self, name: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM run_locks WHERE name = ?", params![name])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
