//! SQLite-backed store.
//!
//! The identity-number uniqueness rule lives in the schema
//! (`UNIQUE (tc_kimlik_no)`), and admission runs inside a single
//! `BEGIN IMMEDIATE` transaction, so separate processes sharing the same
//! database file are serialized by SQLite itself.

use super::{AidStore, StoreAdmission};
use crate::error::StoreError;
use crate::messages;
use crate::types::{
    AttemptQuery, ContactUpdate, DuplicateAttempt, DuplicateAttemptDetail, ExistingRecord,
    Neighborhood, NeighborhoodStats, NewNeighborhood, NewUserProfile, Overview,
    RegistrationDetail, RegistrationQuery, RegistrationRecord, Role, UserProfile, UserStats,
    DUPLICATE_REASON_CODE,
};
use crate::validation::NewRegistration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS neighborhoods (
    id                  TEXT PRIMARY KEY,
    name                TEXT NOT NULL UNIQUE,
    representative_name TEXT NOT NULL,
    active              INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_profiles (
    id              TEXT PRIMARY KEY,
    full_name       TEXT NOT NULL,
    email           TEXT NOT NULL UNIQUE,
    role            TEXT NOT NULL CHECK (role IN ('admin', 'mahalle_baskani', 'kullanici')),
    neighborhood_id TEXT REFERENCES neighborhoods(id),
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS registrations (
    id              TEXT PRIMARY KEY,
    tc_kimlik_no    TEXT NOT NULL,
    given_name      TEXT NOT NULL,
    family_name     TEXT NOT NULL,
    address         TEXT NOT NULL CHECK (length(address) >= 10),
    phone           TEXT,
    neighborhood_id TEXT NOT NULL REFERENCES neighborhoods(id),
    registered_by   TEXT NOT NULL REFERENCES user_profiles(id),
    note            TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    CONSTRAINT registrations_tc_kimlik_no_unique UNIQUE (tc_kimlik_no)
);

CREATE INDEX IF NOT EXISTS idx_registrations_neighborhood
    ON registrations(neighborhood_id, created_at);
CREATE INDEX IF NOT EXISTS idx_registrations_registered_by
    ON registrations(registered_by);

CREATE TABLE IF NOT EXISTS duplicate_attempts (
    id                       TEXT PRIMARY KEY,
    tc_kimlik_no             TEXT NOT NULL,
    given_name               TEXT NOT NULL,
    family_name              TEXT NOT NULL,
    address                  TEXT,
    phone                    TEXT,
    attempted_by             TEXT NOT NULL REFERENCES user_profiles(id),
    neighborhood_id          TEXT NOT NULL REFERENCES neighborhoods(id),
    reason                   TEXT NOT NULL,
    reason_code              TEXT NOT NULL,
    existing_record_id       TEXT,
    existing_neighborhood_id TEXT,
    existing_given_name      TEXT,
    existing_family_name     TEXT,
    created_at               TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_duplicate_attempts_neighborhood
    ON duplicate_attempts(neighborhood_id, created_at);
CREATE INDEX IF NOT EXISTS idx_duplicate_attempts_tc
    ON duplicate_attempts(tc_kimlik_no);
"#;

const REGISTRATION_DETAIL_SELECT: &str = r#"
SELECT r.id, r.tc_kimlik_no, r.given_name, r.family_name, r.address, r.phone,
       r.neighborhood_id, r.registered_by, r.note, r.created_at, r.updated_at,
       n.name, n.representative_name, u.full_name, u.email
FROM registrations r
JOIN neighborhoods n ON n.id = r.neighborhood_id
JOIN user_profiles u ON u.id = r.registered_by
"#;

const REGISTRATION_SELECT: &str = r#"
SELECT id, tc_kimlik_no, given_name, family_name, address, phone,
       neighborhood_id, registered_by, note, created_at, updated_at
FROM registrations
"#;

/// SQLite store. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("Cannot create {:?}: {}", parent, e)))?;
        }

        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!("SQLite journal mode: {}", mode);

        let store = Self::from_connection(conn)?;
        info!("Opened registration database at {:?}", path);
        Ok(store)
    }

    /// Private in-memory database, for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self::from_connection(Connection::open_in_memory()?)?;
        warn!("Using in-memory registration database (data will be lost on restart)");
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await?
    }
}

fn extended_constraint_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    }
}

/// True when the failure is the identity-number uniqueness constraint.
fn is_tc_conflict(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) => {
            err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg
                    .as_deref()
                    .map_or(true, |m| m.contains("registrations.tc_kimlik_no"))
        }
        _ => false,
    }
}

fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    extended_constraint_code(e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

/// Classify a failed write. Foreign keys are resolved by the caller, which
/// knows the referencing column.
fn write_error(e: rusqlite::Error, what: &str) -> StoreError {
    match extended_constraint_code(&e) {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            StoreError::Conflict(format!("{} already exists", what))
        }
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
            StoreError::InvalidData(format!("{} references a missing row", what))
        }
        Some(ffi::SQLITE_CONSTRAINT_CHECK) | Some(ffi::SQLITE_CONSTRAINT_NOTNULL) => {
            StoreError::InvalidData(format!("{} violates a column rule", what))
        }
        _ => StoreError::from(e),
    }
}

/// Name the column of a registration (or attempt) whose referenced row is missing.
fn unresolved_reference(conn: &Connection, registration: &NewRegistration) -> StoreError {
    let neighborhood = conn
        .query_row(
            "SELECT 1 FROM neighborhoods WHERE id = ?1",
            params![registration.neighborhood_id()],
            |_| Ok(()),
        )
        .optional();
    match neighborhood {
        Ok(None) => StoreError::InvalidReference("neighborhood_id".into()),
        Ok(Some(())) => StoreError::InvalidReference("registered_by".into()),
        Err(e) => StoreError::from(e),
    }
}

fn parse_role(row: &Row<'_>, idx: usize) -> rusqlite::Result<Role> {
    let raw: String = row.get(idx)?;
    raw.parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value.max(0) as u64)
}

fn limit_param(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    limit.map(|l| l.min(i64::MAX as usize) as i64).unwrap_or(-1)
}

fn map_registration(row: &Row<'_>) -> rusqlite::Result<RegistrationRecord> {
    Ok(RegistrationRecord {
        id: row.get(0)?,
        tc_kimlik_no: row.get(1)?,
        given_name: row.get(2)?,
        family_name: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        neighborhood_id: row.get(6)?,
        registered_by: row.get(7)?,
        note: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_registration_detail(row: &Row<'_>) -> rusqlite::Result<RegistrationDetail> {
    Ok(RegistrationDetail {
        record: map_registration(row)?,
        neighborhood_name: row.get(11)?,
        representative_name: row.get(12)?,
        registered_by_name: row.get(13)?,
        registered_by_email: row.get(14)?,
    })
}

fn map_attempt_detail(row: &Row<'_>) -> rusqlite::Result<DuplicateAttemptDetail> {
    Ok(DuplicateAttemptDetail {
        attempt: DuplicateAttempt {
            id: row.get(0)?,
            tc_kimlik_no: row.get(1)?,
            given_name: row.get(2)?,
            family_name: row.get(3)?,
            address: row.get(4)?,
            phone: row.get(5)?,
            attempted_by: row.get(6)?,
            neighborhood_id: row.get(7)?,
            reason: row.get(8)?,
            reason_code: row.get(9)?,
            existing_record_id: row.get(10)?,
            existing_neighborhood_id: row.get(11)?,
            existing_given_name: row.get(12)?,
            existing_family_name: row.get(13)?,
            created_at: row.get(14)?,
        },
        neighborhood_name: row.get(15)?,
        attempted_by_name: row.get(16)?,
        attempted_by_email: row.get(17)?,
        existing_neighborhood_name: row.get(18)?,
    })
}

fn map_neighborhood(row: &Row<'_>) -> rusqlite::Result<Neighborhood> {
    Ok(Neighborhood {
        id: row.get(0)?,
        name: row.get(1)?,
        representative_name: row.get(2)?,
        active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        role: parse_role(row, 3)?,
        neighborhood_id: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn find_existing(conn: &Connection, tc_kimlik_no: &str) -> rusqlite::Result<Option<ExistingRecord>> {
    conn.query_row(
        "SELECT r.id, r.neighborhood_id, n.name, r.given_name, r.family_name
         FROM registrations r
         JOIN neighborhoods n ON n.id = r.neighborhood_id
         WHERE r.tc_kimlik_no = ?1",
        params![tc_kimlik_no],
        |row| {
            Ok(ExistingRecord {
                id: row.get(0)?,
                neighborhood_id: row.get(1)?,
                neighborhood_name: row.get(2)?,
                given_name: row.get(3)?,
                family_name: row.get(4)?,
            })
        },
    )
    .optional()
}

fn registration_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<RegistrationRecord>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", REGISTRATION_SELECT),
        params![id],
        map_registration,
    )
    .optional()
}

/// The admission transaction: insert, or on an identity-number conflict
/// record the attempt. Both branches commit exactly one row.
fn admit_in_transaction(
    conn: &mut Connection,
    registration: &NewRegistration,
    now: DateTime<Utc>,
) -> Result<StoreAdmission, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let tc = registration.tc_kimlik_no().as_str();

    let record = RegistrationRecord {
        id: Uuid::new_v4().to_string(),
        tc_kimlik_no: tc.to_string(),
        given_name: registration.given_name().to_string(),
        family_name: registration.family_name().to_string(),
        address: registration.address().to_string(),
        phone: registration.phone().map(str::to_string),
        neighborhood_id: registration.neighborhood_id().to_string(),
        registered_by: registration.registered_by().to_string(),
        note: registration.note().map(str::to_string),
        created_at: now,
        updated_at: now,
    };

    let inserted = tx.execute(
        "INSERT INTO registrations (
            id, tc_kimlik_no, given_name, family_name, address, phone,
            neighborhood_id, registered_by, note, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id,
            record.tc_kimlik_no,
            record.given_name,
            record.family_name,
            record.address,
            record.phone,
            record.neighborhood_id,
            record.registered_by,
            record.note,
            record.created_at,
            record.updated_at,
        ],
    );

    match inserted {
        Ok(_) => {
            tx.commit()?;
            Ok(StoreAdmission::Inserted(record))
        }
        Err(e) if is_tc_conflict(&e) => {
            let existing = find_existing(&tx, tc)?;
            let attempt = DuplicateAttempt {
                id: Uuid::new_v4().to_string(),
                tc_kimlik_no: tc.to_string(),
                given_name: record.given_name,
                family_name: record.family_name,
                address: Some(record.address),
                phone: record.phone,
                attempted_by: record.registered_by,
                neighborhood_id: record.neighborhood_id,
                reason: messages::duplicate_reason(
                    existing.as_ref().map(|e| e.neighborhood_name.as_str()),
                ),
                reason_code: DUPLICATE_REASON_CODE.to_string(),
                existing_record_id: existing.as_ref().map(|e| e.id.clone()),
                existing_neighborhood_id: existing.as_ref().map(|e| e.neighborhood_id.clone()),
                existing_given_name: existing.as_ref().map(|e| e.given_name.clone()),
                existing_family_name: existing.as_ref().map(|e| e.family_name.clone()),
                created_at: now,
            };

            tx.execute(
                "INSERT INTO duplicate_attempts (
                    id, tc_kimlik_no, given_name, family_name, address, phone,
                    attempted_by, neighborhood_id, reason, reason_code,
                    existing_record_id, existing_neighborhood_id,
                    existing_given_name, existing_family_name, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    attempt.id,
                    attempt.tc_kimlik_no,
                    attempt.given_name,
                    attempt.family_name,
                    attempt.address,
                    attempt.phone,
                    attempt.attempted_by,
                    attempt.neighborhood_id,
                    attempt.reason,
                    attempt.reason_code,
                    attempt.existing_record_id,
                    attempt.existing_neighborhood_id,
                    attempt.existing_given_name,
                    attempt.existing_family_name,
                    attempt.created_at,
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    unresolved_reference(&tx, registration)
                } else {
                    write_error(e, "duplicate attempt")
                }
            })?;

            tx.commit()?;
            Ok(StoreAdmission::Duplicate { attempt, existing })
        }
        // Dropping `tx` rolls back.
        Err(e) if is_foreign_key_violation(&e) => Err(unresolved_reference(&tx, registration)),
        Err(e) => Err(write_error(e, "registration")),
    }
}

#[async_trait]
impl AidStore for SqliteStore {
    #[instrument(skip(self, registration), fields(tc = %registration.tc_kimlik_no().masked()))]
    async fn admit(&self, registration: &NewRegistration) -> Result<StoreAdmission, StoreError> {
        let registration = registration.clone();
        let admission = self
            .with_conn(move |conn| admit_in_transaction(conn, &registration, Utc::now()))
            .await?;

        match &admission {
            StoreAdmission::Inserted(record) => debug!(id = %record.id, "Registration inserted"),
            StoreAdmission::Duplicate { attempt, .. } => {
                debug!(attempt_id = %attempt.id, "Duplicate attempt recorded")
            }
        }
        Ok(admission)
    }

    #[instrument(skip(self))]
    async fn registration(&self, id: &str) -> Result<Option<RegistrationDetail>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE r.id = ?1", REGISTRATION_DETAIL_SELECT),
                params![id],
                map_registration_detail,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn registrations(
        &self,
        query: &RegistrationQuery,
    ) -> Result<Vec<RegistrationDetail>, StoreError> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR r.neighborhood_id = ?1)
                   AND (?2 IS NULL OR r.registered_by = ?2)
                 ORDER BY r.created_at DESC, r.rowid DESC
                 LIMIT ?3",
                REGISTRATION_DETAIL_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    query.neighborhood_id,
                    query.registered_by,
                    limit_param(query.limit)
                ],
                map_registration_detail,
            )?;
            let records = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_contact(
        &self,
        id: &str,
        update: &ContactUpdate,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        let id = id.to_string();
        let update = update.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let changed = tx
                .execute(
                    "UPDATE registrations SET
                        phone = CASE WHEN ?2 THEN ?3 ELSE phone END,
                        note = CASE WHEN ?4 THEN ?5 ELSE note END,
                        updated_at = ?6
                     WHERE id = ?1",
                    params![
                        id,
                        update.phone.is_some(),
                        update.phone.clone().flatten(),
                        update.note.is_some(),
                        update.note.clone().flatten(),
                        Utc::now(),
                    ],
                )
                .map_err(|e| write_error(e, "registration"))?;
            if changed == 0 {
                return Ok(None);
            }
            let record = registration_by_id(&tx, &id)?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn duplicate_attempts(
        &self,
        query: &AttemptQuery,
    ) -> Result<Vec<DuplicateAttemptDetail>, StoreError> {
        let query = query.clone();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.tc_kimlik_no, d.given_name, d.family_name, d.address, d.phone,
                        d.attempted_by, d.neighborhood_id, d.reason, d.reason_code,
                        d.existing_record_id, d.existing_neighborhood_id,
                        d.existing_given_name, d.existing_family_name, d.created_at,
                        n.name, u.full_name, u.email, en.name
                 FROM duplicate_attempts d
                 JOIN neighborhoods n ON n.id = d.neighborhood_id
                 JOIN user_profiles u ON u.id = d.attempted_by
                 LEFT JOIN neighborhoods en ON en.id = d.existing_neighborhood_id
                 WHERE (?1 IS NULL OR d.neighborhood_id = ?1)
                 ORDER BY d.created_at DESC, d.rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(
                params![query.neighborhood_id, limit_param(query.limit)],
                map_attempt_detail,
            )?;
            let attempts = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(attempts)
        })
        .await
    }

    #[instrument(skip(self, neighborhood), fields(name = %neighborhood.name))]
    async fn create_neighborhood(
        &self,
        neighborhood: &NewNeighborhood,
    ) -> Result<Neighborhood, StoreError> {
        let created = Neighborhood {
            id: Uuid::new_v4().to_string(),
            name: neighborhood.name.trim().to_string(),
            representative_name: neighborhood.representative_name.trim().to_string(),
            active: true,
            created_at: Utc::now(),
        };
        let row = created.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO neighborhoods (id, name, representative_name, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id,
                    row.name,
                    row.representative_name,
                    row.active,
                    row.created_at
                ],
            )
            .map_err(|e| write_error(e, "neighborhood"))?;
            Ok(())
        })
        .await?;

        info!(id = %created.id, "Neighborhood created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn neighborhood(&self, id: &str) -> Result<Option<Neighborhood>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, representative_name, active, created_at
                 FROM neighborhoods WHERE id = ?1",
                params![id],
                map_neighborhood,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn neighborhood_stats(
        &self,
        neighborhood_id: Option<&str>,
    ) -> Result<Vec<NeighborhoodStats>, StoreError> {
        let neighborhood_id = neighborhood_id.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.name, n.representative_name, n.active,
                    (SELECT COUNT(*) FROM registrations r WHERE r.neighborhood_id = n.id),
                    (SELECT COUNT(*) FROM user_profiles u
                        WHERE u.neighborhood_id = n.id AND u.active = 1),
                    (SELECT COUNT(*) FROM duplicate_attempts d WHERE d.neighborhood_id = n.id),
                    (SELECT COUNT(*) FROM registrations r
                        WHERE r.neighborhood_id = n.id AND r.phone IS NOT NULL),
                    (SELECT MIN(r.created_at) FROM registrations r WHERE r.neighborhood_id = n.id),
                    (SELECT MAX(r.created_at) FROM registrations r WHERE r.neighborhood_id = n.id)
                 FROM neighborhoods n
                 WHERE (?1 IS NULL OR n.id = ?1)
                 ORDER BY n.name",
            )?;
            let rows = stmt.query_map(params![neighborhood_id], |row| {
                Ok(NeighborhoodStats {
                    neighborhood_id: row.get(0)?,
                    neighborhood_name: row.get(1)?,
                    representative_name: row.get(2)?,
                    active: row.get(3)?,
                    total_registrations: count(row, 4)?,
                    active_users: count(row, 5)?,
                    duplicate_attempts: count(row, 6)?,
                    registrations_with_phone: count(row, 7)?,
                    first_registration_at: row.get(8)?,
                    last_registration_at: row.get(9)?,
                })
            })?;
            let stats = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(stats)
        })
        .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, role = %user.role))]
    async fn create_user(&self, user: &NewUserProfile) -> Result<UserProfile, StoreError> {
        let now = Utc::now();
        let created = UserProfile {
            id: user.id.trim().to_string(),
            full_name: user.full_name.trim().to_string(),
            email: user.email.trim().to_lowercase(),
            role: user.role,
            neighborhood_id: user
                .neighborhood_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            active: true,
            created_at: now,
            updated_at: now,
        };
        let row = created.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO user_profiles (
                    id, full_name, email, role, neighborhood_id, active, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.full_name,
                    row.email,
                    row.role.as_str(),
                    row.neighborhood_id,
                    row.active,
                    row.created_at,
                    row.updated_at
                ],
            )
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::InvalidReference("neighborhood_id".into())
                } else {
                    write_error(e, "user profile")
                }
            })?;
            Ok(())
        })
        .await?;

        info!("User profile created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn user(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, full_name, email, role, neighborhood_id, active, created_at, updated_at
                 FROM user_profiles WHERE id = ?1",
                params![id],
                map_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn user_stats(&self, neighborhood_id: Option<&str>) -> Result<Vec<UserStats>, StoreError> {
        let neighborhood_id = neighborhood_id.map(str::to_string);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.full_name, u.email, u.role, n.name,
                        COUNT(r.id), COUNT(r.phone), MIN(r.created_at), MAX(r.created_at)
                 FROM user_profiles u
                 LEFT JOIN neighborhoods n ON n.id = u.neighborhood_id
                 LEFT JOIN registrations r ON r.registered_by = u.id
                 WHERE (?1 IS NULL OR u.neighborhood_id = ?1)
                 GROUP BY u.id
                 ORDER BY COUNT(r.id) DESC, u.full_name",
            )?;
            let rows = stmt.query_map(params![neighborhood_id], |row| {
                Ok(UserStats {
                    user_id: row.get(0)?,
                    full_name: row.get(1)?,
                    email: row.get(2)?,
                    role: parse_role(row, 3)?,
                    neighborhood_name: row.get(4)?,
                    total_registrations: count(row, 5)?,
                    registrations_with_phone: count(row, 6)?,
                    first_registration_at: row.get(7)?,
                    last_registration_at: row.get(8)?,
                })
            })?;
            let stats = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(stats)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn overview(&self) -> Result<Overview, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM registrations),
                    (SELECT COUNT(*) FROM neighborhoods),
                    (SELECT COUNT(*) FROM user_profiles WHERE active = 1),
                    (SELECT COUNT(*) FROM duplicate_attempts)",
                [],
                |row| {
                    Ok(Overview {
                        total_registrations: count(row, 0)?,
                        total_neighborhoods: count(row, 1)?,
                        active_users: count(row, 2)?,
                        duplicate_attempts: count(row, 3)?,
                    })
                },
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn health_check(&self) -> bool {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(StoreError::from)
        })
        .await
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RegistrationForm;

    struct Fixture {
        store: SqliteStore,
        merkez: Neighborhood,
        yesiltepe: Neighborhood,
        rep_merkez: UserProfile,
        rep_yesiltepe: UserProfile,
    }

    async fn fixture() -> Fixture {
        let store = SqliteStore::open_in_memory().unwrap();
        let merkez = store
            .create_neighborhood(&NewNeighborhood {
                name: "Merkez".into(),
                representative_name: "Hasan Demir".into(),
            })
            .await
            .unwrap();
        let yesiltepe = store
            .create_neighborhood(&NewNeighborhood {
                name: "Yeşiltepe".into(),
                representative_name: "Fatma Şahin".into(),
            })
            .await
            .unwrap();
        let rep_merkez = store
            .create_user(&NewUserProfile {
                id: "rep-merkez".into(),
                full_name: "Hasan Demir".into(),
                email: "hasan@example.org".into(),
                role: Role::NeighborhoodRepresentative,
                neighborhood_id: Some(merkez.id.clone()),
            })
            .await
            .unwrap();
        let rep_yesiltepe = store
            .create_user(&NewUserProfile {
                id: "rep-yesiltepe".into(),
                full_name: "Fatma Şahin".into(),
                email: "FATMA@example.org".into(),
                role: Role::NeighborhoodRepresentative,
                neighborhood_id: Some(yesiltepe.id.clone()),
            })
            .await
            .unwrap();
        Fixture {
            store,
            merkez,
            yesiltepe,
            rep_merkez,
            rep_yesiltepe,
        }
    }

    fn registration(tc: &str, name: &str, neighborhood: &str, user: &str) -> NewRegistration {
        RegistrationForm {
            tc_kimlik_no: tc.into(),
            given_name: name.into(),
            family_name: "Yılmaz".into(),
            address: "Cumhuriyet Mah. 5. Sokak No: 7".into(),
            phone: None,
            note: None,
            neighborhood_id: None,
        }
        .validate(neighborhood, user)
        .unwrap()
    }

    #[tokio::test]
    async fn test_admit_then_duplicate() {
        let f = fixture().await;
        let first = registration("12345678950", "Ahmet", &f.merkez.id, &f.rep_merkez.id);

        let admission = f.store.admit(&first).await.unwrap();
        let record = match admission {
            StoreAdmission::Inserted(record) => record,
            other => panic!("expected insert, got {:?}", other),
        };
        assert_eq!(record.tc_kimlik_no, "12345678950");

        let second = registration("12345678950", "Mehmet", &f.yesiltepe.id, &f.rep_yesiltepe.id);
        match f.store.admit(&second).await.unwrap() {
            StoreAdmission::Duplicate { attempt, existing } => {
                let existing = existing.unwrap();
                assert_eq!(existing.id, record.id);
                assert_eq!(existing.neighborhood_id, f.merkez.id);
                assert_eq!(existing.neighborhood_name, "Merkez");
                assert_eq!(attempt.neighborhood_id, f.yesiltepe.id);
                assert_eq!(attempt.existing_neighborhood_id.as_deref(), Some(f.merkez.id.as_str()));
                assert_eq!(attempt.reason_code, DUPLICATE_REASON_CODE);
                assert!(attempt.reason.contains("Merkez"));
            }
            other => panic!("expected duplicate, got {:?}", other),
        }

        let overview = f.store.overview().await.unwrap();
        assert_eq!(overview.total_registrations, 1);
        assert_eq!(overview.duplicate_attempts, 1);
    }

    #[tokio::test]
    async fn test_unknown_neighborhood_is_invalid_reference() {
        let f = fixture().await;
        let reg = registration("12345678950", "Ahmet", "missing", &f.rep_merkez.id);
        let err = f.store.admit(&reg).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(ref column) if column == "neighborhood_id"));
        assert_eq!(f.store.overview().await.unwrap().total_registrations, 0);
    }

    #[tokio::test]
    async fn test_unknown_registrant_is_invalid_reference() {
        let f = fixture().await;
        let reg = registration("12345678950", "Ahmet", &f.merkez.id, "ghost");
        let err = f.store.admit(&reg).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(ref column) if column == "registered_by"));

        // Same on the duplicate path, where the audit row carries the reference.
        f.store
            .admit(&registration("12345678950", "Ahmet", &f.merkez.id, &f.rep_merkez.id))
            .await
            .unwrap();
        let err = f.store.admit(&reg).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(ref column) if column == "registered_by"));

        let overview = f.store.overview().await.unwrap();
        assert_eq!(overview.total_registrations, 1);
        assert_eq!(overview.duplicate_attempts, 0);
    }

    #[tokio::test]
    async fn test_user_with_unknown_neighborhood_is_invalid_reference() {
        let f = fixture().await;
        let err = f
            .store
            .create_user(&NewUserProfile {
                id: "orphan".into(),
                full_name: "Kimse".into(),
                email: "orphan@example.org".into(),
                role: Role::RegisteredUser,
                neighborhood_id: Some("missing".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(ref column) if column == "neighborhood_id"));
    }

    #[tokio::test]
    async fn test_registrations_filtered_and_newest_first() {
        let f = fixture().await;
        for (tc, name) in [("10000000078", "Ali"), ("11111111110", "Veli")] {
            f.store
                .admit(&registration(tc, name, &f.merkez.id, &f.rep_merkez.id))
                .await
                .unwrap();
        }
        f.store
            .admit(&registration("12345678950", "Ayşe", &f.yesiltepe.id, &f.rep_yesiltepe.id))
            .await
            .unwrap();

        let merkez = f
            .store
            .registrations(&RegistrationQuery {
                neighborhood_id: Some(f.merkez.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(merkez.len(), 2);
        assert_eq!(merkez[0].record.given_name, "Veli");
        assert_eq!(merkez[0].neighborhood_name, "Merkez");
        assert_eq!(merkez[0].registered_by_name, "Hasan Demir");

        let limited = f
            .store
            .registrations(&RegistrationQuery {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].record.given_name, "Ayşe");

        let by_user = f
            .store
            .registrations(&RegistrationQuery {
                registered_by: Some(f.rep_yesiltepe.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_user.len(), 1);
    }

    #[tokio::test]
    async fn test_update_contact() {
        let f = fixture().await;
        let record = match f
            .store
            .admit(&registration("12345678950", "Ahmet", &f.merkez.id, &f.rep_merkez.id))
            .await
            .unwrap()
        {
            StoreAdmission::Inserted(record) => record,
            other => panic!("expected insert, got {:?}", other),
        };

        let updated = f
            .store
            .update_contact(
                &record.id,
                &ContactUpdate {
                    phone: Some(Some("0555 123 4567".into())),
                    note: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("0555 123 4567"));
        assert_eq!(updated.note, None);
        assert_eq!(updated.tc_kimlik_no, record.tc_kimlik_no);
        assert!(updated.updated_at >= record.updated_at);

        let cleared = f
            .store
            .update_contact(
                &record.id,
                &ContactUpdate {
                    phone: Some(None),
                    note: Some(Some("İkinci kat".into())),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cleared.phone, None);
        assert_eq!(cleared.note.as_deref(), Some("İkinci kat"));

        let missing = f
            .store
            .update_contact("nope", &ContactUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_attempts_listing() {
        let f = fixture().await;
        f.store
            .admit(&registration("12345678950", "Ahmet", &f.merkez.id, &f.rep_merkez.id))
            .await
            .unwrap();
        f.store
            .admit(&registration("12345678950", "Ahmet", &f.yesiltepe.id, &f.rep_yesiltepe.id))
            .await
            .unwrap();
        f.store
            .admit(&registration("12345678950", "Ahmet", &f.merkez.id, &f.rep_merkez.id))
            .await
            .unwrap();

        let all = f.store.duplicate_attempts(&AttemptQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].attempt.neighborhood_id, f.merkez.id);
        assert_eq!(all[1].attempted_by_name, "Fatma Şahin");
        assert_eq!(all[1].existing_neighborhood_name.as_deref(), Some("Merkez"));

        let yesiltepe = f
            .store
            .duplicate_attempts(&AttemptQuery {
                neighborhood_id: Some(f.yesiltepe.id.clone()),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(yesiltepe.len(), 1);
    }

    #[tokio::test]
    async fn test_neighborhood_and_user_stats() {
        let f = fixture().await;
        let mut with_phone = RegistrationForm {
            tc_kimlik_no: "10000000078".into(),
            given_name: "Ali".into(),
            family_name: "Kaya".into(),
            address: "Cumhuriyet Mah. 5. Sokak No: 7".into(),
            phone: Some("0555 123 4567".into()),
            note: None,
            neighborhood_id: None,
        };
        f.store
            .admit(&with_phone.clone().validate(&f.merkez.id, &f.rep_merkez.id).unwrap())
            .await
            .unwrap();
        with_phone.phone = None;
        with_phone.tc_kimlik_no = "11111111110".into();
        f.store
            .admit(&with_phone.validate(&f.merkez.id, &f.rep_merkez.id).unwrap())
            .await
            .unwrap();

        let stats = f.store.neighborhood_stats(Some(&f.merkez.id)).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_registrations, 2);
        assert_eq!(stats[0].registrations_with_phone, 1);
        assert_eq!(stats[0].active_users, 1);
        assert!(stats[0].first_registration_at <= stats[0].last_registration_at);

        let all = f.store.neighborhood_stats(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].neighborhood_name, "Yeşiltepe");
        assert_eq!(all[1].total_registrations, 0);
        assert!(all[1].last_registration_at.is_none());

        let users = f.store.user_stats(None).await.unwrap();
        assert_eq!(users[0].user_id, f.rep_merkez.id);
        assert_eq!(users[0].total_registrations, 2);
        assert_eq!(users[0].registrations_with_phone, 1);
        assert_eq!(users[1].total_registrations, 0);

        let scoped = f.store.user_stats(Some(&f.yesiltepe.id)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].neighborhood_name.as_deref(), Some("Yeşiltepe"));
    }

    #[tokio::test]
    async fn test_user_round_trip_and_conflicts() {
        let f = fixture().await;
        let user = f.store.user("rep-yesiltepe").await.unwrap().unwrap();
        assert_eq!(user.email, "fatma@example.org");
        assert_eq!(user.role, Role::NeighborhoodRepresentative);
        assert!(f.store.user("ghost").await.unwrap().is_none());

        let err = f
            .store
            .create_user(&NewUserProfile {
                id: "other".into(),
                full_name: "Başka".into(),
                email: "hasan@example.org".into(),
                role: Role::RegisteredUser,
                neighborhood_id: Some(f.merkez.id.clone()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = f
            .store
            .create_neighborhood(&NewNeighborhood {
                name: "Merkez".into(),
                representative_name: "Kimse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = f.store.neighborhood(&f.merkez.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Merkez");
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("yardim.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .create_neighborhood(&NewNeighborhood {
                    name: "Merkez".into(),
                    representative_name: "Hasan Demir".into(),
                })
                .await
                .unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.overview().await.unwrap().total_neighborhoods, 1);
    }
}
