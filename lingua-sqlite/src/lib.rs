use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use lingua_core::{
    repo::Repository, ActivityLedger, CardId, CardStatus, CoreError, Grade, ReviewCard,
    ReviewEntry,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

pub struct SqliteRepo {
    pool: SqlitePool,
}

const CARD_COLUMNS: &str = "id,user_id,vocabulary_id,status,ease_factor,interval_days,\
                            next_review_at,created_at,updated_at,version";

// Stays well under SQLite's bound-parameter limit.
const HISTORY_BATCH: usize = 500;

const LEDGER_COLUMNS: &str = "id,user_id,language,streak_days,last_activity,total_time_spent,\
                              vocabulary_learned,vocabulary_mastered,exercises_done,tests_done,\
                              created_at,updated_at,version";

impl SqliteRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        tracing::info!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(repo)
    }

    /// Each in-memory SQLite connection is its own database, so the pool is
    /// pinned to one long-lived connection.
    pub async fn open_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|_| CoreError::Storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS cards (
          id              TEXT PRIMARY KEY,
          user_id         TEXT NOT NULL,
          vocabulary_id   TEXT NOT NULL,
          status          TEXT NOT NULL DEFAULT 'new',
          ease_factor     REAL NOT NULL DEFAULT 2.5,
          interval_days   INTEGER NOT NULL DEFAULT 1,
          next_review_at  TEXT NOT NULL,
          created_at      TEXT NOT NULL,
          updated_at      TEXT NOT NULL,
          version         INTEGER NOT NULL,
          UNIQUE(user_id, vocabulary_id)
        );

        CREATE TABLE IF NOT EXISTS review_history (
          card_id      TEXT NOT NULL,
          seq          INTEGER NOT NULL,
          reviewed_at  TEXT NOT NULL,
          grade        TEXT NOT NULL,
          PRIMARY KEY (card_id, seq),
          FOREIGN KEY(card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS ledgers (
          id                   TEXT PRIMARY KEY,
          user_id              TEXT NOT NULL,
          language             TEXT NOT NULL,
          streak_days          INTEGER NOT NULL DEFAULT 0,
          last_activity        TEXT,
          total_time_spent     INTEGER NOT NULL DEFAULT 0,
          vocabulary_learned   INTEGER NOT NULL DEFAULT 0,
          vocabulary_mastered  INTEGER NOT NULL DEFAULT 0,
          exercises_done       INTEGER NOT NULL DEFAULT 0,
          tests_done           INTEGER NOT NULL DEFAULT 0,
          created_at           TEXT NOT NULL,
          updated_at           TEXT NOT NULL,
          version              INTEGER NOT NULL,
          UNIQUE(user_id, language)
        );

        CREATE INDEX IF NOT EXISTS idx_cards_user_due ON cards (user_id, next_review_at);
        "#;

        // Execute statements one by one for compatibility.
        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("sqlite schema"))?;
        }
        Ok(())
    }

    /// Review history for the given cards, keyed by card id.
    async fn histories_for(
        &self,
        card_ids: &[String],
    ) -> Result<HashMap<String, Vec<ReviewEntry>>, CoreError> {
        let mut map: HashMap<String, Vec<ReviewEntry>> = HashMap::new();
        for chunk in card_ids.chunks(HISTORY_BATCH) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT card_id, reviewed_at, grade FROM review_history
                 WHERE card_id IN ({placeholders})
                 ORDER BY card_id, seq"
            );
            let mut q = sqlx::query(&sql);
            for id in chunk {
                q = q.bind(id);
            }
            let rows = q
                .fetch_all(&self.pool)
                .await
                .map_err(|_| CoreError::Storage("list history"))?;
            for row in rows {
                let card_id: String = row.get("card_id");
                map.entry(card_id).or_default().push(row_into_entry(&row)?);
            }
        }
        Ok(map)
    }

    async fn cards_with_history(&self, rows: Vec<SqliteRow>) -> Result<Vec<ReviewCard>, CoreError> {
        let ids: Vec<String> = rows.iter().map(|r| r.get::<String, _>("id")).collect();
        let mut histories = self.histories_for(&ids).await?;
        let mut v = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(ids) {
            let history = histories.remove(&id).unwrap_or_default();
            v.push(row_into_card(row, history)?);
        }
        Ok(v)
    }

    async fn card_version(&self, id: CardId) -> Result<Option<i64>, CoreError> {
        sqlx::query("SELECT version FROM cards WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))
            .map(|r| r.map(|row| row.get::<i64, _>("version")))
    }
}

#[async_trait::async_trait]
impl Repository for SqliteRepo {
    // ===== Cards =====
    async fn create_card(
        &self,
        user_id: &str,
        vocabulary_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewCard, CoreError> {
        let exists = sqlx::query("SELECT 1 FROM cards WHERE user_id=? AND vocabulary_id=? LIMIT 1")
            .bind(user_id)
            .bind(vocabulary_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| CoreError::Storage("read card"))?
            .is_some();
        if exists {
            return Err(CoreError::AlreadyExists("flashcard"));
        }

        let mut card = ReviewCard::new(user_id, vocabulary_id, at_stored_precision(now));
        card.version = 1;
        sqlx::query(&format!(
            "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?)"
        ))
        .bind(card.id.to_string())
        .bind(&card.user_id)
        .bind(&card.vocabulary_id)
        .bind(card.status.as_str())
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(dt_to_str(card.next_review_at))
        .bind(dt_to_str(card.created_at))
        .bind(dt_to_str(card.updated_at))
        .bind(card.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_or(e, CoreError::AlreadyExists("flashcard"), "insert card"))?;

        Ok(card)
    }

    async fn get_card(&self, user_id: &str, id: CardId) -> Result<ReviewCard, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id=? AND user_id=?"
        ))
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read card"))?;
        let row = row.ok_or(CoreError::NotFound("card"))?;

        let history_rows = sqlx::query(
            "SELECT reviewed_at, grade FROM review_history WHERE card_id=? ORDER BY seq ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read history"))?;
        let history = history_rows
            .iter()
            .map(row_into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        row_into_card(&row, history)
    }

    async fn list_cards(&self, user_id: &str) -> Result<Vec<ReviewCard>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE user_id=? ORDER BY next_review_at ASC, created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("list cards"))?;
        self.cards_with_history(rows).await
    }

    async fn due_cards(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReviewCard>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards
             WHERE user_id=? AND next_review_at <= ?
             ORDER BY next_review_at ASC, created_at ASC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(dt_to_str(now))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("due cards"))?;
        self.cards_with_history(rows).await
    }

    async fn save_card(&self, card: &ReviewCard) -> Result<ReviewCard, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;

        let res = sqlx::query(
            r#"
            UPDATE cards SET
              status=?, ease_factor=?, interval_days=?, next_review_at=?, updated_at=?,
              version = version + 1
            WHERE id=? AND version=?
            "#,
        )
        .bind(card.status.as_str())
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(dt_to_str(card.next_review_at))
        .bind(dt_to_str(card.updated_at))
        .bind(card.id.to_string())
        .bind(card.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|_| CoreError::Storage("update card"))?;

        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return match self.card_version(card.id).await? {
                None => Err(CoreError::NotFound("card")),
                Some(_) => Err(CoreError::Conflict("card")),
            };
        }

        // History is append-only: only entries past the stored length are new.
        let stored_len: i64 = sqlx::query("SELECT COUNT(*) AS n FROM review_history WHERE card_id=?")
            .bind(card.id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("read history"))?
            .get("n");
        for (seq, entry) in card
            .review_history
            .iter()
            .enumerate()
            .skip(stored_len.max(0) as usize)
        {
            sqlx::query("INSERT INTO review_history (card_id,seq,reviewed_at,grade) VALUES (?,?,?,?)")
                .bind(card.id.to_string())
                .bind(seq as i64)
                .bind(dt_to_str(entry.reviewed_at))
                .bind(entry.grade.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|_| CoreError::Storage("insert history"))?;
        }

        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))?;

        let mut saved = card.clone();
        saved.version += 1;
        card_at_stored_precision(&mut saved);
        Ok(saved)
    }

    async fn delete_card(&self, user_id: &str, id: CardId) -> Result<(), CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|_| CoreError::Storage("tx"))?;
        // Manual cascade (robust even if PRAGMA foreign_keys is off)
        sqlx::query(
            "DELETE FROM review_history WHERE card_id IN (SELECT id FROM cards WHERE id=? AND user_id=?)",
        )
        .bind(id.to_string())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|_| CoreError::Storage("del history"))?;
        let res = sqlx::query("DELETE FROM cards WHERE id=? AND user_id=?")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|_| CoreError::Storage("del card"))?;
        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(CoreError::NotFound("card"));
        }
        tx.commit()
            .await
            .map_err(|_| CoreError::Storage("tx commit"))
    }

    // ===== Ledgers =====
    async fn get_ledger(&self, user_id: &str, language: &str) -> Result<ActivityLedger, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledgers WHERE user_id=? AND language=?"
        ))
        .bind(user_id)
        .bind(language)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("read ledger"))?;
        row_into_ledger(&row.ok_or(CoreError::NotFound("progress"))?)
    }

    async fn list_ledgers(&self, user_id: &str) -> Result<Vec<ActivityLedger>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledgers WHERE user_id=? ORDER BY language ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("list ledgers"))?;
        rows.iter().map(row_into_ledger).collect()
    }

    async fn save_ledger(&self, ledger: &ActivityLedger) -> Result<ActivityLedger, CoreError> {
        let mut saved = ledger.clone();
        saved.version = ledger.version + 1;
        ledger_at_stored_precision(&mut saved);

        if ledger.version == 0 {
            sqlx::query(&format!(
                "INSERT INTO ledgers ({LEDGER_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?)"
            ))
            .bind(saved.id.to_string())
            .bind(&saved.user_id)
            .bind(&saved.language)
            .bind(i64::from(saved.streak_days))
            .bind(saved.last_activity.map(dt_to_str))
            .bind(saved.total_time_spent as i64)
            .bind(i64::from(saved.vocabulary_learned))
            .bind(i64::from(saved.vocabulary_mastered))
            .bind(i64::from(saved.exercises_done))
            .bind(i64::from(saved.tests_done))
            .bind(dt_to_str(saved.created_at))
            .bind(dt_to_str(saved.updated_at))
            .bind(saved.version as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_or(e, CoreError::Conflict("progress"), "insert ledger"))?;
            return Ok(saved);
        }

        let res = sqlx::query(
            r#"
            UPDATE ledgers SET
              streak_days=?, last_activity=?, total_time_spent=?,
              vocabulary_learned=?, vocabulary_mastered=?, exercises_done=?, tests_done=?,
              updated_at=?, version=?
            WHERE user_id=? AND language=? AND version=?
            "#,
        )
        .bind(i64::from(saved.streak_days))
        .bind(saved.last_activity.map(dt_to_str))
        .bind(saved.total_time_spent as i64)
        .bind(i64::from(saved.vocabulary_learned))
        .bind(i64::from(saved.vocabulary_mastered))
        .bind(i64::from(saved.exercises_done))
        .bind(i64::from(saved.tests_done))
        .bind(dt_to_str(saved.updated_at))
        .bind(saved.version as i64)
        .bind(&saved.user_id)
        .bind(&saved.language)
        .bind(ledger.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|_| CoreError::Storage("update ledger"))?;

        if res.rows_affected() == 0 {
            return match self.get_ledger(&ledger.user_id, &ledger.language).await {
                Ok(_) => Err(CoreError::Conflict("progress")),
                Err(e) => Err(e),
            };
        }
        Ok(saved)
    }
}

// ===== Helpers =====
fn unique_or(e: sqlx::Error, on_unique: CoreError, storage: &'static str) -> CoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_unique,
        _ => {
            tracing::error!(error = %e, "sqlite write failed");
            CoreError::Storage(storage)
        }
    }
}

fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

/// Fixed-width UTC text so that string order in SQL is time order.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drops what `dt_to_str` cannot represent, so returned records equal what
/// a later read produces.
fn at_stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

fn card_at_stored_precision(card: &mut ReviewCard) {
    card.next_review_at = at_stored_precision(card.next_review_at);
    card.created_at = at_stored_precision(card.created_at);
    card.updated_at = at_stored_precision(card.updated_at);
    for e in &mut card.review_history {
        e.reviewed_at = at_stored_precision(e.reviewed_at);
    }
}

fn ledger_at_stored_precision(ledger: &mut ActivityLedger) {
    ledger.last_activity = ledger.last_activity.map(at_stored_precision);
    ledger.created_at = at_stored_precision(ledger.created_at);
    ledger.updated_at = at_stored_precision(ledger.updated_at);
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_into_entry(row: &SqliteRow) -> Result<ReviewEntry, CoreError> {
    Ok(ReviewEntry {
        reviewed_at: dt_from_str(row.get::<String, _>("reviewed_at"))?,
        grade: row
            .get::<String, _>("grade")
            .parse::<Grade>()
            .map_err(|_| CoreError::Invalid("grade"))?,
    })
}

fn row_into_card(row: &SqliteRow, review_history: Vec<ReviewEntry>) -> Result<ReviewCard, CoreError> {
    Ok(ReviewCard {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        user_id: row.get::<String, _>("user_id"),
        vocabulary_id: row.get::<String, _>("vocabulary_id"),
        status: row.get::<String, _>("status").parse::<CardStatus>()?,
        ease_factor: row.get::<f64, _>("ease_factor"),
        interval_days: row.get::<i64, _>("interval_days") as u32,
        next_review_at: dt_from_str(row.get::<String, _>("next_review_at"))?,
        review_history,
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
        updated_at: dt_from_str(row.get::<String, _>("updated_at"))?,
        version: row.get::<i64, _>("version") as u64,
    })
}

fn row_into_ledger(row: &SqliteRow) -> Result<ActivityLedger, CoreError> {
    Ok(ActivityLedger {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        user_id: row.get::<String, _>("user_id"),
        language: row.get::<String, _>("language"),
        streak_days: row.get::<i64, _>("streak_days") as u32,
        last_activity: row
            .get::<Option<String>, _>("last_activity")
            .map(dt_from_str)
            .transpose()?,
        total_time_spent: row.get::<i64, _>("total_time_spent") as u64,
        vocabulary_learned: row.get::<i64, _>("vocabulary_learned") as u32,
        vocabulary_mastered: row.get::<i64, _>("vocabulary_mastered") as u32,
        exercises_done: row.get::<i64, _>("exercises_done") as u32,
        tests_done: row.get::<i64, _>("tests_done") as u32,
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
        updated_at: dt_from_str(row.get::<String, _>("updated_at"))?,
        version: row.get::<i64, _>("version") as u64,
    })
}
