use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingua_core::filters::{select_due, sort_by_due};
use lingua_core::{bump_version, repo::Repository, ActivityLedger, CardId, CoreError, ReviewCard, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::task;

pub mod paths;

const FILE_VERSION: u32 = 1;

type LedgerKey = (UserId, String);

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cards: Vec<ReviewCard>,
    ledgers: Vec<ActivityLedger>,
}

#[derive(Clone)]
struct State {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cards: HashMap<CardId, ReviewCard>,
    ledgers: HashMap<LedgerKey, ActivityLedger>,
}

impl State {
    fn new_empty() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            cards: HashMap::new(),
            ledgers: HashMap::new(),
        }
    }

    fn to_image(&self) -> FileImage {
        let mut cards: Vec<ReviewCard> = self.cards.values().cloned().collect();
        cards.sort_by_key(|c| c.created_at);
        let mut ledgers: Vec<ActivityLedger> = self.ledgers.values().cloned().collect();
        ledgers.sort_by(|a, b| (&a.user_id, &a.language).cmp(&(&b.user_id, &b.language)));
        FileImage {
            version: FILE_VERSION,
            created_at: self.created_at,
            updated_at: self.updated_at,
            cards,
            ledgers,
        }
    }

    fn from_image(img: FileImage) -> Self {
        let cards = img.cards.into_iter().map(|c| (c.id, c)).collect();
        let ledgers = img
            .ledgers
            .into_iter()
            .map(|l| ((l.user_id.clone(), l.language.clone()), l))
            .collect();
        Self {
            created_at: img.created_at,
            updated_at: img.updated_at,
            cards,
            ledgers,
        }
    }
}

/// Whole-store JSON file. Every mutation rewrites the file atomically and
/// drops a timestamped copy into the backups directory.
///
/// Mutations are serialized by `write_gate`, held from building the next
/// state until the file is persisted. Memory only takes the new state once it
/// is on disk, so readers never see an unwritten change and file writes land
/// in commit order.
pub struct JsonStore {
    path: PathBuf,
    backups_dir: PathBuf,
    max_backups: usize,
    state: RwLock<State>,
    write_gate: Mutex<()>,
}

impl JsonStore {
    pub async fn open_default() -> Result<Self, CoreError> {
        let p = paths::StorePaths::from_env_or_default();
        Self::open_with(p.file, p.backups, 10).await
    }

    pub async fn open_with(
        path: PathBuf,
        backups_dir: PathBuf,
        max_backups: usize,
    ) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        ensure_dir(&backups_dir)?;
        let max_backups = max_backups.max(1);
        let state = load_or_init(&path, &backups_dir, max_backups).await?;
        tracing::info!(path = %path.display(), cards = state.cards.len(), ledgers = state.ledgers.len(), "json store opened");
        Ok(Self {
            path,
            backups_dir,
            max_backups,
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        })
    }

    /// Applies `change` to a copy of the current state, writes the copy and
    /// then publishes it. An error from `change` or from the write leaves
    /// both memory and disk untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut State) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let _gate = self.write_gate.lock().await;

        let mut next = self.state.read().clone();
        let out = change(&mut next)?;
        next.updated_at = Utc::now();
        let image = next.to_image();

        let path = self.path.clone();
        let backups = self.backups_dir.clone();
        let keep = self.max_backups;
        task::spawn_blocking(move || write_with_backup(&path, &backups, keep, &image))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|e| {
                tracing::error!(error = %e, "json store write failed");
                CoreError::Storage("io")
            })?;

        *self.state.write() = next;
        Ok(out)
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(path).map_err(|_| CoreError::Storage("io"))
}

async fn load_or_init(path: &Path, backups_dir: &Path, keep: usize) -> Result<State, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        let img: FileImage = task::spawn_blocking(move || {
            let mut f = fs::File::open(&p)?;
            let mut buf = String::new();
            f.read_to_string(&mut buf)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))
        .and_then(|r| r.map_err(|_| CoreError::Storage("corrupt store file")))?;
        if img.version != FILE_VERSION {
            return Err(CoreError::Storage("unsupported store file version"));
        }
        Ok(State::from_image(img))
    } else {
        let st = State::new_empty();
        let img = st.to_image();
        write_with_backup(path, backups_dir, keep, &img).map_err(|_| CoreError::Storage("io"))?;
        Ok(st)
    }
}

fn write_with_backup(
    path: &Path,
    backups_dir: &Path,
    max_backups: usize,
    img: &FileImage,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(backups_dir)?;

    let json = serde_json::to_vec_pretty(img)?;
    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Backup rotation
    let ts = Utc::now().format("%Y%m%d-%H%M%S%.3f");
    let backup_path = backups_dir.join(format!("lingua-{ts}.json"));
    let mut btmp = NamedTempFile::new_in(backups_dir)?;
    btmp.write_all(&json)?;
    btmp.flush()?;
    btmp.persist(&backup_path).map_err(|e| e.error)?;

    rotate_backups(backups_dir, max_backups)?;

    Ok(())
}

fn rotate_backups(dir: &Path, keep: usize) -> Result<(), std::io::Error> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    // Names embed the timestamp, so lexical order is age order.
    entries.sort_by_key(|e| e.file_name());
    if entries.len() > keep {
        for e in &entries[0..entries.len() - keep] {
            let _ = fs::remove_file(e.path());
        }
    }
    Ok(())
}

#[async_trait]
impl Repository for JsonStore {
    async fn create_card(
        &self,
        user_id: &str,
        vocabulary_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewCard, CoreError> {
        let mut card = ReviewCard::new(user_id, vocabulary_id, now);
        card.version = 1;
        self.commit(move |s| {
            if s
                .cards
                .values()
                .any(|c| c.user_id == card.user_id && c.vocabulary_id == card.vocabulary_id)
            {
                return Err(CoreError::AlreadyExists("flashcard"));
            }
            s.cards.insert(card.id, card.clone());
            Ok(card)
        })
        .await
    }

    async fn get_card(&self, user_id: &str, id: CardId) -> Result<ReviewCard, CoreError> {
        let s = self.state.read();
        s.cards
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, user_id: &str) -> Result<Vec<ReviewCard>, CoreError> {
        let s = self.state.read();
        let mut v: Vec<ReviewCard> = s
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        sort_by_due(&mut v);
        Ok(v)
    }

    async fn due_cards(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReviewCard>, CoreError> {
        let mine = self.list_cards(user_id).await?;
        Ok(select_due(&mine, now, limit))
    }

    async fn save_card(&self, card: &ReviewCard) -> Result<ReviewCard, CoreError> {
        self.commit(|s| {
            let Some(stored) = s.cards.get(&card.id) else {
                return Err(CoreError::NotFound("card"));
            };
            let mut saved = card.clone();
            saved.version = bump_version(Some(stored.version), card.version, "card")?;
            s.cards.insert(saved.id, saved.clone());
            Ok(saved)
        })
        .await
    }

    async fn delete_card(&self, user_id: &str, id: CardId) -> Result<(), CoreError> {
        self.commit(|s| match s.cards.get(&id) {
            Some(c) if c.user_id == user_id => {
                s.cards.remove(&id);
                Ok(())
            }
            _ => Err(CoreError::NotFound("card")),
        })
        .await
    }

    async fn get_ledger(&self, user_id: &str, language: &str) -> Result<ActivityLedger, CoreError> {
        let s = self.state.read();
        s.ledgers
            .get(&(user_id.to_string(), language.to_string()))
            .cloned()
            .ok_or(CoreError::NotFound("progress"))
    }

    async fn list_ledgers(&self, user_id: &str) -> Result<Vec<ActivityLedger>, CoreError> {
        let s = self.state.read();
        let mut v: Vec<ActivityLedger> = s
            .ledgers
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(v)
    }

    async fn save_ledger(&self, ledger: &ActivityLedger) -> Result<ActivityLedger, CoreError> {
        self.commit(|s| {
            let key: LedgerKey = (ledger.user_id.clone(), ledger.language.clone());
            let stored = s.ledgers.get(&key).map(|l| l.version);
            let mut saved = ledger.clone();
            saved.version = bump_version(stored, ledger.version, "progress")?;
            s.ledgers.insert(key, saved.clone());
            Ok(saved)
        })
        .await
    }
}
