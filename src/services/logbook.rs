use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::BlobStore;
use crate::db::Database;
use crate::error::AppError;
use crate::export::image::{data_url_kind, decode_base64_payload, is_base64_data_url};
use crate::models::{LogbookEntry, LogbookEntryIn, LogbookEntryOut, User};

const ENTRY_COLUMNS: &str = "id, user_id, tanggal, jam_mulai, jam_selesai, \
     judul_kegiatan, rincian_kegiatan, dokumen_pendukung";

const ENTRY_ORDER: &str = "ORDER BY tanggal ASC, jam_mulai ASC, id ASC";

#[derive(Clone)]
pub struct LogbookService {
    db: Database,
    storage: Option<Arc<dyn BlobStore>>,
}

impl LogbookService {
    pub fn new(db: Database, storage: Option<Arc<dyn BlobStore>>) -> Self {
        Self { db, storage }
    }

    /// Entries visible to `user`: everything for admins, own entries otherwise.
    pub async fn list(&self, user: &User) -> Result<Vec<LogbookEntryOut>, AppError> {
        let entries = if user.is_admin {
            self.fetch_all().await?
        } else {
            self.list_own(user).await?
        };
        Ok(entries.into_iter().map(LogbookEntryOut::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<LogbookEntryOut>, AppError> {
        let entries = self.fetch_all().await?;
        Ok(entries.into_iter().map(LogbookEntryOut::from).collect())
    }

    /// The user's own entries regardless of role, in document order.
    pub async fn list_own(&self, user: &User) -> Result<Vec<LogbookEntry>, AppError> {
        let entries = sqlx::query_as::<_, LogbookEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries WHERE user_id = ? {ENTRY_ORDER}"
        ))
        .bind(user.id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    pub async fn create(
        &self,
        user: &User,
        entry: LogbookEntryIn,
    ) -> Result<LogbookEntryOut, AppError> {
        let times = EntryTimes::parse(&entry)?;

        let dokumen = match non_empty(entry.dokumen_pendukung) {
            Some(value) => match self.upload_image(user.id, &value).await {
                Some(url) => Some(url),
                None => Some(value),
            },
            None => None,
        };

        let created = sqlx::query_as::<_, LogbookEntry>(&format!(
            "INSERT INTO logbook_entries
                (user_id, tanggal, jam_mulai, jam_selesai, judul_kegiatan, rincian_kegiatan, dokumen_pendukung)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(user.id)
        .bind(entry.tanggal)
        .bind(times.start)
        .bind(times.end)
        .bind(&entry.judul_kegiatan)
        .bind(&entry.rincian_kegiatan)
        .bind(dokumen)
        .fetch_one(self.db.pool())
        .await?;

        info!("User {} created logbook entry {}", user.id, created.id);
        Ok(created.into())
    }

    pub async fn update(
        &self,
        user: &User,
        entry_id: i64,
        entry: LogbookEntryIn,
    ) -> Result<LogbookEntryOut, AppError> {
        let existing = self.find_accessible(user, entry_id).await?;
        let times = EntryTimes::parse(&entry)?;

        let dokumen = match non_empty(entry.dokumen_pendukung) {
            Some(value) if is_base64_data_url(&value) && self.storage.is_some() => {
                // A failed upload leaves the previous attachment in place.
                self.upload_image(user.id, &value)
                    .await
                    .or(existing.dokumen_pendukung)
            }
            other => other,
        };

        let updated = sqlx::query_as::<_, LogbookEntry>(&format!(
            "UPDATE logbook_entries
             SET tanggal = ?, jam_mulai = ?, jam_selesai = ?, judul_kegiatan = ?,
                 rincian_kegiatan = ?, dokumen_pendukung = ?
             WHERE id = ?
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(entry.tanggal)
        .bind(times.start)
        .bind(times.end)
        .bind(&entry.judul_kegiatan)
        .bind(&entry.rincian_kegiatan)
        .bind(dokumen)
        .bind(existing.id)
        .fetch_one(self.db.pool())
        .await?;

        info!("User {} updated logbook entry {}", user.id, updated.id);
        Ok(updated.into())
    }

    pub async fn delete(&self, user: &User, entry_id: i64) -> Result<(), AppError> {
        let existing = self.find_accessible(user, entry_id).await?;
        sqlx::query("DELETE FROM logbook_entries WHERE id = ?")
            .bind(existing.id)
            .execute(self.db.pool())
            .await?;
        info!("User {} deleted logbook entry {}", user.id, existing.id);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<LogbookEntry>, AppError> {
        let entries = sqlx::query_as::<_, LogbookEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries {ENTRY_ORDER}"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    /// Foreign entries look exactly like missing ones to non-admins.
    async fn find_accessible(&self, user: &User, entry_id: i64) -> Result<LogbookEntry, AppError> {
        let entry = sqlx::query_as::<_, LogbookEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries WHERE id = ?"
        ))
        .bind(entry_id)
        .fetch_optional(self.db.pool())
        .await?;

        match entry {
            Some(entry) if user.is_admin || entry.user_id == user.id => Ok(entry),
            _ => Err(AppError::NotFound("Entry not found".to_string())),
        }
    }

    /// Upload a base64 data URL to the object store; `None` when there is no
    /// store, the value is not a data URL, or the upload failed.
    async fn upload_image(&self, user_id: i64, value: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;
        if !is_base64_data_url(value) {
            return None;
        }

        let bytes = match decode_base64_payload(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Not uploading supporting image for user {}: {}", user_id, e);
                return None;
            }
        };
        let (ext, content_type) = data_url_kind(value);
        let key = format!("user-{}/{}.{}", user_id, Uuid::new_v4().simple(), ext);

        match storage.put(&key, content_type, bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Supporting image upload failed for user {}: {}", user_id, e);
                None
            }
        }
    }
}

struct EntryTimes {
    start: NaiveTime,
    end: Option<NaiveTime>,
}

impl EntryTimes {
    fn parse(entry: &LogbookEntryIn) -> Result<Self, AppError> {
        let start = parse_time(Some(&entry.jam_mulai))?.ok_or_else(invalid_time)?;
        let end = parse_time(entry.jam_selesai.as_deref())?;
        Ok(Self { start, end })
    }
}

/// Parse `HH:MM`; blank input means "not given".
fn parse_time(value: Option<&str>) -> Result<Option<NaiveTime>, AppError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let (hh, mm) = value.split_once(':').ok_or_else(invalid_time)?;
    let hour: u32 = hh.trim().parse().map_err(|_| invalid_time())?;
    let minute: u32 = mm.trim().parse().map_err(|_| invalid_time())?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .map(Some)
        .ok_or_else(invalid_time)
}

fn invalid_time() -> AppError {
    AppError::BadRequest("Invalid time format, expected HH:MM".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::image::tests::png_data_url;
    use crate::models::UserCreate;
    use crate::services::memory::{FailingStore, MemoryStore};
    use crate::services::UserService;
    use chrono::NaiveDate;

    struct Fixture {
        logbook: LogbookService,
        alice: User,
        bob: User,
        admin: User,
    }

    async fn fixture(storage: Option<Arc<dyn BlobStore>>) -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let users = UserService::new(db.clone(), true);
        let mut made = Vec::new();
        for (email, is_admin) in [("alice@x.id", false), ("bob@x.id", false), ("admin@x.id", true)] {
            let out = users
                .register(UserCreate {
                    email: email.to_string(),
                    password: "pw".to_string(),
                    is_admin: Some(is_admin),
                })
                .await
                .unwrap();
            made.push(users.find_by_id(out.id).await.unwrap().unwrap());
        }
        let admin = made.pop().unwrap();
        let bob = made.pop().unwrap();
        let alice = made.pop().unwrap();
        Fixture {
            logbook: LogbookService::new(db, storage),
            alice,
            bob,
            admin,
        }
    }

    fn entry_in(day: u32, start: &str, end: Option<&str>) -> LogbookEntryIn {
        LogbookEntryIn {
            tanggal: NaiveDate::from_ymd_opt(2024, 12, day).unwrap(),
            jam_mulai: start.to_string(),
            jam_selesai: end.map(str::to_string),
            judul_kegiatan: format!("Kegiatan {day} {start}"),
            rincian_kegiatan: "Rincian".to_string(),
            dokumen_pendukung: None,
        }
    }

    #[test]
    fn parse_time_variants() {
        assert_eq!(
            parse_time(Some("9:05")).unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0)
        );
        assert_eq!(parse_time(Some("  ")).unwrap(), None);
        assert_eq!(parse_time(None).unwrap(), None);
        assert!(parse_time(Some("24:00")).is_err());
        assert!(parse_time(Some("08.30")).is_err());
        assert!(parse_time(Some("08:30:00")).is_err());
    }

    #[tokio::test]
    async fn entries_are_scoped_and_ordered() {
        let f = fixture(None).await;
        f.logbook.create(&f.alice, entry_in(6, "08:00", None)).await.unwrap();
        f.logbook
            .create(&f.alice, entry_in(5, "13:00", Some("15:00")))
            .await
            .unwrap();
        f.logbook.create(&f.alice, entry_in(5, "09:00", None)).await.unwrap();
        f.logbook.create(&f.bob, entry_in(1, "07:00", None)).await.unwrap();

        let alice = f.logbook.list(&f.alice).await.unwrap();
        let titles: Vec<_> = alice.iter().map(|e| e.judul_kegiatan.as_str()).collect();
        assert_eq!(titles, ["Kegiatan 5 09:00", "Kegiatan 5 13:00", "Kegiatan 6 08:00"]);
        assert_eq!(alice[1].jam_selesai.as_deref(), Some("15:00"));

        assert_eq!(f.logbook.list(&f.bob).await.unwrap().len(), 1);
        assert_eq!(f.logbook.list(&f.admin).await.unwrap().len(), 4);
        assert_eq!(f.logbook.list_all().await.unwrap().len(), 4);
        assert!(f.logbook.list_own(&f.admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_start_time_is_rejected() {
        let f = fixture(None).await;
        for bad in ["", "jam 8", "8:75"] {
            let err = f
                .logbook
                .create(&f.alice, entry_in(5, bad, None))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Invalid time format, expected HH:MM");
        }
    }

    #[tokio::test]
    async fn foreign_entries_are_not_found() {
        let f = fixture(None).await;
        let created = f.logbook.create(&f.alice, entry_in(5, "08:00", None)).await.unwrap();

        let err = f
            .logbook
            .update(&f.bob, created.id, entry_in(7, "10:00", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            f.logbook.delete(&f.bob, created.id).await,
            Err(AppError::NotFound(_))
        ));

        let updated = f
            .logbook
            .update(&f.admin, created.id, entry_in(7, "10:00", Some("11:30")))
            .await
            .unwrap();
        assert_eq!(updated.user_id, f.alice.id);
        assert_eq!(updated.jam_mulai, "10:00");

        f.logbook.delete(&f.alice, created.id).await.unwrap();
        assert!(f.logbook.list(&f.alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_urls_are_uploaded_when_storage_is_configured() {
        let store = Arc::new(MemoryStore::default());
        let shared: Arc<dyn BlobStore> = store.clone();
        let f = fixture(Some(shared)).await;

        let mut input = entry_in(5, "08:00", None);
        input.dokumen_pendukung = Some(png_data_url(2, 2));
        let created = f.logbook.create(&f.alice, input).await.unwrap();

        let url = created.dokumen_pendukung.unwrap();
        let key = url.strip_prefix("memory://").unwrap();
        assert!(key.starts_with(&format!("user-{}/", f.alice.id)));
        assert!(key.ends_with(".png"));
        assert_eq!(store.content_type(key).as_deref(), Some("image/png"));
        assert_eq!(store.keys(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn failed_upload_on_create_keeps_data_url() {
        let store: Arc<dyn BlobStore> = Arc::new(FailingStore);
        let f = fixture(Some(store)).await;

        let data_url = png_data_url(2, 2);
        let mut input = entry_in(5, "08:00", None);
        input.dokumen_pendukung = Some(data_url.clone());
        let created = f.logbook.create(&f.alice, input).await.unwrap();
        assert_eq!(created.dokumen_pendukung, Some(data_url));
    }

    #[tokio::test]
    async fn unavailable_storage_on_update_keeps_previous_value() {
        let store: Arc<dyn BlobStore> = Arc::new(FailingStore);
        let f = fixture(Some(store)).await;

        let mut input = entry_in(5, "08:00", None);
        input.dokumen_pendukung = Some("https://cdn.example/old.png".to_string());
        let created = f.logbook.create(&f.alice, input).await.unwrap();

        let mut change = entry_in(5, "08:00", None);
        change.dokumen_pendukung = Some(png_data_url(2, 2));
        let updated = f.logbook.update(&f.alice, created.id, change).await.unwrap();
        assert_eq!(
            updated.dokumen_pendukung.as_deref(),
            Some("https://cdn.example/old.png")
        );
    }

    #[tokio::test]
    async fn failed_upload_on_update_keeps_previous_value() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::default());
        let f = fixture(Some(store)).await;

        let mut input = entry_in(5, "08:00", None);
        input.dokumen_pendukung = Some("https://cdn.example/old.png".to_string());
        let created = f.logbook.create(&f.alice, input).await.unwrap();

        let mut change = entry_in(5, "08:00", None);
        change.dokumen_pendukung = Some("data:image/png;base64,@@@".to_string());
        let updated = f.logbook.update(&f.alice, created.id, change).await.unwrap();
        assert_eq!(
            updated.dokumen_pendukung.as_deref(),
            Some("https://cdn.example/old.png")
        );
    }

    #[tokio::test]
    async fn without_storage_values_are_kept_verbatim() {
        let f = fixture(None).await;
        let data_url = png_data_url(1, 1);
        let mut input = entry_in(5, "08:00", None);
        input.dokumen_pendukung = Some(data_url.clone());
        let created = f.logbook.create(&f.alice, input).await.unwrap();
        assert_eq!(created.dokumen_pendukung, Some(data_url));
    }
}
