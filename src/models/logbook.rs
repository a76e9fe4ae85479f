use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, FromRow)]
pub struct LogbookEntry {
    pub id: i64,
    pub user_id: i64,
    pub tanggal: NaiveDate,
    pub jam_mulai: NaiveTime,
    pub jam_selesai: Option<NaiveTime>,
    pub judul_kegiatan: String,
    pub rincian_kegiatan: String,
    pub dokumen_pendukung: Option<String>,
}

impl LogbookEntry {
    /// `HH:MM` or `HH:MM - HH:MM` when an end time is recorded.
    pub fn jam_range(&self) -> String {
        let start = self.jam_mulai.format(TIME_FORMAT).to_string();
        match self.jam_selesai {
            Some(end) => format!("{} - {}", start, end.format(TIME_FORMAT)),
            None => start,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogbookEntryIn {
    pub tanggal: NaiveDate,
    pub jam_mulai: String,
    #[serde(default)]
    pub jam_selesai: Option<String>,
    pub judul_kegiatan: String,
    pub rincian_kegiatan: String,
    #[serde(default)]
    pub dokumen_pendukung: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogbookEntryOut {
    pub id: i64,
    pub user_id: i64,
    pub tanggal: NaiveDate,
    pub jam_mulai: String,
    pub jam_selesai: Option<String>,
    pub judul_kegiatan: String,
    pub rincian_kegiatan: String,
    pub dokumen_pendukung: Option<String>,
}

impl From<LogbookEntry> for LogbookEntryOut {
    fn from(entry: LogbookEntry) -> Self {
        LogbookEntryOut {
            id: entry.id,
            user_id: entry.user_id,
            tanggal: entry.tanggal,
            jam_mulai: entry.jam_mulai.format(TIME_FORMAT).to_string(),
            jam_selesai: entry
                .jam_selesai
                .map(|t| t.format(TIME_FORMAT).to_string()),
            judul_kegiatan: entry.judul_kegiatan,
            rincian_kegiatan: entry.rincian_kegiatan,
            dokumen_pendukung: entry.dokumen_pendukung,
        }
    }
}

/// Free-form entry accepted by the document generator; nothing is validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateEntry {
    #[serde(default)]
    pub id: String,
    pub tanggal: String,
    pub jam: String,
    pub judul_kegiatan: String,
    pub rincian_kegiatan: String,
    #[serde(default)]
    pub dokumen_pendukung: Option<String>,
}

impl From<LogbookEntry> for GenerateEntry {
    fn from(entry: LogbookEntry) -> Self {
        GenerateEntry {
            id: entry.id.to_string(),
            tanggal: entry.tanggal.format("%Y-%m-%d").to_string(),
            jam: entry.jam_range(),
            judul_kegiatan: entry.judul_kegiatan,
            rincian_kegiatan: entry.rincian_kegiatan,
            dokumen_pendukung: entry.dokumen_pendukung,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub entries: Vec<GenerateEntry>,
}
