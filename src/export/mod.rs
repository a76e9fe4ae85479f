// Word export of logbook entries: rows are numbered, dated and given their
// resolved attachment, then rendered into a .docx table

mod date;
mod docx;
pub mod image;

use chrono::NaiveDateTime;
use tracing::warn;

pub use date::{format_tanggal, sort_entries};
pub use docx::{render, DOCX_MIME, IMAGE_PLACEHOLDER};

use crate::models::GenerateEntry;
use self::image::{ImageResolver, PreparedImage};

/// One table row of the exported document.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub number: usize,
    pub tanggal: String,
    pub jam: String,
    pub judul: String,
    pub rincian: String,
    pub dokumen: Option<Attachment>,
}

#[derive(Debug, Clone)]
pub enum Attachment {
    Image(PreparedImage),
    /// Reference could not be fetched or decoded; rendered as placeholder text.
    Unavailable,
}

/// Build rows in the given order. Attachment failures never abort the export.
pub async fn prepare_rows(
    entries: Vec<GenerateEntry>,
    resolver: &ImageResolver<'_>,
) -> Vec<ExportRow> {
    let mut rows = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let dokumen = match entry.dokumen_pendukung.as_deref() {
            Some(value) if !value.is_empty() => Some(match resolver.resolve(value).await {
                Ok(img) => Attachment::Image(img),
                Err(e) => {
                    warn!("Error adding image for entry '{}': {}", entry.id, e);
                    Attachment::Unavailable
                }
            }),
            _ => None,
        };

        rows.push(ExportRow {
            number: idx + 1,
            tanggal: format_tanggal(&entry.tanggal),
            jam: entry.jam,
            judul: entry.judul_kegiatan,
            rincian: entry.rincian_kegiatan,
            dokumen,
        });
    }
    rows
}

pub fn filename(now: NaiveDateTime) -> String {
    format!("logbook_{}.docx", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::image::tests::png_data_url;
    use super::*;
    use crate::services::fake;
    use chrono::NaiveDate;

    fn entry(tanggal: &str, dokumen: Option<&str>) -> GenerateEntry {
        GenerateEntry {
            id: "x".to_string(),
            tanggal: tanggal.to_string(),
            jam: "10:00 - 12:00".to_string(),
            judul_kegiatan: "Pembekalan".to_string(),
            rincian_kegiatan: "Materi".to_string(),
            dokumen_pendukung: dokumen.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn rows_are_numbered_and_localised() {
        let http = reqwest::Client::new();
        let resolver = ImageResolver::new(&http, None);
        let good = png_data_url(4, 2);
        let rows = prepare_rows(
            vec![
                entry("2024-12-12", None),
                entry("2024-12-13", Some(&good)),
                entry("2024-12-14", Some("data:image/png;base64,bm90IGFuIGltYWdl")),
                entry("2024-12-15", Some("   ")),
                entry("2024-12-16", Some("")),
            ],
            &resolver,
        )
        .await;

        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows.iter().map(|r| r.number).collect::<Vec<_>>(),
            [1, 2, 3, 4, 5]
        );
        assert_eq!(rows[0].tanggal, "12 Desember 2024");
        assert!(rows[0].dokumen.is_none());
        assert!(matches!(rows[1].dokumen, Some(Attachment::Image(_))));
        assert!(matches!(rows[2].dokumen, Some(Attachment::Unavailable)));
        assert!(matches!(rows[3].dokumen, Some(Attachment::Unavailable)));
        assert!(rows[4].dokumen.is_none());
    }

    #[tokio::test]
    async fn remote_images_are_downloaded() {
        let base = fake::spawn(fake::FakeStorage::default()).await;
        let http = fake::client();
        let resolver = ImageResolver::new(&http, None);
        let found = format!("{base}/img/photo.png");
        let missing = format!("{base}/img/missing.png");

        let rows = prepare_rows(
            vec![
                entry("2024-12-12", Some(&found)),
                entry("2024-12-13", Some(&missing)),
            ],
            &resolver,
        )
        .await;

        match &rows[0].dokumen {
            Some(Attachment::Image(img)) => assert_eq!((img.width, img.height), (6, 3)),
            other => panic!("expected image, got {other:?}"),
        }
        assert!(matches!(rows[1].dokumen, Some(Attachment::Unavailable)));
    }

    #[test]
    fn filename_uses_timestamp() {
        let now = NaiveDate::from_ymd_opt(2024, 12, 5)
            .unwrap()
            .and_hms_opt(14, 3, 9)
            .unwrap();
        assert_eq!(filename(now), "logbook_20241205_140309.docx");
    }
}
