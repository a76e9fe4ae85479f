use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::models::GenerateEntry;

const BULAN: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// `2024-12-05` becomes `05 Desember 2024`; anything unparsable is returned as is.
pub fn format_tanggal(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => format!(
            "{:02} {} {}",
            date.day(),
            BULAN[date.month0() as usize],
            date.year()
        ),
        Err(_) => raw.to_string(),
    }
}

/// Order by date then start time; unparsable parts sort after everything else.
pub fn sort_entries(entries: &mut [GenerateEntry]) {
    entries.sort_by_key(sort_key);
}

fn sort_key(entry: &GenerateEntry) -> (NaiveDate, NaiveTime) {
    let date =
        NaiveDate::parse_from_str(entry.tanggal.trim(), "%Y-%m-%d").unwrap_or(NaiveDate::MAX);
    let start = entry.jam.split(" - ").next().unwrap_or_default().trim();
    let time = NaiveTime::parse_from_str(start, "%H:%M").unwrap_or_else(|_| last_time());
    (date, time)
}

fn last_time() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tanggal: &str, jam: &str) -> GenerateEntry {
        GenerateEntry {
            id: format!("{tanggal} {jam}"),
            tanggal: tanggal.to_string(),
            jam: jam.to_string(),
            judul_kegiatan: String::new(),
            rincian_kegiatan: String::new(),
            dokumen_pendukung: None,
        }
    }

    #[test]
    fn formats_indonesian_months() {
        assert_eq!(format_tanggal("2024-12-05"), "05 Desember 2024");
        assert_eq!(format_tanggal("2025-01-31"), "31 Januari 2025");
        assert_eq!(format_tanggal("2025-08-17"), "17 Agustus 2025");
        assert_eq!(format_tanggal("2025-05-01"), "01 Mei 2025");
    }

    #[test]
    fn keeps_unparsable_dates_verbatim() {
        assert_eq!(format_tanggal("12 Desember 2024"), "12 Desember 2024");
        assert_eq!(format_tanggal("2024-13-01"), "2024-13-01");
    }

    #[test]
    fn sorts_by_date_then_start_time() {
        let mut entries = vec![
            entry("2024-12-06", "08:00"),
            entry("2024-12-05", "13:00 - 15:00"),
            entry("2024-12-05", "09:30 - 11:00"),
        ];
        sort_entries(&mut entries);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            ["2024-12-05 09:30 - 11:00", "2024-12-05 13:00 - 15:00", "2024-12-06 08:00"]
        );
    }

    #[test]
    fn unparsable_values_sort_last() {
        let mut entries = vec![
            entry("kemarin", "08:00"),
            entry("2024-12-05", "pagi"),
            entry("besok", "07:00"),
            entry("2024-12-05", "10:00"),
        ];
        sort_entries(&mut entries);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            ["2024-12-05 10:00", "2024-12-05 pagi", "besok 07:00", "kemarin 08:00"]
        );
    }
}
