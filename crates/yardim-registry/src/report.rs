//! CSV exports of registrations and duplicate attempts.

use crate::error::ReportError;
use crate::types::{DuplicateAttemptDetail, RegistrationDetail};
use chrono::{DateTime, FixedOffset, Utc};

/// Spreadsheet applications need the byte-order mark to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Turkey has used a fixed UTC+3 offset since 2016.
const REPORT_UTC_OFFSET_SECS: i32 = 3 * 3600;

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

const MISSING: &str = "-";

pub const REGISTRATION_HEADERS: [&str; 8] = [
    "TC Kimlik No",
    "Ad Soyad",
    "Adres",
    "Telefon",
    "Mahalle",
    "Kaydeden",
    "Kayıt Tarihi",
    "Açıklama",
];

pub const DUPLICATE_ATTEMPT_HEADERS: [&str; 7] = [
    "TC Kimlik No",
    "Ad Soyad",
    "Mahalle",
    "Deneme Yapan",
    "Hata",
    "Tarih",
    "Mevcut Mahalle",
];

/// Format a timestamp in local (Turkish) time.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(REPORT_UTC_OFFSET_SECS) {
        Some(offset) => ts.with_timezone(&offset).format(DATE_FORMAT).to_string(),
        None => ts.format(DATE_FORMAT).to_string(),
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(MISSING)
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::Writer::from_writer(UTF8_BOM.to_vec())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ReportError> {
    writer
        .into_inner()
        .map_err(|e| ReportError::Buffer(e.to_string()))
}

/// Registration list export.
pub fn registrations_csv(records: &[RegistrationDetail]) -> Result<Vec<u8>, ReportError> {
    let mut w = writer();
    w.write_record(REGISTRATION_HEADERS)?;
    for detail in records {
        let record = &detail.record;
        let full_name = detail.full_name();
        let created = format_timestamp(record.created_at);
        w.write_record([
            record.tc_kimlik_no.as_str(),
            full_name.as_str(),
            record.address.as_str(),
            or_missing(record.phone.as_deref()),
            detail.neighborhood_name.as_str(),
            detail.registered_by_name.as_str(),
            created.as_str(),
            or_missing(record.note.as_deref()),
        ])?;
    }
    finish(w)
}

/// Duplicate attempt export.
pub fn duplicate_attempts_csv(attempts: &[DuplicateAttemptDetail]) -> Result<Vec<u8>, ReportError> {
    let mut w = writer();
    w.write_record(DUPLICATE_ATTEMPT_HEADERS)?;
    for detail in attempts {
        let full_name = detail.full_name();
        let created = format_timestamp(detail.attempt.created_at);
        w.write_record([
            detail.attempt.tc_kimlik_no.as_str(),
            full_name.as_str(),
            detail.neighborhood_name.as_str(),
            detail.attempted_by_name.as_str(),
            detail.attempt.reason.as_str(),
            created.as_str(),
            or_missing(detail.existing_neighborhood_name.as_deref()),
        ])?;
    }
    finish(w)
}
