use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a remote modification timestamp into UTC.
///
/// RFC 3339 values keep their offset; values without a zone are taken as UTC.
/// Fractional seconds are optional in every layout.
pub fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Capture time encoded in export filenames as a trailing `_yyyyMMddHHmmss`
/// segment, e.g. `exp_wyk_0001_20240305143000.xml`.
pub fn capture_time_from_filename(name: &str) -> Option<DateTime<Utc>> {
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }

    let stamp = parts[parts.len() - 1];
    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(
        stamp[0..4].parse().ok()?,
        stamp[4..6].parse().ok()?,
        stamp[6..8].parse().ok()?,
    )?;
    let time = date.and_hms_opt(
        stamp[8..10].parse().ok()?,
        stamp[10..12].parse().ok()?,
        stamp[12..14].parse().ok()?,
    )?;
    Some(time.and_utc())
}
