use std::time::SystemTime;

/// Local timestamp for cache and manifest records, e.g. `2025-03-01T14:02:11+01:00`.
pub(crate) fn timestamp_now() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

/// Same format for a filesystem time.
pub(crate) fn timestamp_of(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}
