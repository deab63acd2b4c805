use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an ISO8601 timestamp. Offsets are honoured; naive timestamps and
/// bare dates are taken as UTC.
pub(crate) fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{value}' is not an ISO8601 timestamp"))
}

/// Enqueue every configured source once with the same start time, wait for
/// the queue to drain, then stop the workers.
///
/// # Errors
///
/// Returns an error if the worker pool cannot be built. Per-job failures are
/// logged by the workers and do not fail the run.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &cryptonews_core::AppConfig,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<()> {
    let workers = crate::start_worker_pool(pool, config).await?;
    let since = since.unwrap_or_else(Utc::now);

    let names = workers.source_names();
    for name in &names {
        workers.enqueue(name, Some(since));
    }
    workers.join().await;
    workers.stop().await;

    println!(
        "ingest complete: {} sources since {}",
        names.len(),
        since.to_rfc3339()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_since("2024-05-13T14:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 13, 12, 0, 0).unwrap());
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let ts = parse_since("2024-05-13T12:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 13, 12, 0, 0).unwrap());
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        let ts = parse_since("2024-05-13").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_since("last tuesday").is_err());
    }
}
