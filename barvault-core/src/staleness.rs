//! Decides whether an artifact must be (re)downloaded.

use crate::key::ArtifactKey;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

/// Default age after which single-file artifacts are refreshed.
pub const DEFAULT_UPDATE_PERIOD_DAYS: i64 = 7;

/// Path fragments of data this cache does not own. Every fragment in a group
/// must appear (case-insensitively) for the group to match.
const EXCLUDED_CATEGORIES: &[&[&str]] = &[
    &["fine", "fundamental"],
    &["map_files"],
    &["factor_files"],
    &["margins", "future"],
];

/// Freshness rules for on-disk artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_UPDATE_PERIOD_DAYS))
    }
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// True when `path` should be fetched from the remote source.
    ///
    /// `artifact` is the decoded key when it parsed; without it, file names
    /// carrying an 8-digit date are treated as date-partitioned.
    pub fn needs_fetch(
        &self,
        artifact: Option<&ArtifactKey>,
        path: &Path,
        now: DateTime<Utc>,
    ) -> bool {
        if is_excluded(path) {
            return false;
        }

        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(_) => return true,
        };

        let date_partitioned = match artifact {
            Some(key) => key.resolution.is_date_partitioned(),
            None => has_date_stamp(path),
        };
        if date_partitioned {
            return false;
        }

        now - modified > self.max_age
    }
}

/// True for categories that are never fetched.
pub fn is_excluded(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    EXCLUDED_CATEGORIES
        .iter()
        .any(|group| group.iter().all(|fragment| lowered.contains(fragment)))
}

fn has_date_stamp(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    let bytes = name.as_bytes();
    bytes
        .windows(8)
        .any(|w| w.iter().all(u8::is_ascii_digit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from(SystemTime::now())
    }

    #[test]
    fn excluded_categories_match_any_case() {
        assert!(is_excluded(Path::new(
            "equity/usa/FUNDAMENTAL/Fine/aapl/20240102.json"
        )));
        assert!(is_excluded(Path::new("equity/usa/Map_Files/aapl.csv")));
        assert!(is_excluded(Path::new("equity/usa/factor_files/aapl.csv")));
        assert!(is_excluded(Path::new("future/cme/margins/es.csv")));
        assert!(!is_excluded(Path::new("equity/usa/fundamental/coarse/20240102.csv")));
        assert!(!is_excluded(Path::new("equity/usa/margins/es.csv")));
    }

    #[test]
    fn excluded_path_is_never_fetched_even_when_absent() {
        let policy = StalenessPolicy::default();
        let path = Path::new("/nonexistent/equity/usa/fundamental/fine/aapl/20240102.json");
        assert!(!policy.needs_fetch(None, path, now()));
    }

    #[test]
    fn missing_file_needs_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let policy = StalenessPolicy::default();
        let path = dir.path().join("equity/usa/daily/spy_trade.parquet");
        assert!(policy.needs_fetch(None, &path, now()));
    }

    #[test]
    fn single_file_artifact_goes_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity/usa/daily/spy_trade.parquet");
        touch(&path);

        let policy = StalenessPolicy::default();
        assert!(!policy.needs_fetch(None, &path, now()));
        assert!(policy.needs_fetch(None, &path, now() + Duration::days(8)));
    }

    #[test]
    fn dated_artifact_never_goes_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity/usa/minute/spy/20240102_trade.parquet");
        touch(&path);

        let policy = StalenessPolicy::new(Duration::hours(1));
        assert!(!policy.needs_fetch(None, &path, now() + Duration::days(365)));
    }
}
