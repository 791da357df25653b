use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const MEGABYTE: u64 = 1024 * 1024;

/// Size used when a policy is given a maximum size of zero.
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// Parse a size string with optional units (K/M/G, case-insensitive), defaulting to MB if no unit.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };

    let (num_str, unit) = if last.is_alphabetic() {
        (&s[..s.len() - last.len_utf8()], last.to_ascii_uppercase())
    } else {
        (s, 'M')
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier = match unit {
        'K' => 1024,
        'M' => MEGABYTE,
        'G' => 1024 * MEGABYTE,
        _ => return Err(format!("invalid unit: {}, supported: K/M/G", unit)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number of megabytes or a string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

impl SizeValue {
    fn to_bytes(&self) -> Result<u64, String> {
        match self {
            SizeValue::Number(mb) => mb
                .checked_mul(MEGABYTE)
                .ok_or_else(|| "size too large".to_string()),
            SizeValue::String(s) => parse_size(s),
        }
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    SizeValue::deserialize(deserializer)?
        .to_bytes()
        .map_err(de::Error::custom)
}

fn serialize_size<S>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if bytes % MEGABYTE == 0 {
        serializer.serialize_u64(bytes / MEGABYTE)
    } else {
        serializer.collect_str(&format_args!("{}K", bytes.div_ceil(1024)))
    }
}

/// When the active log file is rolled over and which backups survive.
///
/// Backups are named `<stem>-<timestamp><.ext>` next to the active file, e.g.
/// `app-2026-10-18T09-15-02.417.log` for `app.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Path of the active log file.
    pub path: PathBuf,
    /// Maximum size of the active file in bytes before it is rotated.
    /// Configuration files give it in megabytes (`100`) or with a unit
    /// (`"512K"`, `"2G"`). Zero selects [`DEFAULT_MAX_SIZE_MB`].
    #[serde(
        default,
        deserialize_with = "deserialize_size",
        serialize_with = "serialize_size"
    )]
    pub max_size: u64,
    /// Maximum number of backups to keep. Zero keeps all of them.
    #[serde(default)]
    pub max_backups: usize,
    /// Maximum age of a backup in days, judged by the timestamp in its name.
    /// Zero disables age based removal.
    #[serde(default)]
    pub max_age_days: u64,
    /// Stamp backup names with local time instead of UTC.
    #[serde(default)]
    pub local_time: bool,
}

impl RotationPolicy {
    /// Create a policy from the size in megabytes, the backup count and the
    /// age in days.
    pub fn new<P: Into<PathBuf>>(
        path: P,
        max_size_mb: u64,
        max_backups: usize,
        max_age_days: u64,
    ) -> Self {
        Self {
            path: path.into(),
            max_size: max_size_mb.saturating_mul(MEGABYTE),
            max_backups,
            max_age_days,
            local_time: false,
        }
    }

    /// Set the maximum size in bytes.
    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Stamp backup names with local time.
    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    /// Effective size limit in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        if self.max_size == 0 {
            DEFAULT_MAX_SIZE_MB * MEGABYTE
        } else {
            self.max_size
        }
    }

    /// Effective maximum backup age, if any.
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_days > 0).then(|| Duration::days(self.max_age_days as i64))
    }

    /// Directory holding the active file and its backups.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (stem, ext)
    }

    /// Current time in the zone used for backup names.
    pub fn now(&self) -> OffsetDateTime {
        if self.local_time {
            OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
        } else {
            OffsetDateTime::now_utc()
        }
    }

    /// Path of the backup taken at `at`.
    pub fn backup_path(&self, at: OffsetDateTime) -> std::io::Result<PathBuf> {
        let (stem, ext) = self.name_parts();
        let stamp = at
            .format(format_description!(
                "[year]-[month]-[day]T[hour]-[minute]-[second].[subsecond digits:3]"
            ))
            .map_err(std::io::Error::other)?;
        Ok(self.dir().join(format!("{stem}-{stamp}{ext}")))
    }

    /// Timestamp of a backup file name, or `None` if the name does not belong
    /// to this policy.
    pub fn backup_time(&self, file_name: &str) -> Option<OffsetDateTime> {
        let (stem, ext) = self.name_parts();
        let stamp = file_name
            .strip_prefix(stem.as_str())?
            .strip_prefix('-')?
            .strip_suffix(ext.as_str())?;
        let parsed = PrimitiveDateTime::parse(
            stamp,
            format_description!(
                "[year]-[month]-[day]T[hour]-[minute]-[second].[subsecond digits:3]"
            ),
        )
        .ok()?;
        let offset = if self.local_time {
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
        } else {
            UtcOffset::UTC
        };
        Some(parsed.assume_offset(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_new_converts_megabytes() {
        let policy = RotationPolicy::new("/var/log/app.log", 10, 3, 7);
        assert_eq!(policy.max_size, 10 * MEGABYTE);
        assert_eq!(policy.max_size_bytes(), 10 * MEGABYTE);
        assert_eq!(policy.max_backups, 3);
        assert_eq!(policy.max_age(), Some(Duration::days(7)));
        assert!(!policy.local_time);
    }

    #[test]
    fn test_zero_values_select_defaults() {
        let policy = RotationPolicy::new("app.log", 0, 0, 0);
        assert_eq!(policy.max_size_bytes(), DEFAULT_MAX_SIZE_MB * MEGABYTE);
        assert_eq!(policy.max_age(), None);
        assert_eq!(policy.dir(), Path::new("."));
    }

    #[test]
    fn test_backup_path_and_time_round_trip() {
        let policy = RotationPolicy::new("/var/log/app.log", 1, 0, 0);
        let at = datetime!(2026-10-18 09:15:02.417 UTC);
        let backup = policy.backup_path(at).unwrap();
        assert_eq!(
            backup,
            PathBuf::from("/var/log/app-2026-10-18T09-15-02.417.log")
        );

        let name = backup.file_name().unwrap().to_str().unwrap();
        assert_eq!(policy.backup_time(name), Some(at));
    }

    #[test]
    fn test_backup_time_rejects_foreign_names() {
        let policy = RotationPolicy::new("/var/log/app.log", 1, 0, 0);
        assert_eq!(policy.backup_time("app.log"), None);
        assert_eq!(policy.backup_time("other-2026-10-18T09-15-02.417.log"), None);
        assert_eq!(policy.backup_time("app-2026-10-18T09-15-02.417.txt"), None);
        assert_eq!(policy.backup_time("app-not-a-time.log"), None);
    }

    #[test]
    fn test_backup_name_without_extension() {
        let policy = RotationPolicy::new("server", 1, 0, 0);
        let at = datetime!(2026-01-02 03:04:05 UTC);
        let backup = policy.backup_path(at).unwrap();
        assert_eq!(backup, PathBuf::from("./server-2026-01-02T03-04-05.000"));
        assert_eq!(
            policy.backup_time("server-2026-01-02T03-04-05.000"),
            Some(at)
        );
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10"), Ok(10 * MEGABYTE));
        assert_eq!(parse_size("512K"), Ok(512 * 1024));
        assert_eq!(parse_size("3m"), Ok(3 * MEGABYTE));
        assert_eq!(parse_size("2g"), Ok(2 * 1024 * MEGABYTE));
        assert!(parse_size("").is_err());
        assert!(parse_size("12X").is_err());
        assert!(parse_size("abcM").is_err());
    }

    #[test]
    fn test_rotation_policy_deserialize_yaml() {
        let yaml = r#"
path: /var/log/app.log
max_size: 5
max_backups: 4
max_age_days: 30
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy, RotationPolicy::new("/var/log/app.log", 5, 4, 30));

        let yaml = r#"
path: app.log
max_size: "256K"
"#;
        let policy: RotationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.max_size, 256 * 1024);
        assert_eq!(policy.max_backups, 0);
        assert_eq!(policy.max_age_days, 0);
    }

    #[test]
    fn test_rotation_policy_toml_round_trip() {
        let policy = RotationPolicy::new("logs/app.log", 20, 5, 14);
        let text = toml::to_string(&policy).unwrap();
        assert!(text.contains("max_size = 20"));
        let back: RotationPolicy = toml::from_str(&text).unwrap();
        assert_eq!(back, policy);

        let odd = RotationPolicy::new("logs/app.log", 0, 1, 1).with_max_size_bytes(2048);
        let text = toml::to_string(&odd).unwrap();
        assert!(text.contains("max_size = \"2K\""));
        let back: RotationPolicy = toml::from_str(&text).unwrap();
        assert_eq!(back, odd);
    }
}
