use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use time::{Duration, OffsetDateTime};
use tracing_subscriber::fmt::MakeWriter;

use crate::RotationPolicy;
use crate::output::error_line;

/// State of the current log file.
#[derive(Debug)]
struct FileState {
    /// The open file handle.
    file: File,
    /// Current size of the file in bytes.
    size: u64,
}

/// A writer that rotates its log file by size and prunes backups by count
/// and age.
///
/// The writer is meant to sit behind `tracing_appender::non_blocking`, so all
/// rotation work happens on the appender's worker thread.
#[derive(Debug)]
pub struct RotatingWriter {
    policy: RotationPolicy,
    state: Option<FileState>,
    /// Timestamp of the most recent backup, so names keep increasing.
    last_backup: Option<OffsetDateTime>,
    /// Backup removal failure not yet handed to the caller.
    cleanup_error: Option<io::Error>,
}

impl RotatingWriter {
    /// Create a new rotating writer, opening (or creating) the active file.
    pub fn new(policy: RotationPolicy) -> io::Result<Self> {
        // Ensure parent directory exists (create if necessary).
        if let Some(parent) = policy.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = Self {
            policy,
            state: None,
            last_backup: None,
            cleanup_error: None,
        };
        writer.open_existing_or_new(0)?;
        writer.prune();

        Ok(writer)
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Close the active file, move it to a backup and start a new one.
    ///
    /// Returns the first failure to remove an old backup, after the new file
    /// is already in place.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.roll()?;
        self.remove_old_backups()
    }

    /// Failure of the last backup removal done while writing, if any.
    /// Removal is best-effort there, so the record is written regardless.
    pub fn take_cleanup_error(&mut self) -> Option<io::Error> {
        self.cleanup_error.take()
    }

    fn prune(&mut self) {
        if let Err(e) = self.remove_old_backups() {
            self.cleanup_error = Some(e);
        }
    }

    fn roll(&mut self) -> io::Result<()> {
        // Close current file (drop it)
        self.state = None;

        if self.policy.path.exists() {
            let backup = self.next_backup_path()?;
            std::fs::rename(&self.policy.path, &backup)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.policy.path)?;
        self.state = Some(FileState { file, size: 0 });
        Ok(())
    }

    /// Path for the next backup. Backup names have millisecond resolution
    /// and must sort in rotation order, so the timestamp is moved past the
    /// previous backup and past any file already holding that name.
    fn next_backup_path(&mut self) -> io::Result<PathBuf> {
        let now = self.policy.now();
        let mut at = now
            .replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
            .map_err(io::Error::other)?;
        if let Some(last) = self.last_backup
            && at <= last
        {
            at = last + Duration::milliseconds(1);
        }
        loop {
            let candidate = self.policy.backup_path(at)?;
            if !candidate.exists() {
                self.last_backup = Some(at);
                return Ok(candidate);
            }
            at += Duration::milliseconds(1);
        }
    }

    /// Reuse the active file if the next write still fits, otherwise rotate.
    fn open_existing_or_new(&mut self, write_len: usize) -> io::Result<()> {
        let path = &self.policy.path;
        let existing = match path.metadata() {
            Ok(metadata) => Some(metadata.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        match existing {
            Some(size) if size + write_len as u64 <= self.policy.max_size_bytes() => {
                let file = OpenOptions::new().append(true).open(path)?;
                self.state = Some(FileState { file, size });
                Ok(())
            }
            Some(_) => {
                self.roll()?;
                self.prune();
                Ok(())
            }
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                self.state = Some(FileState { file, size: 0 });
                Ok(())
            }
        }
    }

    /// Backups belonging to this policy, newest first.
    fn backups(&self) -> io::Result<Vec<(OffsetDateTime, PathBuf)>> {
        let mut backups = Vec::new();
        for entry in std::fs::read_dir(self.policy.dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(taken) = self.policy.backup_time(&name.to_string_lossy()) {
                backups.push((taken, entry.path()));
            }
        }
        backups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(backups)
    }

    /// Delete backups beyond the configured count and older than the
    /// configured age. Keeps going past a failed removal and returns the
    /// first failure.
    fn remove_old_backups(&self) -> io::Result<()> {
        let max_backups = self.policy.max_backups;
        let max_age = self.policy.max_age();
        if max_backups == 0 && max_age.is_none() {
            return Ok(());
        }

        let cutoff = max_age.map(|age| self.policy.now() - age);
        let mut first_error = None;
        for (i, (taken, path)) in self.backups()?.into_iter().enumerate() {
            let too_many = max_backups > 0 && i >= max_backups;
            let too_old = cutoff.is_some_and(|cutoff| taken < cutoff);
            if (too_many || too_old)
                && let Err(e) = std::fs::remove_file(&path)
            {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let max_size = self.policy.max_size_bytes();
        let len = buf.len() as u64;
        if len > max_size {
            return Err(io::Error::other(format!(
                "write length {len} exceeds maximum file size {max_size}"
            )));
        }

        match self.state.as_ref().map(|state| state.size + len > max_size) {
            None => self.open_existing_or_new(buf.len())?,
            Some(true) => {
                self.roll()?;
                self.prune();
            }
            Some(false) => {}
        }

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| io::Error::other("Failed to open log file"))?;
        let written = state.file.write(buf)?;
        state.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.as_mut() {
            Some(state) => state.file.flush(),
            None => Ok(()),
        }
    }
}

/// [`RotatingWriter`] that reports failures to an error writer instead of
/// returning them.
///
/// `tracing_appender`'s worker drops write errors, so the rotating file is
/// wrapped in this before it is handed to `non_blocking`. A rejected record
/// is lost, but the failure is written to `errors` as
/// `<utc time> write error on <path>: <error>`.
pub struct ReportingWriter<E> {
    inner: RotatingWriter,
    errors: E,
}

impl<E> ReportingWriter<E>
where
    E: for<'w> MakeWriter<'w>,
{
    pub fn new(inner: RotatingWriter, errors: E) -> Self {
        Self { inner, errors }
    }

    fn report(&self, err: &io::Error) {
        let line = error_line(&self.inner.policy.path.display().to_string(), err);
        // Nowhere left to report a failing error writer.
        let _ = self.errors.make_writer().write_all(line.as_bytes());
    }

    fn report_cleanup(&mut self) {
        if let Some(e) = self.inner.take_cleanup_error() {
            self.report(&e);
        }
    }
}

impl<E> Write for ReportingWriter<E>
where
    E: for<'w> MakeWriter<'w>,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.inner.write_all(buf) {
            self.report(&e);
        }
        self.report_cleanup();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Err(e) = self.inner.flush() {
            self.report(&e);
        }
        Ok(())
    }
}

impl<E> std::fmt::Debug for ReportingWriter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingWriter")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn policy_in(
        dir: &tempfile::TempDir,
        max_bytes: u64,
        backups: usize,
        days: u64,
    ) -> RotationPolicy {
        RotationPolicy::new(dir.path().join("test.log"), 1, backups, days)
            .with_max_size_bytes(max_bytes)
    }

    fn backup_names(dir: &tempfile::TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("test-"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rotating_writer_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 1024, 0, 0);
        let log_path = policy.path.clone();
        let mut writer = RotatingWriter::new(policy).expect("create writer");

        writer.write_all(b"hello world\n").unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("hello world"));
    }

    #[test]
    fn test_rotating_writer_creates_parent_dir() {
        // Don't pre-create nested dirs; writer should create them automatically
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/inner");
        let log_path = nested.join("test.log");
        assert!(!nested.exists());

        let mut writer =
            RotatingWriter::new(RotationPolicy::new(&log_path, 1, 0, 0)).expect("create writer");
        writer.write_all(b"hello parent\n").unwrap();
        writer.flush().unwrap();

        assert!(log_path.exists(), "Log file should have been created");
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("hello parent"));
    }

    #[test]
    fn test_rotating_writer_size_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 50, 0, 0);
        let log_path = policy.path.clone();
        let mut writer = RotatingWriter::new(policy).expect("create writer");

        // 27 bytes per line: every write after the first rotates
        for i in 0..5 {
            writer
                .write_all(format!("line {} - padding text here\n", i).as_bytes())
                .unwrap();
        }
        writer.flush().unwrap();

        let active = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(active, "line 4 - padding text here\n");
        assert!(active.len() as u64 <= 50);

        let backups = backup_names(&dir);
        assert_eq!(backups.len(), 4, "{backups:?}");
        for name in &backups {
            let content = std::fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(content.len() as u64 <= 50);
            assert_eq!(content.lines().count(), 1);
        }
    }

    #[test]
    fn test_rotating_writer_keeps_max_backups() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 16, 2, 0);
        let log_path = policy.path.clone();
        let mut writer = RotatingWriter::new(policy).expect("create writer");

        for i in 0..6 {
            writer
                .write_all(format!("entry {i:02}......\n").as_bytes())
                .unwrap();
        }
        writer.flush().unwrap();

        let backups = backup_names(&dir);
        assert_eq!(backups.len(), 2, "{backups:?}");

        // Newest backups survive
        let kept: Vec<String> = backups
            .iter()
            .map(|name| std::fs::read_to_string(dir.path().join(name)).unwrap())
            .collect();
        assert_eq!(kept, ["entry 03......\n", "entry 04......\n"]);
        assert_eq!(
            std::fs::read_to_string(&log_path).unwrap(),
            "entry 05......\n"
        );
    }

    #[test]
    fn test_rotating_writer_removes_expired_backups() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 16, 0, 7);

        let stale = policy
            .backup_path(datetime!(2001-02-03 04:05:06.007 UTC))
            .unwrap();
        std::fs::write(&stale, b"ancient\n").unwrap();
        let unrelated = dir.path().join("notes.txt");
        std::fs::write(&unrelated, b"keep me\n").unwrap();

        let mut writer = RotatingWriter::new(policy).expect("create writer");
        writer.write_all(b"first line....\n").unwrap();
        writer.write_all(b"second line...\n").unwrap();
        writer.flush().unwrap();

        assert!(!stale.exists(), "expired backup should be deleted");
        assert!(unrelated.exists());
        assert_eq!(backup_names(&dir).len(), 1);
    }

    #[test]
    fn test_rotating_writer_reuse_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 100, 5, 0);
        let log_path = policy.path.clone();

        std::fs::write(&log_path, b"existing content\n").unwrap();

        let mut writer = RotatingWriter::new(policy).expect("create writer");
        writer.write_all(b"new content\n").unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("existing content"));
        assert!(content.contains("new content"));
        assert!(backup_names(&dir).is_empty(), "Should not have rotated");
    }

    #[test]
    fn test_rotating_writer_rotates_oversized_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 10, 0, 0);
        let log_path = policy.path.clone();

        std::fs::write(&log_path, b"this is already too long\n").unwrap();

        let mut writer = RotatingWriter::new(policy).expect("create writer");
        writer.write_all(b"fresh\n").unwrap();

        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "fresh\n");
        assert_eq!(backup_names(&dir).len(), 1);
    }

    #[test]
    fn test_rotating_writer_rejects_oversized_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingWriter::new(policy_in(&dir, 8, 0, 0)).expect("create writer");
        let err = writer.write(b"way more than eight bytes").unwrap_err();
        assert!(err.to_string().contains("exceeds maximum file size"));
    }

    #[test]
    fn test_rotating_writer_prunes_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 1024, 2, 7);

        let stale = policy
            .backup_path(datetime!(2001-02-03 04:05:06.007 UTC))
            .unwrap();
        std::fs::write(&stale, b"ancient\n").unwrap();
        let now = OffsetDateTime::now_utc();
        let recent: Vec<PathBuf> = (1..=3)
            .map(|minutes| policy.backup_path(now - Duration::minutes(minutes)).unwrap())
            .collect();
        for path in &recent {
            std::fs::write(path, b"recent\n").unwrap();
        }
        std::fs::write(&policy.path, b"still small\n").unwrap();

        let mut writer = RotatingWriter::new(policy).expect("create writer");

        assert!(!stale.exists(), "expired backup should be deleted on open");
        assert!(recent[0].exists());
        assert!(recent[1].exists());
        assert!(!recent[2].exists(), "oldest backup beyond the count limit");
        assert!(writer.take_cleanup_error().is_none());
        assert_eq!(backup_names(&dir).len(), 2);
    }

    #[test]
    fn test_reporting_writer_reports_rejected_write() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 8, 0, 0);
        let log_path = policy.path.clone();
        let errors = crate::test_support::Capture::new();
        let mut writer =
            ReportingWriter::new(RotatingWriter::new(policy).unwrap(), errors.clone());

        writer.write_all(b"way more than eight bytes").unwrap();
        writer.write_all(b"short\n").unwrap();

        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "short\n");
        let report = errors.output();
        assert_eq!(report.lines().count(), 1, "{report}");
        assert!(
            report.contains(&format!("write error on {}: write length 25", log_path.display())),
            "{report}"
        );
    }

    #[test]
    fn test_manual_rotate() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir, 1024, 0, 0);
        let log_path = policy.path.clone();
        let mut writer = RotatingWriter::new(policy).expect("create writer");

        writer.write_all(b"before\n").unwrap();
        writer.rotate().unwrap();
        writer.rotate().unwrap();
        writer.write_all(b"after\n").unwrap();

        assert_eq!(std::fs::read_to_string(&log_path).unwrap(), "after\n");
        // Two rotations in the same millisecond still produce distinct backups
        assert_eq!(backup_names(&dir).len(), 2);
    }
}
