use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::Mutex,
};

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

/// Append-only audit trail. One pipe-delimited line per event:
///
/// `timestamp|category=..|actor=..|subject=..|action=..|success=..|details=..`
///
/// The mutex serializes concurrent appends so interleaved writers never
/// corrupt a line. Append failures are reported through tracing and
/// swallowed; auditing never fails the operation being audited.
pub struct AuditLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn append(
        &self,
        category: &str,
        actor: &str,
        subject: &str,
        action: &str,
        success: bool,
        details: &str,
    ) {
        let timestamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_default();
        let line = format!(
            "{timestamp}|category={}|actor={}|subject={}|action={}|success={success}|details={}",
            safe(category),
            safe(actor),
            safe(subject),
            safe(action),
            safe(details),
        );
        let mut file = self.file.lock().unwrap();
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(error = %e, path = %self.path.display(), "audit append failed");
        }
    }
}

fn safe(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_have_the_seven_field_layout() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.log")).unwrap();
        log.append("account", "CU-1", "AC-1", "deposit", true, "amount=10");
        log.append("account", "CU-1", "AC-1", "withdraw", false, "insufficient funds");

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('|').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[1], "category=account");
        assert_eq!(fields[2], "actor=CU-1");
        assert_eq!(fields[3], "subject=AC-1");
        assert_eq!(fields[4], "action=deposit");
        assert_eq!(fields[5], "success=true");
        assert_eq!(fields[6], "details=amount=10");
        assert!(lines[1].contains("success=false"));
    }

    #[test]
    fn embedded_newlines_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.log")).unwrap();
        log.append("account", "CU-1", "AC-1", "note", true, "line one\nline two");

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("line one line two"));
    }

    #[test]
    fn appends_accumulate_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        {
            let log = AuditLog::open(&path).unwrap();
            log.append("system", "interest", "*", "apply", true, "processed=0, applied=0");
        }
        {
            let log = AuditLog::open(&path).unwrap();
            log.append("system", "interest", "*", "apply", true, "processed=0, applied=0");
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
