//! Cache verification against the checksum ledger
//!
//! Checking never fails: every problem (missing ledger, no entry, malformed
//! line, unreadable cache) is a failed check with a log line.

use std::fmt;
use std::path::{Path, PathBuf};
use strata_common::{
    BasenameSplit, HashAlgorithm, Ledger, LineSplit, default_ledger_path, verbose,
};
use tracing::warn;

/// Options for [`check`]
#[derive(Clone, Debug, Default)]
pub struct CheckOptions {
    /// Algorithm of the ledger entries
    pub algorithm: HashAlgorithm,
    /// Ledger file name next to the target (algorithm default if unset)
    pub ledger_file_name: Option<String>,
    /// Log passing checks at `info`
    pub verbose: bool,
}

impl CheckOptions {
    /// Ledger used when none is given explicitly
    #[must_use]
    pub fn default_ledger(&self, target: &Path) -> PathBuf {
        let name = self
            .ledger_file_name
            .as_deref()
            .unwrap_or_else(|| self.algorithm.default_ledger_name());
        default_ledger_path(target, name)
    }
}

/// Result of comparing a file with its recorded digest
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The current digest equals the recorded one
    Current,
    /// The file changed since it was recorded
    Changed,
    /// The ledger has no entry for the file
    Unrecorded,
    /// The ledger file does not exist
    MissingLedger,
    /// The ledger could not be read or the file could not be hashed
    Unreadable(String),
}

impl Verdict {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Current)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "matches its recorded digest"),
            Self::Changed => write!(f, "does not match its recorded digest"),
            Self::Unrecorded => write!(f, "has no ledger entry"),
            Self::MissingLedger => write!(f, "has no ledger"),
            Self::Unreadable(reason) => write!(f, "cannot be verified: {reason}"),
        }
    }
}

/// Compare `target` with its entry in `ledger`
#[must_use]
pub fn verdict(target: &Path, ledger: &Ledger, split: &dyn LineSplit) -> Verdict {
    if !ledger.exists() {
        return Verdict::MissingLedger;
    }
    let entry = match ledger.find(target, split) {
        Ok(Some(entry)) => entry,
        Ok(None) => return Verdict::Unrecorded,
        Err(e) => return Verdict::Unreadable(e.to_string()),
    };
    match entry.verify() {
        Ok(true) => Verdict::Current,
        Ok(false) => Verdict::Changed,
        Err(e) => Verdict::Unreadable(e.to_string()),
    }
}

/// Check `target` against `ledger` (or the default sibling ledger)
#[must_use]
pub fn check(target: &Path, ledger: Option<&Path>, options: &CheckOptions) -> bool {
    check_with(target, ledger, options, &BasenameSplit::new(options.algorithm))
}

/// [`check`] with a custom line splitting strategy
#[must_use]
pub fn check_with(
    target: &Path,
    ledger: Option<&Path>,
    options: &CheckOptions,
    split: &dyn LineSplit,
) -> bool {
    let ledger_path = ledger.map_or_else(|| options.default_ledger(target), Path::to_path_buf);
    let ledger = Ledger::new(&ledger_path, options.algorithm);

    let verdict = verdict(target, &ledger, split);
    if verdict.passed() {
        verbose!(options.verbose, "{} {}", target.display(), verdict);
    } else {
        warn!(
            "{} {} (ledger {})",
            target.display(),
            verdict,
            ledger_path.display()
        );
    }
    verdict.passed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use strata_common::{Error, HashEntry, Result, SplitLine};

    fn recorded(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        let entry = HashEntry::compute(&path, HashAlgorithm::Sha256, false).unwrap();
        Ledger::new(dir.join(".sha256sums"), HashAlgorithm::Sha256)
            .upsert(&entry)
            .unwrap();
        path
    }

    #[test]
    fn test_check_passes_then_fails_after_edit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = recorded(dir.path(), "cache.csv", "a,b\n1,2\n");
        let options = CheckOptions::default();

        assert!(check(&cache, None, &options));

        let mut bytes = fs::read(&cache).unwrap();
        bytes[0] = b'z';
        fs::write(&cache, bytes).unwrap();
        assert!(!check(&cache, None, &options));
    }

    #[test]
    fn test_check_missing_ledger_or_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.csv");
        fs::write(&cache, "a\n1\n").unwrap();
        let options = CheckOptions::default();

        assert!(!check(&cache, None, &options));
        assert_eq!(
            verdict(
                &cache,
                &Ledger::new(dir.path().join(".sha256sums"), HashAlgorithm::Sha256),
                &BasenameSplit::default()
            ),
            Verdict::MissingLedger
        );

        recorded(dir.path(), "other.csv", "x\n");
        assert!(!check(&cache, None, &options));
    }

    #[test]
    fn test_malformed_line_fails_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.csv");
        fs::write(&cache, "a\n1\n").unwrap();
        let ledger = dir.path().join("sums");
        fs::write(&ledger, "deadbeef  cache.csv\n").unwrap();

        assert!(!check(&cache, Some(&ledger), &CheckOptions::default()));
    }

    #[test]
    fn test_text_mode_ignores_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let cache = recorded(dir.path(), "cache.csv", "a,b\n1,2\n");
        fs::write(&cache, "a,b\r\n1,2\r\n").unwrap();
        assert!(check(&cache, None, &CheckOptions::default()));
    }

    #[test]
    fn test_named_ledger_and_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.csv");
        fs::write(&cache, "a\n1\n").unwrap();
        let entry = HashEntry::compute(&cache, HashAlgorithm::Sha1, true).unwrap();
        Ledger::new(dir.path().join("hashes.txt"), HashAlgorithm::Sha1)
            .upsert(&entry)
            .unwrap();

        let options = CheckOptions {
            algorithm: HashAlgorithm::Sha1,
            ledger_file_name: Some("hashes.txt".into()),
            verbose: true,
        };
        assert!(check(&cache, None, &options));
        assert!(!check(&cache, None, &CheckOptions::default()));
    }

    /// Splits `<path>=<digest>` lines
    struct KeyValueSplit;

    impl LineSplit for KeyValueSplit {
        fn split(&self, line: &str, _target: &Path) -> Result<Option<SplitLine>> {
            let (path, digest) = line.split_once('=').ok_or_else(|| Error::MalformedLine {
                line: line.to_string(),
            })?;
            Ok(Some(SplitLine {
                digest: digest.to_string(),
                binary: true,
                path: PathBuf::from(path),
            }))
        }
    }

    #[test]
    fn test_custom_line_split() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache.csv");
        fs::write(&cache, "a\n1\n").unwrap();
        let digest = HashAlgorithm::Sha256.hex_digest(&fs::read(&cache).unwrap());
        let ledger = dir.path().join("kv");
        fs::write(&ledger, format!("{}={digest}\n", cache.display())).unwrap();

        let options = CheckOptions::default();
        assert!(check_with(&cache, Some(&ledger), &options, &KeyValueSplit));
        assert!(!check(&cache, Some(&ledger), &options));
    }
}
