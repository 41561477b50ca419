//! Cache builds
//!
//! A cache is a single CSV file holding the rows of many source files,
//! columns aligned by name. After each build the cache digest is recorded
//! in the ledger and the digests of its sources in a per-cache source list
//! (`.<cache name>.sources`, same line format). An incremental build starts
//! from the existing cache only while that cache still matches its ledger
//! entry and every listed source is still an unchanged input; it then
//! appends just the inputs the list has never seen.

use crate::check::{CheckOptions, verdict};
use std::path::{Path, PathBuf};
use strata_common::config::DEFAULT_LOCK_FILE;
use strata_common::{
    BasenameSplit, Config, Error, HashAlgorithm, HashEntry, Ledger, Result, Table, verbose,
};
use tracing::warn;
use walkdir::WalkDir;

/// Options for [`build`]
#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Start from the existing cache when it still matches the ledger
    pub incremental: bool,
    /// Replace an existing cache
    pub overwrite: bool,
    /// Record digests of the cache and its sources after building
    pub post_hash: bool,
    /// Log every read and write at `info`
    pub verbose: bool,
    /// Digest algorithm for ledger entries
    pub algorithm: HashAlgorithm,
    /// Hash raw bytes instead of newline-normalized text
    pub binary: bool,
    /// Ledger file name next to the cache (algorithm default if unset)
    pub ledger_file_name: Option<String>,
    /// Advisory lock marker name, never read as a source
    pub lock_file_name: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            incremental: true,
            overwrite: false,
            post_hash: true,
            verbose: false,
            algorithm: HashAlgorithm::default(),
            binary: false,
            ledger_file_name: None,
            lock_file_name: DEFAULT_LOCK_FILE.to_string(),
        }
    }
}

impl BuildOptions {
    #[must_use]
    pub fn from_config(config: &Config, overwrite: bool, verbose: bool) -> Self {
        Self {
            incremental: config.build.incremental,
            overwrite,
            post_hash: config.build.post_hash,
            verbose,
            algorithm: config.hash.algorithm,
            binary: config.hash.binary,
            ledger_file_name: config.hash.ledger_file_name.clone(),
            lock_file_name: config.archive.lock_file_name.clone(),
        }
    }

    /// Options for checking caches written with these options
    #[must_use]
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            algorithm: self.algorithm,
            ledger_file_name: self.ledger_file_name.clone(),
            verbose: self.verbose,
        }
    }

    fn ledger_for(&self, cache: &Path, ledger: Option<&Path>) -> Ledger {
        let path = ledger.map_or_else(
            || self.check_options().default_ledger(cache),
            Path::to_path_buf,
        );
        Ledger::new(path, self.algorithm)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::io_at(path, e))
}

/// Path of the list of sources folded into `cache`
#[must_use]
pub fn source_list_path(cache: &Path) -> PathBuf {
    let name = cache
        .file_name()
        .map_or_else(|| "cache".into(), |name| name.to_string_lossy());
    cache.with_file_name(format!(".{name}.sources"))
}

/// Decide which sources still need appending to a verified cache
///
/// Returns `None` when the cache cannot be extended: its source list is
/// missing, or a listed source changed or is no longer an input. Rows
/// already in the cache cannot be taken back out, so it has to be rebuilt
/// from scratch.
fn pending_sources<'a>(
    list: &Ledger,
    sources: &'a [PathBuf],
    verbose: bool,
) -> Result<Option<Vec<&'a PathBuf>>> {
    if !list.exists() {
        warn!("No source list at {}", list.path().display());
        return Ok(None);
    }
    let recorded = match list.entries() {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read source list {}: {}", list.path().display(), e);
            return Ok(None);
        }
    };

    if let Some(gone) = recorded.iter().find(|entry| !sources.contains(&entry.path)) {
        warn!("Source {} is no longer an input", gone.path.display());
        return Ok(None);
    }

    let mut pending = Vec::new();
    for source in sources {
        match recorded.iter().find(|entry| entry.path == *source) {
            None => pending.push(source),
            Some(entry) => {
                if !entry.verify()? {
                    warn!("Source {} changed since the last build", source.display());
                    return Ok(None);
                }
                verbose!(verbose, "Skipping {}, already in the cache", source.display());
            }
        }
    }
    Ok(Some(pending))
}

/// Build `cache` from `files`, in the given order
///
/// Returns `Ok(false)` when there is nothing to build. An existing cache is
/// only replaced with `overwrite`.
pub fn build(
    cache: &Path,
    files: &[PathBuf],
    ledger: Option<&Path>,
    options: &BuildOptions,
) -> Result<bool> {
    if files.is_empty() {
        warn!("No input files to build {}", cache.display());
        return Ok(false);
    }

    let cache = absolute(cache)?;
    let ledger = options.ledger_for(&cache, ledger);
    let list = Ledger::new(source_list_path(&cache), options.algorithm);
    let sources = files
        .iter()
        .map(|file| absolute(file))
        .collect::<Result<Vec<_>>>()?;

    let mut pending: Vec<&PathBuf> = sources.iter().collect();
    let mut seed = false;
    if cache.exists() {
        if !options.overwrite {
            return Err(Error::AlreadyExists { path: cache });
        }
        if options.incremental {
            let state = verdict(&cache, &ledger, &BasenameSplit::new(options.algorithm));
            if state.passed() {
                if let Some(rest) = pending_sources(&list, &sources, options.verbose)? {
                    pending = rest;
                    seed = true;
                }
            } else {
                warn!("Cache {} {}", cache.display(), state);
            }
            if !seed {
                warn!("Rebuilding {} from scratch", cache.display());
            }
        }
    }

    let mut table = if seed {
        let existing = Table::read_csv(&cache)?;
        verbose!(
            options.verbose,
            "Starting from {} cached rows in {}",
            existing.num_rows(),
            cache.display()
        );
        existing
    } else {
        Table::empty()
    };

    for source in pending {
        let rows = Table::read_csv(source)?;
        verbose!(
            options.verbose,
            "Appending {} rows from {}",
            rows.num_rows(),
            source.display()
        );
        table = table.append(&rows)?;
    }

    if let Some(parent) = cache.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
    }
    table.write_csv(&cache)?;
    verbose!(
        options.verbose,
        "Wrote {} rows to {}",
        table.num_rows(),
        cache.display()
    );

    if options.post_hash {
        let entry = HashEntry::compute(&cache, options.algorithm, options.binary)?;
        ledger.upsert(&entry)?;
        let fingerprints = sources
            .iter()
            .map(|source| HashEntry::compute(source, options.algorithm, options.binary))
            .collect::<Result<Vec<_>>>()?;
        list.rewrite(&fingerprints)?;
        verbose!(
            options.verbose,
            "Recorded digests in {} and {}",
            ledger.path().display(),
            list.path().display()
        );
    } else if list.exists() {
        // a stale list would let a later build skip sources
        std::fs::remove_file(list.path()).map_err(|e| Error::io_at(list.path(), e))?;
    }
    Ok(true)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Regular files under `root`, sorted
///
/// Hidden entries, the paths in `exclude` and files named in `skip_names`
/// are left out.
pub fn collect_sources(
    root: &Path,
    exclude: &[PathBuf],
    skip_names: &[&str],
) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io_at(path, e.into())
        })?;
        if !entry.file_type().is_file()
            || skip_names.iter().any(|name| entry.file_name() == *name)
        {
            continue;
        }
        let path = absolute(entry.path())?;
        if !exclude.contains(&path) {
            sources.push(path);
        }
    }
    Ok(sources)
}

/// Build `cache` from every file under `root`
pub fn build_tree(
    root: &Path,
    cache: &Path,
    ledger: Option<&Path>,
    options: &BuildOptions,
) -> Result<bool> {
    let cache = absolute(cache)?;
    let ledger_path = match ledger {
        Some(path) => absolute(path)?,
        None => options.check_options().default_ledger(&cache),
    };

    let exclude = [cache.clone(), ledger_path.clone(), source_list_path(&cache)];
    let sources = collect_sources(root, &exclude, &[options.lock_file_name.as_str()])?;
    verbose!(
        options.verbose,
        "Found {} source files under {}",
        sources.len(),
        root.display()
    );
    build(&cache, &sources, Some(&ledger_path), options)
}
