//! Flag versions: named snapshots of a dataset's flags.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use hifitime::Epoch;
use log::{debug, info};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Flag version '{0}' does not exist")]
    NotFound(String),

    #[error("Flag version '{0}' already exists")]
    AlreadyExists(String),

    #[error("Malformed line {line_num} in {path}: '{line}'")]
    Malformed {
        path: PathBuf,
        line_num: usize,
        line: String,
    },

    #[error("Error with flag versions in {path}: {source}")]
    IO {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagVersion {
    pub name: String,
    pub comment: String,
}

impl Display for FlagVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.name, self.comment)
    }
}

/// Something that can snapshot and restore the flags of a dataset.
pub trait FlagVersionStore {
    fn list_versions(&self) -> Result<Vec<FlagVersion>, VersionError>;

    /// Snapshot the current flags as `name`.
    fn save_version(&mut self, name: &str, comment: &str) -> Result<(), VersionError>;

    /// Replace the current flags with those of `name`.
    fn restore_version(&mut self, name: &str) -> Result<(), VersionError>;

    fn rename_version(&mut self, old: &str, new: &str, comment: &str)
        -> Result<(), VersionError>;
}

/// The first of `prefix_1`, `prefix_2`, ... that isn't already a version.
pub fn unused_version_name(prefix: &str, existing: &[FlagVersion]) -> String {
    (1..)
        .map(|i| format!("{prefix}_{i}"))
        .find(|name| !existing.iter().any(|v| &v.name == name))
        .unwrap_or_else(|| prefix.to_string())
}

/// `YYYY-MM-DD HH:MM:SS`
fn format_timestamp(epoch: Epoch) -> String {
    let (y, m, d, h, min, s, _) = epoch.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02} {h:02}:{min:02}:{s:02}")
}

/// Save the current flags under an unused name before they are changed.
/// Returns the new version's name.
pub fn backup_flags<S: FlagVersionStore + ?Sized>(
    store: &mut S,
    prefix: &str,
    now: Epoch,
) -> Result<String, VersionError> {
    let existing = store.list_versions()?;
    let name = unused_version_name(prefix, &existing);
    info!("Saving current flags to {name} before applying new flags");
    store.save_version(&name, &format!("{prefix} autosave on {}", format_timestamp(now)))?;
    Ok(name)
}

pub fn restore_flags<S: FlagVersionStore + ?Sized>(
    store: &mut S,
    name: &str,
) -> Result<(), VersionError> {
    if !store.list_versions()?.iter().any(|v| v.name == name) {
        return Err(VersionError::NotFound(name.to_string()));
    }
    info!("Restoring flags from version {name}");
    store.restore_version(name)
}

pub fn rename_flags<S: FlagVersionStore + ?Sized>(
    store: &mut S,
    old: &str,
    new: &str,
    comment: &str,
) -> Result<(), VersionError> {
    let existing = store.list_versions()?;
    if !existing.iter().any(|v| v.name == old) {
        return Err(VersionError::NotFound(old.to_string()));
    }
    if old != new && existing.iter().any(|v| v.name == new) {
        return Err(VersionError::AlreadyExists(new.to_string()));
    }
    info!("Renaming flag version {old} to {new}");
    store.rename_version(old, new, comment)
}

/// The list of flag versions of a dataset, one `name : comment` per line. If
/// there's no file behind it, it only lives in memory.
#[derive(Debug, Clone, Default)]
pub struct FlagVersionList {
    path: Option<PathBuf>,
    versions: Vec<FlagVersion>,
}

impl FlagVersionList {
    pub const FILE_NAME: &'static str = "FLAG_VERSION_LIST";

    pub fn in_memory() -> FlagVersionList {
        FlagVersionList::default()
    }

    /// Load the list in the directory `dir` (usually `<vis>.flagversions`).
    /// A missing list is an empty one.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<FlagVersionList, VersionError> {
        let path = dir.as_ref().join(Self::FILE_NAME);
        let mut versions = vec![];
        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| VersionError::IO {
                path: path.clone(),
                source,
            })?;
            for (i, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let (name, comment) =
                    line.split_once(" : ")
                        .ok_or_else(|| VersionError::Malformed {
                            path: path.clone(),
                            line_num: i + 1,
                            line: line.to_string(),
                        })?;
                versions.push(FlagVersion {
                    name: name.trim().to_string(),
                    comment: comment.trim().to_string(),
                });
            }
        }
        debug!("{} flag versions in {}", versions.len(), path.display());
        Ok(FlagVersionList {
            path: Some(path),
            versions,
        })
    }

    pub fn versions(&self) -> &[FlagVersion] {
        &self.versions
    }

    pub fn contains(&self, name: &str) -> bool {
        self.versions.iter().any(|v| v.name == name)
    }

    pub fn push(&mut self, version: FlagVersion) -> Result<(), VersionError> {
        if self.contains(&version.name) {
            return Err(VersionError::AlreadyExists(version.name));
        }
        self.versions.push(version);
        self.write()
    }

    pub fn rename(&mut self, old: &str, new: &str, comment: &str) -> Result<(), VersionError> {
        let version = self
            .versions
            .iter_mut()
            .find(|v| v.name == old)
            .ok_or_else(|| VersionError::NotFound(old.to_string()))?;
        version.name = new.to_string();
        version.comment = comment.to_string();
        self.write()
    }

    fn write(&self) -> Result<(), VersionError> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };
        let io_err = |source| VersionError::IO {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let contents: String = self.versions.iter().map(|v| format!("{v}\n")).collect();
        std::fs::write(path, contents).map_err(io_err)
    }
}

/// Only the bookkeeping; there are no flags here to snapshot or restore.
impl FlagVersionStore for FlagVersionList {
    fn list_versions(&self) -> Result<Vec<FlagVersion>, VersionError> {
        Ok(self.versions.clone())
    }

    fn save_version(&mut self, name: &str, comment: &str) -> Result<(), VersionError> {
        self.push(FlagVersion {
            name: name.to_string(),
            comment: comment.to_string(),
        })
    }

    fn restore_version(&mut self, name: &str) -> Result<(), VersionError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(VersionError::NotFound(name.to_string()))
        }
    }

    fn rename_version(
        &mut self,
        old: &str,
        new: &str,
        comment: &str,
    ) -> Result<(), VersionError> {
        self.rename(old, new, comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(names: &[&str]) -> Vec<FlagVersion> {
        names
            .iter()
            .map(|n| FlagVersion {
                name: n.to_string(),
                comment: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_unused_name_after_contiguous() {
        let existing = versions(&["tflagcmd_1", "tflagcmd_2"]);
        assert_eq!(unused_version_name("tflagcmd", &existing), "tflagcmd_3");
    }

    #[test]
    fn test_unused_name_fills_gaps() {
        assert_eq!(unused_version_name("flagcmd", &[]), "flagcmd_1");
        let existing = versions(&["flagcmd_1", "flagcmd_3", "other_2", "flagcmd_x"]);
        assert_eq!(unused_version_name("flagcmd", &existing), "flagcmd_2");
    }

    #[test]
    fn test_unused_name_never_collides() {
        for n in 0..20 {
            let names: Vec<String> = (0..n)
                .filter(|i| i % 3 != 1)
                .map(|i| format!("p_{i}"))
                .collect();
            let existing = versions(&names.iter().map(String::as_str).collect::<Vec<_>>());
            let name = unused_version_name("p", &existing);
            assert!(!existing.iter().any(|v| v.name == name), "{name}");
        }
    }

    #[test]
    fn test_backup_comment() {
        let mut list = FlagVersionList::in_memory();
        let now = Epoch::from_gregorian_utc(2012, 1, 5, 13, 4, 5, 0);
        let name = backup_flags(&mut list, "flagcmd", now).unwrap();
        assert_eq!(name, "flagcmd_1");
        assert_eq!(
            list.versions()[0].comment,
            "flagcmd autosave on 2012-01-05 13:04:05"
        );
    }

    #[test]
    fn test_version_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let versions_dir = dir.path().join("test.ms.flagversions");
        let mut list = FlagVersionList::load(&versions_dir).unwrap();
        assert!(list.versions().is_empty());

        list.push(FlagVersion {
            name: "flagcmd_1".to_string(),
            comment: "first".to_string(),
        })
        .unwrap();
        list.push(FlagVersion {
            name: "flagcmd_2".to_string(),
            comment: "second".to_string(),
        })
        .unwrap();
        list.rename("flagcmd_1", "before_rflag", "renamed").unwrap();

        let contents =
            std::fs::read_to_string(versions_dir.join(FlagVersionList::FILE_NAME)).unwrap();
        assert_eq!(contents, "before_rflag : renamed\nflagcmd_2 : second\n");

        let reloaded = FlagVersionList::load(&versions_dir).unwrap();
        assert_eq!(reloaded.versions(), list.versions());
    }

    #[test]
    fn test_restore_and_rename_checks() {
        let mut list = FlagVersionList::in_memory();
        list.save_version("flagcmd_1", "a").unwrap();
        list.save_version("flagcmd_2", "b").unwrap();

        assert!(matches!(
            restore_flags(&mut list, "flagcmd_9"),
            Err(VersionError::NotFound(_))
        ));
        restore_flags(&mut list, "flagcmd_1").unwrap();

        assert!(matches!(
            rename_flags(&mut list, "flagcmd_1", "flagcmd_2", "c"),
            Err(VersionError::AlreadyExists(_))
        ));
        rename_flags(&mut list, "flagcmd_1", "good", "c").unwrap();
        assert_eq!(
            list.versions()[0],
            FlagVersion {
                name: "good".to_string(),
                comment: "c".to_string()
            }
        );
    }
}
