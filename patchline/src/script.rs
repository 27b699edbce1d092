//! Script lookup.
//!
//! Every major version line has exactly one setup script, any number of sequentially
//! numbered patch scripts (starting at 1), and optionally one migration script that turns a
//! database at the end of the line into the equivalent of the next line's setup.

use crate::dialect::Dialect;
use crate::error::Error;
use crate::version::SchemaVersion;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only source of setup, patch and migration scripts, keyed by version.
pub trait ScriptRepository {
    /// The script creating a fresh database at `(major, 0)`.
    fn setup_script(&self, major: u32) -> Result<String, Error>;

    /// The script advancing `(major, patch - 1)` to `(major, patch)`.
    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error>;

    /// The script advancing the end of line `from_major` to `(from_major + 1, 0)`.
    fn migrate_script(&self, from_major: u32) -> Result<String, Error>;

    /// Whether a patch script exists, without loading it.
    fn patch_exists(&self, major: u32, patch: u32) -> bool;
}

impl<R: ScriptRepository + ?Sized> ScriptRepository for &R {
    fn setup_script(&self, major: u32) -> Result<String, Error> {
        (**self).setup_script(major)
    }

    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error> {
        (**self).patch_script(major, patch)
    }

    fn migrate_script(&self, from_major: u32) -> Result<String, Error> {
        (**self).migrate_script(from_major)
    }

    fn patch_exists(&self, major: u32, patch: u32) -> bool {
        (**self).patch_exists(major, patch)
    }
}

impl<R: ScriptRepository + ?Sized> ScriptRepository for Arc<R> {
    fn setup_script(&self, major: u32) -> Result<String, Error> {
        (**self).setup_script(major)
    }

    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error> {
        (**self).patch_script(major, patch)
    }

    fn migrate_script(&self, from_major: u32) -> Result<String, Error> {
        (**self).migrate_script(from_major)
    }

    fn patch_exists(&self, major: u32, patch: u32) -> bool {
        (**self).patch_exists(major, patch)
    }
}

impl<R: ScriptRepository + ?Sized> ScriptRepository for Box<R> {
    fn setup_script(&self, major: u32) -> Result<String, Error> {
        (**self).setup_script(major)
    }

    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error> {
        (**self).patch_script(major, patch)
    }

    fn migrate_script(&self, from_major: u32) -> Result<String, Error> {
        (**self).migrate_script(from_major)
    }

    fn patch_exists(&self, major: u32, patch: u32) -> bool {
        (**self).patch_exists(major, patch)
    }
}

/// The kind of a script within a major version line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptKind {
    Setup,
    Patch(u32),
    Migrate,
}

impl ScriptKind {
    /// File name of this script inside a major version directory.
    pub fn file_name(&self) -> String {
        match self {
            ScriptKind::Setup => "setup.sql".to_string(),
            ScriptKind::Patch(patch) => format!("patch_{patch}.sql"),
            ScriptKind::Migrate => "migration.sql".to_string(),
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "setup.sql" => Some(ScriptKind::Setup),
            "migration.sql" => Some(ScriptKind::Migrate),
            _ => name
                .strip_prefix("patch_")?
                .strip_suffix(".sql")?
                .parse()
                .ok()
                .filter(|patch| *patch > 0)
                .map(ScriptKind::Patch),
        }
    }

    fn missing(&self, major: u32) -> Error {
        match self {
            ScriptKind::Setup => Error::MissingSetupScript(major),
            ScriptKind::Patch(patch) => Error::MissingPatchScript {
                major,
                patch: *patch,
            },
            ScriptKind::Migrate => Error::MissingMigrateScript(major),
        }
    }
}

/// Scripts stored on disk as `<root>/<dialect>/<major>/<kind>.sql`.
///
/// ```text
/// database/
/// ├── version                 # "2.1", read by `target_version()`
/// └── sqlite/
///     ├── 1/
///     │   ├── setup.sql
///     │   ├── patch_1.sql
///     │   └── migration.sql   # 1.x -> 2.0
///     └── 2/
///         ├── setup.sql
///         └── patch_1.sql
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    root: PathBuf,
    dialect: Dialect,
}

impl DirectoryRepository {
    pub fn new(root: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            root: root.into(),
            dialect,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The version stored in `<root>/version`.
    pub fn target_version(&self) -> Result<SchemaVersion, Error> {
        SchemaVersion::load(self.root.join("version"))
    }

    /// Every script available for this repository's dialect, ordered by major line and kind.
    ///
    /// Files and directories not following the layout are ignored.
    pub fn scripts(&self) -> Result<Vec<(u32, ScriptKind)>, Error> {
        let dialect_dir = self.root.join(self.dialect.name());
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::Io { path, source }
        };

        let mut scripts = Vec::new();
        for major_entry in std::fs::read_dir(&dialect_dir).map_err(io_err(&dialect_dir))? {
            let major_entry = major_entry.map_err(io_err(&dialect_dir))?;
            let Some(major) = major_entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            let major_dir = major_entry.path();
            if !major_dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&major_dir).map_err(io_err(&major_dir))? {
                let entry = entry.map_err(io_err(&major_dir))?;
                if let Some(kind) = entry.file_name().to_str().and_then(ScriptKind::from_file_name) {
                    scripts.push((major, kind));
                }
            }
        }
        scripts.sort();
        Ok(scripts)
    }

    fn path(&self, major: u32, kind: ScriptKind) -> PathBuf {
        self.root
            .join(self.dialect.name())
            .join(major.to_string())
            .join(kind.file_name())
    }

    fn load(&self, major: u32, kind: ScriptKind) -> Result<String, Error> {
        let path = self.path(major, kind);
        if !path.is_file() {
            return Err(kind.missing(major));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), "Loading script");

        std::fs::read_to_string(&path).map_err(|source| Error::Io { path, source })
    }
}

impl ScriptRepository for DirectoryRepository {
    fn setup_script(&self, major: u32) -> Result<String, Error> {
        self.load(major, ScriptKind::Setup)
    }

    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error> {
        self.load(major, ScriptKind::Patch(patch))
    }

    fn migrate_script(&self, from_major: u32) -> Result<String, Error> {
        self.load(from_major, ScriptKind::Migrate)
    }

    fn patch_exists(&self, major: u32, patch: u32) -> bool {
        self.path(major, ScriptKind::Patch(patch)).is_file()
    }
}

/// Scripts held in memory, typically compiled into the binary with `include_str!`.
///
/// ```
/// use patchline::{EmbeddedRepository, ScriptRepository};
///
/// let repo = EmbeddedRepository::new()
///     .setup(1, "CREATE TABLE users (id INTEGER PRIMARY KEY);")
///     .patch(1, 1, "ALTER TABLE users ADD COLUMN name TEXT;");
///
/// assert!(repo.patch_exists(1, 1));
/// assert!(!repo.patch_exists(1, 2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedRepository {
    scripts: BTreeMap<(u32, ScriptKind), Cow<'static, str>>,
}

impl EmbeddedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup(mut self, major: u32, script: impl Into<Cow<'static, str>>) -> Self {
        self.scripts.insert((major, ScriptKind::Setup), script.into());
        self
    }

    pub fn patch(mut self, major: u32, patch: u32, script: impl Into<Cow<'static, str>>) -> Self {
        self.scripts
            .insert((major, ScriptKind::Patch(patch)), script.into());
        self
    }

    pub fn migration(mut self, from_major: u32, script: impl Into<Cow<'static, str>>) -> Self {
        self.scripts
            .insert((from_major, ScriptKind::Migrate), script.into());
        self
    }

    /// Every registered script key, ordered by major line and kind.
    pub fn scripts(&self) -> impl Iterator<Item = (u32, ScriptKind)> + '_ {
        self.scripts.keys().copied()
    }

    fn load(&self, major: u32, kind: ScriptKind) -> Result<String, Error> {
        self.scripts
            .get(&(major, kind))
            .map(|script| script.to_string())
            .ok_or_else(|| kind.missing(major))
    }
}

impl ScriptRepository for EmbeddedRepository {
    fn setup_script(&self, major: u32) -> Result<String, Error> {
        self.load(major, ScriptKind::Setup)
    }

    fn patch_script(&self, major: u32, patch: u32) -> Result<String, Error> {
        self.load(major, ScriptKind::Patch(patch))
    }

    fn migrate_script(&self, from_major: u32) -> Result<String, Error> {
        self.load(from_major, ScriptKind::Migrate)
    }

    fn patch_exists(&self, major: u32, patch: u32) -> bool {
        self.scripts.contains_key(&(major, ScriptKind::Patch(patch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn directory_repository_resolves_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "version", "2.1\n");
        write(dir.path(), "sqlite/1/setup.sql", "CREATE TABLE a (id INT);");
        write(dir.path(), "sqlite/1/patch_1.sql", "ALTER TABLE a ADD COLUMN b INT;");
        write(dir.path(), "sqlite/1/migration.sql", "CREATE TABLE c (id INT);");
        write(dir.path(), "sqlite/2/setup.sql", "CREATE TABLE c (id INT);");
        write(dir.path(), "postgresql/1/patch_2.sql", "SELECT 1;");

        let repo = DirectoryRepository::new(dir.path(), Dialect::Sqlite);
        assert_eq!(repo.target_version().unwrap(), SchemaVersion::new(2, 1));
        assert_eq!(repo.setup_script(1).unwrap(), "CREATE TABLE a (id INT);");
        assert_eq!(
            repo.patch_script(1, 1).unwrap(),
            "ALTER TABLE a ADD COLUMN b INT;"
        );
        assert_eq!(repo.migrate_script(1).unwrap(), "CREATE TABLE c (id INT);");
        assert!(repo.patch_exists(1, 1));
        // patch_2 only exists for another dialect
        assert!(!repo.patch_exists(1, 2));
    }

    #[test]
    fn directory_repository_reports_missing_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DirectoryRepository::new(dir.path(), Dialect::Postgres);
        assert!(matches!(
            repo.setup_script(3),
            Err(Error::MissingSetupScript(3))
        ));
        assert!(matches!(
            repo.patch_script(3, 4),
            Err(Error::MissingPatchScript { major: 3, patch: 4 })
        ));
        assert!(matches!(
            repo.migrate_script(3),
            Err(Error::MissingMigrateScript(3))
        ));
    }

    #[test]
    fn directory_repository_lists_scripts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mysql/2/setup.sql", "");
        write(dir.path(), "mysql/1/patch_10.sql", "");
        write(dir.path(), "mysql/1/patch_2.sql", "");
        write(dir.path(), "mysql/1/setup.sql", "");
        write(dir.path(), "mysql/1/migration.sql", "");
        write(dir.path(), "mysql/1/notes.txt", "");
        write(dir.path(), "mysql/1/patch_0.sql", "");
        write(dir.path(), "mysql/drafts/setup.sql", "");

        let repo = DirectoryRepository::new(dir.path(), Dialect::Mysql);
        assert_eq!(
            repo.scripts().unwrap(),
            vec![
                (1, ScriptKind::Setup),
                (1, ScriptKind::Patch(2)),
                (1, ScriptKind::Patch(10)),
                (1, ScriptKind::Migrate),
                (2, ScriptKind::Setup),
            ]
        );
    }

    #[test]
    fn embedded_repository_lookup() {
        let repo = EmbeddedRepository::new()
            .setup(1, "setup one")
            .patch(1, 1, String::from("patch one"))
            .migration(1, "migrate one");

        assert_eq!(repo.setup_script(1).unwrap(), "setup one");
        assert_eq!(repo.patch_script(1, 1).unwrap(), "patch one");
        assert_eq!(repo.migrate_script(1).unwrap(), "migrate one");
        assert!(matches!(
            repo.setup_script(2),
            Err(Error::MissingSetupScript(2))
        ));
        assert_eq!(
            repo.scripts().collect::<Vec<_>>(),
            vec![
                (1, ScriptKind::Setup),
                (1, ScriptKind::Patch(1)),
                (1, ScriptKind::Migrate)
            ]
        );
    }
}
