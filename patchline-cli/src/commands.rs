//! Command implementations. Each writes its human-readable output to `out`.

use crate::cli::GlobalArgs;
use crate::session::{resolve_dialect, Session};
use patchline::{DirectoryRepository, ScriptKind};
use std::error::Error;
use std::io::Write;

pub fn status(session: &mut Session, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let target = session.target();
    match session.current_version()? {
        None => {
            writeln!(out, "Current version: none (database not set up)")?;
            writeln!(out, "Target version:  {target}")?;
        }
        Some(current) => {
            writeln!(out, "Current version: {current}")?;
            writeln!(out, "Target version:  {target}")?;
            if current.is_newer(&target) {
                writeln!(out, "Database is ahead of the scripts.")?;
                return Ok(());
            }
        }
    }

    let pending = session.preview()?;
    if pending.is_empty() {
        writeln!(out, "Up to date.")?;
    } else {
        writeln!(out, "Pending steps: {}", pending.len())?;
    }
    Ok(())
}

pub fn upgrade(session: &mut Session, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let report = session.run()?;
    if report.is_noop() {
        writeln!(out, "Already at version {}.", report.version)?;
        return Ok(());
    }

    match report.previous_version {
        Some(previous) => writeln!(out, "Updated from {} to {}:", previous, report.version)?,
        None => writeln!(out, "Set up database at version {}:", report.version)?,
    }
    for version in &report.steps_applied {
        writeln!(out, "  applied {version}")?;
    }
    Ok(())
}

pub fn preview(session: &mut Session, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let steps = session.preview()?;
    if steps.is_empty() {
        writeln!(out, "No pending steps.")?;
        return Ok(());
    }

    writeln!(out, "Pending steps ({}):", steps.len())?;
    for step in &steps {
        writeln!(out, "  {:<8} {}", step.resulting_version().to_string(), step)?;
    }
    Ok(())
}

/// List the scripts on disk. Needs no database, only a dialect.
pub fn list(args: &GlobalArgs, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let dialect = resolve_dialect(args)?;
    let repository = DirectoryRepository::new(&args.scripts, dialect);
    let scripts = repository.scripts()?;

    if scripts.is_empty() {
        writeln!(out, "No {dialect} scripts found in {}.", args.scripts.display())?;
        return Ok(());
    }

    match repository.target_version() {
        Ok(target) => writeln!(out, "Target version: {target}")?,
        Err(e) => writeln!(out, "Target version: unknown ({e})")?,
    }
    writeln!(out, "Scripts for {dialect} ({}):", scripts.len())?;
    for (major, kind) in scripts {
        let label = match kind {
            ScriptKind::Setup => format!("setup {major}.0"),
            ScriptKind::Patch(patch) => format!("patch {major}.{patch}"),
            ScriptKind::Migrate => match major.checked_add(1) {
                Some(next) => format!("migration {major} -> {next}.0"),
                None => format!("migration {major}"),
            },
        };
        writeln!(out, "  {:<20} {}/{}", label, major, kind.file_name())?;
    }
    Ok(())
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_scripts(root: &Path) {
        let v1 = root.join("sqlite").join("1");
        let v2 = root.join("sqlite").join("2");
        fs::create_dir_all(&v1).unwrap();
        fs::create_dir_all(&v2).unwrap();
        fs::write(root.join("version"), "2.1\n").unwrap();
        fs::write(v1.join("setup.sql"), "CREATE TABLE items (id INTEGER PRIMARY KEY);").unwrap();
        fs::write(v1.join("patch_1.sql"), "ALTER TABLE items ADD COLUMN name TEXT;").unwrap();
        fs::write(v1.join("migration.sql"), "ALTER TABLE items ADD COLUMN price INTEGER;").unwrap();
        fs::write(
            v2.join("setup.sql"),
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, price INTEGER);",
        )
        .unwrap();
        fs::write(v2.join("patch_1.sql"), "CREATE INDEX items_name ON items (name);").unwrap();
        fs::write(v2.join("notes.txt"), "ignored").unwrap();
    }

    fn args(dir: &TempDir, extra: &[&str]) -> GlobalArgs {
        let db = dir.path().join("app.db");
        let db_url = format!("sqlite://{}", db.display());
        let scripts = dir.path().join("database");
        let scripts = scripts.to_str().unwrap();
        let mut argv = vec![
            "patchline",
            "status",
            "--database-url",
            db_url.as_str(),
            "--scripts",
            scripts,
        ];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().global
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<(), Box<dyn Error>>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn list_without_database() {
        let dir = TempDir::new().unwrap();
        write_scripts(&dir.path().join("database"));
        let mut args = args(&dir, &["--dialect", "sqlite"]);
        args.database_url = None;

        let text = output(|out| list(&args, out));
        assert!(text.contains("Target version: 2.1"));
        assert!(text.contains("Scripts for sqlite (5):"));
        assert!(text.contains("migration 1 -> 2.0"));
        assert!(text.contains("1/migration.sql"));
        assert!(text.contains("2/patch_1.sql"));
        assert!(!text.contains("notes.txt"));
    }

    #[test]
    fn list_labels_last_possible_major() {
        let dir = TempDir::new().unwrap();
        let major_dir = dir.path().join("sqlite").join(u32::MAX.to_string());
        fs::create_dir_all(&major_dir).unwrap();
        fs::write(major_dir.join("migration.sql"), "SELECT 1;").unwrap();
        let mut args = args(&dir, &["--dialect", "sqlite"]);
        args.scripts = dir.path().to_path_buf();

        let text = output(|out| list(&args, out));
        assert!(text.contains(&format!("migration {}", u32::MAX)));
        assert!(!text.contains("->"));
    }

    #[test]
    fn status_upgrade_preview() {
        let dir = TempDir::new().unwrap();
        write_scripts(&dir.path().join("database"));
        let args = args(&dir, &[]);
        let mut session = Session::open(&args).unwrap();

        let text = output(|out| status(&mut session, out));
        assert!(text.contains("Current version: none"));
        assert!(text.contains("Target version:  2.1"));
        assert!(text.contains("Pending steps: 2"));

        let text = output(|out| preview(&mut session, out));
        assert!(text.contains("Pending steps (2):"));
        assert!(text.contains("2.0      setup of version 2"));
        assert!(text.contains("2.1      patch 2.1"));

        let text = output(|out| upgrade(&mut session, out));
        assert!(text.contains("Set up database at version 2.1:"));
        assert!(text.contains("applied 2.0"));
        assert!(text.contains("applied 2.1"));

        let text = output(|out| upgrade(&mut session, out));
        assert_eq!(text, "Already at version 2.1.\n");

        let text = output(|out| status(&mut session, out));
        assert!(text.contains("Current version: 2.1"));
        assert!(text.contains("Up to date."));
    }

    #[test]
    fn upgrade_across_majors_with_explicit_target() {
        let dir = TempDir::new().unwrap();
        write_scripts(&dir.path().join("database"));

        let mut old = Session::open(&args(&dir, &["--target", "1.0"])).unwrap();
        output(|out| upgrade(&mut old, out));
        drop(old);

        let mut session = Session::open(&args(&dir, &[])).unwrap();
        let text = output(|out| preview(&mut session, out));
        assert!(text.contains("Pending steps (3):"));
        assert!(text.contains("1.1      patch 1.1"));
        assert!(text.contains("2.0      migration 1 -> 2"));
        assert!(text.contains("2.1      patch 2.1"));

        let text = output(|out| upgrade(&mut session, out));
        assert!(text.contains("Updated from 1.0 to 2.1:"));
    }

    #[test]
    fn status_reports_database_ahead() {
        let dir = TempDir::new().unwrap();
        write_scripts(&dir.path().join("database"));

        let mut newer = Session::open(&args(&dir, &[])).unwrap();
        output(|out| upgrade(&mut newer, out));
        drop(newer);

        let mut older = Session::open(&args(&dir, &["--target", "1.1"])).unwrap();
        let text = output(|out| status(&mut older, out));
        assert!(text.contains("Database is ahead of the scripts."));
        assert!(upgrade(&mut older, &mut std::io::sink()).is_err());
    }
}
