use crate::dialect::{Dialect, DEFAULT_VERSION_TABLE_NAME};
use crate::error::Error;
use crate::hooks::{HookRegistry, HookStage};
use crate::plan::plan;
use crate::replacement::{apply_all, Replacement};
use crate::script::ScriptRepository;
use crate::version::SchemaVersion;
use std::fmt;
use std::time::{Duration, Instant};

/// One unit of work: a single script applied in its own transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStep {
    /// Initial setup of an empty database at `(major, 0)`.
    Setup { major: u32, script: String },
    /// Incremental patch within a major line, producing `(major, patch)`.
    Patch {
        major: u32,
        patch: u32,
        script: String,
    },
    /// Cross-major migration, producing `(from_major + 1, 0)`.
    Migrate { from_major: u32, script: String },
}

impl MigrationStep {
    /// The version recorded once this step is committed.
    pub fn resulting_version(&self) -> SchemaVersion {
        match self {
            MigrationStep::Setup { major, .. } => SchemaVersion::new(*major, 0),
            MigrationStep::Patch { major, patch, .. } => SchemaVersion::new(*major, *patch),
            MigrationStep::Migrate { from_major, .. } => SchemaVersion::new(from_major + 1, 0),
        }
    }

    pub fn script(&self) -> &str {
        match self {
            MigrationStep::Setup { script, .. }
            | MigrationStep::Patch { script, .. }
            | MigrationStep::Migrate { script, .. } => script,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MigrationStep::Setup { .. } => "setup",
            MigrationStep::Patch { .. } => "patch",
            MigrationStep::Migrate { .. } => "migration",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::Setup { major, .. } => write!(f, "setup of version {major}"),
            MigrationStep::Patch { major, patch, .. } => write!(f, "patch {major}.{patch}"),
            MigrationStep::Migrate { from_major, .. } => {
                write!(f, "migration {} -> {}", from_major, from_major + 1)
            }
        }
    }
}

/// A report of actions performed during an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// The version table was empty, so the target major's setup script was run.
    pub bootstrapped: bool,
    /// The version recorded before the update; `None` when the database was bootstrapped.
    pub previous_version: Option<SchemaVersion>,
    /// Versions committed during this update, in order.
    pub steps_applied: Vec<SchemaVersion>,
    /// The version recorded after the update.
    pub version: SchemaVersion,
}

impl UpdateReport {
    pub fn is_noop(&self) -> bool {
        self.steps_applied.is_empty()
    }
}

/// Database-specific half of an update run: the version store and the step executor.
///
/// Implementations exist for every enabled database feature. Each call that writes opens
/// and finishes its own transaction.
pub trait Backend {
    /// Create the version table if it does not exist.
    /// Returns true if the table holds no version row, meaning the database needs setup.
    fn ensure_consistent(&mut self) -> Result<bool, Error>;

    /// The recorded version, or `None` if the version table is missing or empty.
    /// Never creates anything.
    fn stored_version(&mut self) -> Result<Option<SchemaVersion>, Error>;

    /// The recorded version. Fails if no version row exists.
    fn current_version(&mut self) -> Result<SchemaVersion, Error> {
        self.stored_version()?
            .ok_or_else(|| Error::VersionUnreadable("the version table is empty".to_string()))
    }

    /// Apply a step atomically: hooks, statements and the version change commit together
    /// or not at all.
    fn apply_step(&mut self, step: &MigrationStep) -> Result<(), Error>;
}

/// The transaction a step executes in, as seen by [GenericUpdater::execute_step].
pub(crate) trait StepTransaction {
    type Hook: ?Sized;

    fn run_hook(&mut self, hook: &Self::Hook) -> Result<(), Error>;

    fn execute(&mut self, statement: &str) -> Result<(), Error>;

    /// Replace the version row. Must be the last write of the transaction.
    fn write_version(&mut self, version: SchemaVersion) -> Result<(), Error>;
}

type StepCallback = Box<dyn Fn(&MigrationStep) + Send + Sync>;
type StepCompleteCallback = Box<dyn Fn(&MigrationStep, Duration) + Send + Sync>;
type StepErrorCallback = Box<dyn Fn(&MigrationStep, &Error) + Send + Sync>;

/// Shared updater logic between different database types.
pub(crate) struct GenericUpdater<F: ?Sized> {
    pub repository: Box<dyn ScriptRepository + Send + Sync>,
    pub target: SchemaVersion,
    pub dialect: Dialect,
    pub version_table: String,
    pub replacements: Vec<Replacement>,
    pub hooks: HookRegistry<F>,
    pub on_step_start: Option<StepCallback>,
    pub on_step_complete: Option<StepCompleteCallback>,
    pub on_step_error: Option<StepErrorCallback>,
}

// Manual Debug impl since closures don't implement Debug
impl<F: ?Sized> fmt::Debug for GenericUpdater<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericUpdater")
            .field("target", &self.target)
            .field("dialect", &self.dialect)
            .field("version_table", &self.version_table)
            .field("replacements", &self.replacements)
            .field("hooks", &self.hooks)
            .field("on_step_start", &self.on_step_start.is_some())
            .field("on_step_complete", &self.on_step_complete.is_some())
            .field("on_step_error", &self.on_step_error.is_some())
            .finish()
    }
}

impl<F: ?Sized> GenericUpdater<F> {
    pub fn new(
        repository: impl ScriptRepository + Send + Sync + 'static,
        target: SchemaVersion,
        dialect: Dialect,
    ) -> Self {
        Self {
            repository: Box::new(repository),
            target,
            dialect,
            version_table: DEFAULT_VERSION_TABLE_NAME.to_string(),
            replacements: Vec::new(),
            hooks: HookRegistry::new(),
            on_step_start: None,
            on_step_complete: None,
            on_step_error: None,
        }
    }

    /// Bring the database behind `backend` to the target version.
    pub fn run<B: Backend>(&self, backend: &mut B) -> Result<UpdateReport, Error> {
        let target = self.target;
        let bootstrapped = backend.ensure_consistent()?;
        let mut steps_applied = Vec::new();

        if bootstrapped {
            #[cfg(feature = "tracing")]
            tracing::info!(
                version_table = %self.version_table,
                major = target.major,
                "Version table is empty. Attempting database setup"
            );

            let setup = MigrationStep::Setup {
                major: target.major,
                script: self.repository.setup_script(target.major)?,
            };
            self.apply(backend, &setup)?;
            steps_applied.push(setup.resulting_version());

            #[cfg(feature = "tracing")]
            tracing::info!("Initial setup complete. Ready to patch");
        }

        let current = backend.current_version()?;
        let previous_version = (!bootstrapped).then_some(current);

        if current == target {
            #[cfg(feature = "tracing")]
            tracing::info!(version = %current, "Database is up to date. No update is required");

            return Ok(UpdateReport {
                bootstrapped,
                previous_version,
                steps_applied,
                version: current,
            });
        }

        let steps = plan(current, target, &self.repository)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            current = %current,
            target = %target,
            pending = steps.len(),
            "Database is behind. Performing update"
        );

        for step in &steps {
            self.apply(backend, step)?;
            steps_applied.push(step.resulting_version());
        }

        let version = steps_applied.last().copied().unwrap_or(current);
        if version != target {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                version = %version,
                target = %target,
                "No further patches available. Stopping below the target version"
            );
        }

        #[cfg(feature = "tracing")]
        tracing::info!(version = %version, "Database update was successful");

        Ok(UpdateReport {
            bootstrapped,
            previous_version,
            steps_applied,
            version,
        })
    }

    /// The steps [run](Self::run) would apply, without changing anything.
    ///
    /// For a database without a version row this is the setup step of the target major,
    /// followed by the patches planned from the version that setup produces.
    pub fn preview<B: Backend>(&self, backend: &mut B) -> Result<Vec<MigrationStep>, Error> {
        let Some(current) = backend.stored_version()? else {
            let major = self.target.major;
            let mut steps = vec![MigrationStep::Setup {
                major,
                script: self.repository.setup_script(major)?,
            }];
            steps.extend(plan(
                SchemaVersion::new(major, 0),
                self.target,
                &self.repository,
            )?);
            return Ok(steps);
        };
        plan(current, self.target, &self.repository)
    }

    /// Apply one step through the backend, reporting it to callbacks and logs.
    fn apply<B: Backend>(&self, backend: &mut B, step: &MigrationStep) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "patchline_step",
            version = %step.resulting_version(),
            kind = step.kind()
        )
        .entered();

        #[cfg(feature = "tracing")]
        tracing::info!("Applying {}", step);

        if let Some(ref callback) = self.on_step_start {
            callback(step);
        }

        let started = Instant::now();
        match backend.apply_step(step) {
            Ok(()) => {
                let duration = started.elapsed();

                #[cfg(feature = "tracing")]
                match step {
                    MigrationStep::Patch { major, patch, .. } => tracing::info!(
                        duration_ms = duration.as_millis(),
                        "Deployed patch {}.{} to database",
                        major,
                        patch
                    ),
                    _ => tracing::info!(
                        duration_ms = duration.as_millis(),
                        "Migrated database to version {}",
                        step.resulting_version().major
                    ),
                }

                if let Some(ref callback) = self.on_step_complete {
                    callback(step, duration);
                }
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %error, "Database update failed");

                if let Some(ref callback) = self.on_step_error {
                    callback(step, &error);
                }
                Err(Error::MigrationFailed {
                    step: step.clone(),
                    source: Box::new(error),
                })
            }
        }
    }

    /// Run a step's hooks, statements and version change inside `tx`.
    ///
    /// The caller commits afterwards; on error it drops the transaction instead.
    /// Setup steps run without hooks since there is no schema for a hook to act on yet.
    pub(crate) fn execute_step<T>(&self, tx: &mut T, step: &MigrationStep) -> Result<(), Error>
    where
        T: StepTransaction<Hook = F>,
    {
        let version = step.resulting_version();
        let run_hooks = !matches!(step, MigrationStep::Setup { .. });

        if run_hooks {
            self.run_hook(tx, HookStage::Pre, version)?;
        }

        for statement in self.dialect.split_statements(step.script()) {
            let statement = apply_all(&self.replacements, &statement);
            if let Err(source) = tx.execute(&statement) {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %source, "Failed to execute statement:\n{}", statement);

                return Err(Error::StatementExecution {
                    statement,
                    source: Box::new(source),
                });
            }
        }

        if run_hooks {
            self.run_hook(tx, HookStage::Post, version)?;
        }

        tx.write_version(version).map_err(|source| {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %source, "Failed to change database version");

            Error::VersionPersistence {
                version,
                source: Box::new(source),
            }
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(version = %version, "Set database version");

        Ok(())
    }

    fn run_hook<T>(&self, tx: &mut T, stage: HookStage, version: SchemaVersion) -> Result<(), Error>
    where
        T: StepTransaction<Hook = F>,
    {
        let Some(hook) = self.hooks.get(stage, version) else {
            return Ok(());
        };

        #[cfg(feature = "tracing")]
        tracing::info!("Running {} update hook", stage);

        tx.run_hook(hook).map_err(|source| Error::Hook {
            stage,
            version,
            source: Box::new(source),
        })?;

        #[cfg(feature = "tracing")]
        tracing::info!("{} update hook applied", stage);

        Ok(())
    }
}
