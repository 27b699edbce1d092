use crate::core::MigrationStep;
use crate::error::Error;
use crate::script::ScriptRepository;
use crate::version::SchemaVersion;

/// Compute the ordered steps taking a database from `current` to `target`.
///
/// Within a major line the next patch is applied while its script exists. When the line runs
/// out of patches and the target lies in a later major, the line's migration script carries
/// the database to `(major + 1, 0)`. Planning stops early if the target's own line has no
/// further patches, so the result may end below `target`.
///
/// Nothing is executed. The repository is not consulted when `current` is ahead of `target`.
///
/// ```
/// use patchline::{plan, EmbeddedRepository, SchemaVersion};
///
/// let repo = EmbeddedRepository::new()
///     .patch(1, 1, "ALTER TABLE users ADD COLUMN email TEXT;")
///     .migration(1, "ALTER TABLE users RENAME TO accounts;");
///
/// let steps = plan(SchemaVersion::new(1, 0), SchemaVersion::new(2, 0), &repo).unwrap();
/// let versions: Vec<_> = steps.iter().map(|s| s.resulting_version().to_string()).collect();
/// assert_eq!(versions, ["1.1", "2.0"]);
/// ```
pub fn plan<R>(
    current: SchemaVersion,
    target: SchemaVersion,
    repository: &R,
) -> Result<Vec<MigrationStep>, Error>
where
    R: ScriptRepository + ?Sized,
{
    if current == target {
        return Ok(vec![]);
    }
    if current > target {
        return Err(Error::VersionAhead { current, target });
    }

    let mut steps = Vec::new();
    let SchemaVersion {
        mut major,
        mut patch,
    } = current;

    while major <= target.major {
        if major == target.major && patch >= target.patch {
            break;
        }

        let next_patch = patch
            .checked_add(1)
            .filter(|next| repository.patch_exists(major, *next));
        if let Some(next) = next_patch {
            patch = next;
            steps.push(MigrationStep::Patch {
                major,
                patch,
                script: repository.patch_script(major, patch)?,
            });
        } else if major < target.major {
            steps.push(MigrationStep::Migrate {
                from_major: major,
                script: repository.migrate_script(major)?,
            });
            major += 1;
            patch = 0;
        } else {
            break;
        }
    }

    Ok(steps)
}
