//! Migration files and their versions.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use derive_more::Deref;
use regex::Regex;

use crate::{PgError, PgResult, TRACING_TARGET_MIGRATION};

/// File extension of migration scripts.
const MIGRATION_EXTENSION: &str = "sql";

/// `YYYYMMDDTHHMMSSZ`, always in UTC.
static VERSION_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(\d{2})(\d{2})T(\d{2})(\d{2})(\d{2})Z$")
        .expect("migration version pattern is valid")
});

/// A single migration script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Schema the migration belongs to
    pub schema: String,
    /// Fixed-width UTC timestamp; ordering versions as strings orders them in time
    pub version: String,
    /// SQL executed verbatim when the migration is applied
    pub code: String,
}

impl Migration {
    /// Loads a migration from a `<version>.sql` file.
    pub async fn load_file(schema: &str, path: &Path) -> PgResult<Self> {
        let version = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| {
                PgError::migration(format!("invalid migration file name {}", path.display()))
            })?;

        validate_version(version).map_err(|_| {
            PgError::migration(format!(
                "invalid migration version {:?} in {}",
                version,
                path.display()
            ))
        })?;

        let code = tokio::fs::read_to_string(path).await.map_err(|err| {
            PgError::migration(format!("cannot read {}: {}", path.display(), err))
        })?;

        Ok(Self {
            schema: schema.to_owned(),
            version: version.to_owned(),
            code,
        })
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.schema, self.version)
    }
}

/// An ordered collection of migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct Migrations(Vec<Migration>);

impl Migrations {
    /// Creates a collection from already loaded migrations.
    pub fn new(migrations: impl Into<Vec<Migration>>) -> Self {
        Self(migrations.into())
    }

    /// Loads every `*.sql` file of `directory` as a migration of `schema`.
    ///
    /// Other entries are ignored. The whole load fails if one file name is
    /// not a valid version or one file cannot be read.
    #[tracing::instrument(target = TRACING_TARGET_MIGRATION)]
    pub async fn load_directory(schema: &str, directory: &Path) -> PgResult<Self> {
        let mut entries = tokio::fs::read_dir(directory).await.map_err(|err| {
            PgError::migration(format!(
                "cannot read directory {}: {}",
                directory.display(),
                err
            ))
        })?;

        let mut migrations = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|err| {
                PgError::migration(format!(
                    "cannot read directory {}: {}",
                    directory.display(),
                    err
                ))
            })?;

            let Some(entry) = entry else {
                break;
            };

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(MIGRATION_EXTENSION) {
                continue;
            }

            migrations.push(Migration::load_file(schema, &path).await?);
        }

        tracing::debug!(
            target: TRACING_TARGET_MIGRATION,
            schema,
            count = migrations.len(),
            "Loaded migrations"
        );

        Ok(Self(migrations))
    }

    /// Sorts migrations by ascending version.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.version.cmp(&b.version));
    }

    /// Removes every migration whose version is in `versions`.
    pub fn reject_versions(&mut self, versions: &HashSet<String>) {
        self.0.retain(|m| !versions.contains(&m.version));
    }

    /// Returns the versions in their current order.
    pub fn versions(&self) -> Vec<String> {
        self.0.iter().map(|m| m.version.clone()).collect()
    }

    /// Returns the inner list of migrations.
    pub fn into_inner(self) -> Vec<Migration> {
        self.0
    }
}

impl IntoIterator for Migrations {
    type IntoIter = std::vec::IntoIter<Migration>;
    type Item = Migration;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Migrations {
    type IntoIter = std::slice::Iter<'a, Migration>;
    type Item = &'a Migration;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Checks that `version` is a `YYYYMMDDTHHMMSSZ` timestamp naming a real
/// date and time.
pub fn validate_version(version: &str) -> PgResult<()> {
    let invalid = || PgError::migration(format!("invalid migration version {:?}", version));

    let captures = VERSION_FORMAT.captures(version).ok_or_else(invalid)?;
    let year: i16 = captures[1].parse().map_err(|_| invalid())?;
    let field = |index: usize| captures[index].parse::<i8>().map_err(|_| invalid());

    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);

    jiff::civil::DateTime::new(year, month, day, hour, minute, second, 0)
        .map(|_| ())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration(version: &str) -> Migration {
        Migration {
            schema: "core".into(),
            version: version.into(),
            code: String::new(),
        }
    }

    #[test]
    fn test_validate_version() {
        assert!(validate_version("20240101T000000Z").is_ok());
        assert!(validate_version("20241231T235959Z").is_ok());
        assert!(validate_version("20240229T120000Z").is_ok());

        assert!(validate_version("").is_err());
        assert!(validate_version("20240101").is_err());
        assert!(validate_version("20240101T000000").is_err());
        assert!(validate_version("2024-01-01T00:00:00Z").is_err());
        assert!(validate_version("20240101T000000Z.sql").is_err());
        assert!(validate_version("20241301T000000Z").is_err());
        assert!(validate_version("20230229T000000Z").is_err());
        assert!(validate_version("20240101T240000Z").is_err());
        assert!(validate_version("20240101T006000Z").is_err());
    }

    #[test]
    fn test_sort_is_chronological() {
        let mut migrations = Migrations::new(vec![
            migration("20240301T000000Z"),
            migration("20231231T235959Z"),
            migration("20240101T000001Z"),
            migration("20240101T000000Z"),
        ]);

        migrations.sort();

        assert_eq!(
            migrations.versions(),
            [
                "20231231T235959Z",
                "20240101T000000Z",
                "20240101T000001Z",
                "20240301T000000Z",
            ]
        );
    }

    #[test]
    fn test_reject_versions() {
        let mut migrations = Migrations::new(vec![
            migration("20240101T000000Z"),
            migration("20240102T000000Z"),
            migration("20240103T000000Z"),
        ]);

        let applied = HashSet::from([
            "20240102T000000Z".to_owned(),
            "20200101T000000Z".to_owned(),
        ]);
        migrations.reject_versions(&applied);

        assert_eq!(
            migrations.versions(),
            ["20240101T000000Z", "20240103T000000Z"]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            migration("20240101T000000Z").to_string(),
            "core-20240101T000000Z"
        );
    }

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("20240102T000000Z.sql"),
            "CREATE TABLE b ();",
        )
        .expect("write");
        std::fs::write(
            dir.path().join("20240101T000000Z.sql"),
            "CREATE TABLE a ();",
        )
        .expect("write");
        std::fs::write(dir.path().join("README.md"), "not a migration").expect("write");

        let mut migrations = Migrations::load_directory("core", dir.path())
            .await
            .expect("migrations should load");
        migrations.sort();

        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].schema, "core");
        assert_eq!(migrations[0].version, "20240101T000000Z");
        assert_eq!(migrations[0].code, "CREATE TABLE a ();");
        assert_eq!(migrations[1].version, "20240102T000000Z");
    }

    #[tokio::test]
    async fn test_load_directory_rejects_bad_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("20240101T000000Z.sql"), "SELECT 1;").expect("write");
        std::fs::write(dir.path().join("001_init.sql"), "SELECT 1;").expect("write");

        let err = Migrations::load_directory("core", dir.path())
            .await
            .expect_err("invalid file name should abort the load");

        assert!(matches!(err, PgError::Migration(_)));
        assert!(err.to_string().contains("001_init"));
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Migrations::load_directory("core", &dir.path().join("missing")).await;
        assert!(matches!(result, Err(PgError::Migration(_))));
    }

    #[tokio::test]
    async fn test_load_empty_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let migrations = Migrations::load_directory("core", dir.path())
            .await
            .expect("empty directory should load");
        assert!(migrations.is_empty());
    }
}
