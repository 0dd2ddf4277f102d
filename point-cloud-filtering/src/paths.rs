/// File lookup and scratch file helpers
use crate::error::{FilteringError, Result};
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Resolve a filename to an existing path.
/// Absolute paths are taken as is, relative ones are tried against the
/// working directory first and the configured data directories after.
pub fn locate_file(filename: &Path, settings: &Settings) -> Result<PathBuf> {
    if filename.is_absolute() {
        return if filename.exists() {
            Ok(filename.to_path_buf())
        } else {
            Err(FilteringError::FileNotFound(filename.to_path_buf()))
        };
    }

    let candidates = std::iter::once(std::env::current_dir()?)
        .chain(settings.data_directories.iter().cloned());
    for directory in candidates {
        let candidate = directory.join(filename);
        if candidate.exists() {
            log::debug!("Located {} at {}", filename.display(), candidate.display());
            return Ok(candidate);
        }
    }

    Err(FilteringError::FileNotFound(filename.to_path_buf()))
}

/// Fresh temporary filename with the given extension, removed on drop.
pub fn temporary_file(extension: &str) -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("point-cloud-filtering-")
        .suffix(&format!(".{extension}"))
        .tempfile()?;
    Ok(file.into_temp_path())
}

/// Refuse to replace an existing file unless explicitly allowed
pub fn check_overwrite(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(FilteringError::WouldOverwrite {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_found_in_data_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tile.las"), b"").unwrap();
        let settings = Settings {
            data_directories: vec![dir.path().to_path_buf()],
            ..Settings::default()
        };

        let found = locate_file(Path::new("tile.las"), &settings).unwrap();
        assert_eq!(found, dir.path().join("tile.las"));
    }

    #[test]
    fn missing_files_are_reported() {
        let result = locate_file(Path::new("does-not-exist-4711.las"), &Settings::default());
        assert!(matches!(result, Err(FilteringError::FileNotFound(_))));

        let absolute = std::env::temp_dir().join("does-not-exist-4711.las");
        assert!(matches!(
            locate_file(&absolute, &Settings::default()),
            Err(FilteringError::FileNotFound(_))
        ));
    }

    #[test]
    fn temporary_files_carry_extension() {
        let path = temporary_file("tif").unwrap();
        assert_eq!(path.extension().unwrap(), "tif");
    }

    #[test]
    fn overwrite_requires_permission() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            check_overwrite(file.path(), false),
            Err(FilteringError::WouldOverwrite { .. })
        ));
        assert!(check_overwrite(file.path(), true).is_ok());
    }
}
