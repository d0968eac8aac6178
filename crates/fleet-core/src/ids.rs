//! Identifier validation and path canonicalization

use crate::error::{FleetError, FleetResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

static SAFE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid id regex"));

static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

const MAX_ID_LEN: usize = 80;

/// Validate an identifier used as a file name inside the team namespace.
pub fn validate_id(kind: &str, value: &str) -> FleetResult<()> {
    if value.is_empty() || value.len() > MAX_ID_LEN {
        return Err(FleetError::validation_field(
            format!("{} must be 1-{} characters: {:?}", kind, MAX_ID_LEN, value),
            kind,
        ));
    }
    if !SAFE_ID_RE.is_match(value) || value.contains("..") {
        return Err(FleetError::validation_field(
            format!("{} contains unsupported characters: {:?}", kind, value),
            kind,
        ));
    }
    Ok(())
}

/// Lowercase, collapse non-alphanumerics into `-`, trim separators.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "team".to_string()
    } else {
        slug.chars().take(MAX_ID_LEN).collect()
    }
}

/// Canonical absolute form of a path for conflict detection.
///
/// Existing paths resolve symlinks. Paths that do not exist yet are made
/// absolute against `base` and have `.`/`..` segments folded, with the
/// deepest existing ancestor still resolved through the filesystem.
pub fn canonical_path(raw: &str, base: &Path) -> String {
    let expanded = shellexpand::tilde(raw).into_owned();
    let path = Path::new(&expanded);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    if let Ok(resolved) = absolute.canonicalize() {
        return resolved.to_string_lossy().into_owned();
    }

    let folded = fold_segments(&absolute);
    let mut tail = Vec::new();
    let mut cursor = folded.as_path();
    while let Some(parent) = cursor.parent() {
        if let Some(name) = cursor.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(resolved) = parent.canonicalize() {
            let mut out = resolved;
            for name in tail.iter().rev() {
                out.push(name);
            }
            return out.to_string_lossy().into_owned();
        }
        cursor = parent;
    }
    folded.to_string_lossy().into_owned()
}

fn fold_segments(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("task", "T-1.a_b").is_ok());
        assert!(validate_id("task", "").is_err());
        assert!(validate_id("task", "a/b").is_err());
        assert!(validate_id("task", "a..b").is_err());
        assert!(validate_id("task", "has space").is_err());
        assert!(validate_id("task", &"x".repeat(81)).is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Payments Rewrite!"), "payments-rewrite");
        assert_eq!(slugify("  --Alpha__Beta--  "), "alpha-beta");
        assert_eq!(slugify("???"), "team");
    }

    #[test]
    fn test_canonical_path_folds_relative_segments() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        std::fs::create_dir_all(base.join("src")).unwrap();

        let a = canonical_path("src/../src/./main.rs", base);
        let b = canonical_path(&base.join("src/main.rs").to_string_lossy(), base);
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_canonical_path_resolves_symlinks() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(&real).unwrap();
        std::fs::write(real.join("x.go"), "").unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("link")).unwrap();

        assert_eq!(
            canonical_path("link/x.go", dir.path()),
            canonical_path("real/x.go", dir.path())
        );
    }
}
