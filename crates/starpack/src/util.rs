//! Path helpers shared by the CLI, the resolver and the directory walker

use std::{
    borrow::Cow,
    path::{Component, Path},
};

use cow_utils::CowUtils;

/// Rewrite `\` separators to `/` so module names are platform independent
pub fn normalize_separators(path: &str) -> Cow<'_, str> {
    path.cow_replace('\\', "/")
}

/// Module name for a path relative to the bundle root
///
/// Returns `None` when the normalized path does not end with `suffix`.
pub fn module_name_for(relative: &Path, suffix: &str) -> Option<String> {
    let lossy = relative.to_string_lossy();
    let normalized = normalize_separators(&lossy);
    let name = normalized.strip_prefix("./").unwrap_or(&normalized);
    name.strip_suffix(suffix)
        .filter(|stem| !stem.is_empty())
        .map(ToOwned::to_owned)
}

/// Module name for a single-file entry
///
/// Like [`module_name_for`], but the suffix is optional: `lib/main` and
/// `lib/main.star` name the same module.
pub fn entry_module_name(entry: &Path, suffix: &str) -> Option<String> {
    let lossy = entry.to_string_lossy();
    let normalized = normalize_separators(&lossy);
    let name = normalized.strip_prefix("./").unwrap_or(&normalized);
    let name = name
        .strip_suffix(suffix)
        .filter(|stem| !suffix.is_empty() && !stem.is_empty())
        .unwrap_or(name);
    (!name.is_empty()).then(|| name.to_owned())
}

/// Whether two paths name the same file
///
/// Paths match when their components agree once `.` segments are dropped,
/// or when both exist and canonicalize to the same location.
pub fn same_path(a: &Path, b: &Path) -> bool {
    fn lexical(path: &Path) -> Vec<Component<'_>> {
        path.components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect::<Vec<_>>()
    }
    if lexical(a) == lexical(b) {
        return true;
    }
    matches!((a.canonicalize(), b.canonicalize()), (Ok(a), Ok(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators(r"lib\geo.star"), "lib/geo.star");
        assert!(matches!(
            normalize_separators("lib/geo.star"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_module_name_for() {
        assert_eq!(
            module_name_for(&PathBuf::from("lib/geo.star"), ".star"),
            Some("lib/geo".to_owned())
        );
        assert_eq!(
            module_name_for(&PathBuf::from(r"lib\geo.star"), ".star"),
            Some("lib/geo".to_owned())
        );
        assert_eq!(
            module_name_for(&PathBuf::from("./main.star"), ".star"),
            Some("main".to_owned())
        );
        assert_eq!(module_name_for(&PathBuf::from("notes.txt"), ".star"), None);
        assert_eq!(module_name_for(&PathBuf::from(".star"), ".star"), None);
    }

    #[test]
    fn test_entry_module_name() {
        assert_eq!(
            entry_module_name(Path::new("lib/main.star"), ".star"),
            Some("lib/main".to_owned())
        );
        assert_eq!(
            entry_module_name(Path::new(r"lib\main"), ".star"),
            Some("lib/main".to_owned())
        );
        assert_eq!(
            entry_module_name(Path::new("./main"), ".star"),
            Some("main".to_owned())
        );
        assert_eq!(
            entry_module_name(Path::new("main.star"), ""),
            Some("main.star".to_owned())
        );
        assert_eq!(entry_module_name(Path::new(""), ".star"), None);
    }

    #[test]
    fn test_same_path() -> std::io::Result<()> {
        assert!(same_path(Path::new("out.spak"), Path::new("./out.spak")));
        assert!(same_path(Path::new("lib/./out.spak"), Path::new("lib/out.spak")));
        assert!(!same_path(Path::new("main.star"), Path::new("main.spak")));

        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join("sub"))?;
        fs::write(temp_dir.path().join("out.spak"), "")?;
        assert!(same_path(
            &temp_dir.path().join("sub/../out.spak"),
            &temp_dir.path().join("out.spak")
        ));
        Ok(())
    }
}
