//! Path utilities

use std::path::{Path, PathBuf};

/// Sortie data directory (~/.sortie)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sortie")
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Where non-blocking sub-missions keep their manifests, logs and output
pub fn subagent_dir() -> PathBuf {
    data_dir().join("subagents")
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Resolve a user-supplied path: `~` expansion, then relative paths are
/// joined onto `base`.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().expect("Should have home dir");

        assert_eq!(expand_tilde("~/test"), home.join("test"));
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(
            expand_tilde("/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            expand_tilde("relative/path"),
            PathBuf::from("relative/path")
        );
    }

    #[test]
    fn test_resolve_path_relative_joins_base() {
        let base = Path::new("/srv/mission");
        assert_eq!(
            resolve_path("out/file.txt", base),
            PathBuf::from("/srv/mission/out/file.txt")
        );
        assert_eq!(resolve_path("/etc/hosts", base), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_paths_live_under_data_dir() {
        assert!(config_path().starts_with(data_dir()));
        assert!(subagent_dir().starts_with(data_dir()));
        assert!(config_path().ends_with("config.json"));
    }
}
