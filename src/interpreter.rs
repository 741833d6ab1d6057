// file: src/interpreter.rs
// description: resolves the executable used to launch stage scripts
// reference: virtual environment layout conventions

use crate::config::InterpreterConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(windows)]
const DEFAULT_INTERPRETER: &str = "python";
#[cfg(not(windows))]
const DEFAULT_INTERPRETER: &str = "python3";

/// Interpreter inside a virtual environment directory.
pub fn venv_interpreter(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Pick the interpreter for stage processes.
///
/// Order: explicit path, the active virtual environment, the project's own
/// virtual environment if it exists, then whatever is on `PATH`.
pub fn resolve_interpreter(config: &InterpreterConfig) -> PathBuf {
    resolve_with(config, std::env::var_os("VIRTUAL_ENV").map(PathBuf::from))
}

fn resolve_with(config: &InterpreterConfig, active_venv: Option<PathBuf>) -> PathBuf {
    if let Some(path) = config.path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        debug!("Using configured interpreter {}", path.display());
        return path.clone();
    }

    if let Some(venv) = active_venv {
        let candidate = venv_interpreter(&venv);
        debug!("Using active virtual environment {}", venv.display());
        return candidate;
    }

    let project_venv = venv_interpreter(&config.project_root.join(&config.venv_dir));
    if project_venv.exists() {
        debug!("Using project virtual environment {}", project_venv.display());
        return project_venv;
    }

    PathBuf::from(DEFAULT_INTERPRETER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path) -> InterpreterConfig {
        InterpreterConfig {
            path: None,
            venv_dir: PathBuf::from("venv"),
            project_root: root.to_path_buf(),
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.path = Some(PathBuf::from("/opt/python/bin/python3.12"));

        let resolved = resolve_with(&cfg, Some(PathBuf::from("/elsewhere")));
        assert_eq!(resolved, PathBuf::from("/opt/python/bin/python3.12"));
    }

    #[test]
    fn test_active_venv_before_project_venv() {
        let temp = TempDir::new().unwrap();
        let resolved = resolve_with(&config(temp.path()), Some(PathBuf::from("/work/.venv")));
        assert_eq!(resolved, venv_interpreter(Path::new("/work/.venv")));
    }

    #[test]
    fn test_project_venv_used_when_present() {
        let temp = TempDir::new().unwrap();
        let python = venv_interpreter(&temp.path().join("venv"));
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, "").unwrap();

        assert_eq!(resolve_with(&config(temp.path()), None), python);
    }

    #[test]
    fn test_falls_back_to_path_lookup() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            resolve_with(&config(temp.path()), None),
            PathBuf::from(DEFAULT_INTERPRETER)
        );
    }
}
