//! Virtual working directory threaded through one plan execution.

use std::{
    env,
    path::{Component, Path, PathBuf},
};

use log::warn;

/// The directory steps of a plan run in.
///
/// It is never applied to the process; each child is started in it instead.
/// Only a successful `cd` step moves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: normalize(&path.into()),
        }
    }

    /// Starts from the process working directory.
    pub fn from_process() -> Self {
        match env::current_dir() {
            Ok(path) => Self::new(path),
            Err(e) => {
                warn!("Cannot read the process working directory, using '.': {e}");
                Self::new(".")
            }
        }
    }

    /// Starts from `path` when given, otherwise from the process directory.
    pub fn resume(path: Option<&Path>) -> Self {
        path.map_or_else(Self::from_process, Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Target of a leading `cd` in `command`, if any. Only the part before
    /// the first `&&`, `||`, `|` or `;` is considered.
    pub fn change_target(command: &str) -> Option<&str> {
        let end = command
            .find(['&', '|', ';'])
            .unwrap_or(command.len());
        let first = command[..end].trim();

        let rest = first.strip_prefix("cd")?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let target = strip_quotes(rest.trim());
        (!target.is_empty()).then_some(target)
    }

    /// Resolves `target` against this directory: absolute paths replace it,
    /// relative ones (including `..`) are joined, `~` expands to the home
    /// directory.
    pub fn resolve(&self, target: &str) -> PathBuf {
        let expanded = match target.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
                match dirs::home_dir() {
                    Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                    None => PathBuf::from(target),
                }
            }
            _ => PathBuf::from(target),
        };
        normalize(&self.path.join(expanded))
    }

    /// Applies a successfully executed command. Returns the new directory
    /// when the command was a directory change.
    pub fn apply(&mut self, command: &str) -> Option<&Path> {
        let target = Self::change_target(command)?;
        self.path = self.resolve(target);
        Some(&self.path)
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = normalized.components().next_back();
                match last {
                    Some(Component::Normal(_)) => {
                        normalized.pop();
                    }
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => normalized.push(component),
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_target() {
        assert_eq!(WorkingDirectory::change_target("cd /tmp"), Some("/tmp"));
        assert_eq!(WorkingDirectory::change_target("  cd  build "), Some("build"));
        assert_eq!(WorkingDirectory::change_target("cd src && make"), Some("src"));
        assert_eq!(WorkingDirectory::change_target("cd out; ls"), Some("out"));
        assert_eq!(WorkingDirectory::change_target("cd build || exit 1"), Some("build"));
        assert_eq!(WorkingDirectory::change_target("cd logs | tee out"), Some("logs"));
        assert_eq!(
            WorkingDirectory::change_target("cd \"my project\""),
            Some("my project")
        );
        assert_eq!(WorkingDirectory::change_target("cdrecord disk.iso"), None);
        assert_eq!(WorkingDirectory::change_target("ls && cd /tmp"), None);
        assert_eq!(WorkingDirectory::change_target("cd"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_relative_parent_and_absolute() {
        let mut dir = WorkingDirectory::new("/srv/app");

        assert_eq!(dir.apply("cd releases"), Some(Path::new("/srv/app/releases")));
        assert_eq!(dir.apply("cd .."), Some(Path::new("/srv/app")));
        assert_eq!(dir.apply("cd ../../var/./log"), Some(Path::new("/var/log")));
        assert_eq!(dir.apply("cd /opt"), Some(Path::new("/opt")));
        assert_eq!(dir.apply("echo hi"), None);
        assert_eq!(dir.path(), Path::new("/opt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_parent_of_root_stays_root() {
        let mut dir = WorkingDirectory::new("/");
        dir.apply("cd ..");
        assert_eq!(dir.path(), Path::new("/"));
    }

    #[test]
    fn test_resolve_expands_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let dir = WorkingDirectory::new(env::temp_dir());

        assert_eq!(dir.resolve("~"), normalize(&home));
        assert_eq!(dir.resolve("~/projects"), normalize(&home.join("projects")));
        assert_eq!(dir.resolve("~other"), normalize(&env::temp_dir().join("~other")));
    }

    #[test]
    fn test_resume_prefers_saved_directory() {
        let saved = env::temp_dir();
        assert_eq!(
            WorkingDirectory::resume(Some(saved.as_path())).path(),
            normalize(&saved)
        );
        assert_eq!(
            WorkingDirectory::resume(None),
            WorkingDirectory::from_process()
        );
    }
}
