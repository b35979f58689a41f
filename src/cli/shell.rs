//! Shell completion scripts and their installation
//!
//! | Shell | Script | Hook |
//! |-------|--------|------|
//! | bash | `~/.bash_completion.d/angreal` | `source` line in `~/.bashrc` |
//! | zsh | `<dir>/_angreal` | `fpath` line in `~/.zshrc` |
//!
//! The zsh directory is the first existing one of `~/.zsh/completions` and
//! `~/.oh-my-zsh/completions`, otherwise `~/.zsh_completions`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Comment tagging the lines angreal adds to rc files
const RC_MARKER: &str = "# angreal shell completion";

const BASH_SCRIPT: &str = r#"# angreal bash completion (generated by `angreal _completion bash`)

_angreal_completion() {
    local IFS=$'\n'
    local words=("${COMP_WORDS[@]:1:COMP_CWORD}")
    COMPREPLY=($(angreal _complete -- "${words[@]}" 2>/dev/null))
    if [ ${#COMPREPLY[@]} -eq 0 ]; then
        COMPREPLY=($(compgen -f -- "${COMP_WORDS[COMP_CWORD]}"))
    fi
    return 0
}

complete -F _angreal_completion angreal
"#;

const ZSH_SCRIPT: &str = r#"#compdef angreal
# angreal zsh completion (generated by `angreal _completion zsh`)

_angreal() {
    local -a candidates
    candidates=("${(@f)$(angreal _complete -- "${(@)words[2,CURRENT]}" 2>/dev/null)}")
    candidates=(${candidates:#})
    if (( ${#candidates} )); then
        compadd -a candidates
    else
        _files
    fi
}

if [[ "${funcstack[1]}" == "_angreal" ]]; then
    _angreal "$@"
else
    compdef _angreal angreal
fi
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    pub const ALL: [Shell; 2] = [Shell::Bash, Shell::Zsh];

    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
        }
    }

    /// The user's shell according to `$SHELL`
    pub fn detect() -> Option<Shell> {
        std::env::var("SHELL").ok().and_then(|path| Self::from_path(&path))
    }

    pub fn from_path(shell_path: &str) -> Option<Shell> {
        let name = Path::new(shell_path).file_name()?.to_str()?;
        match name {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            _ => None,
        }
    }

    pub fn script(&self) -> &'static str {
        match self {
            Shell::Bash => BASH_SCRIPT,
            Shell::Zsh => ZSH_SCRIPT,
        }
    }

    /// Where the script is (or would be) installed under `home`
    pub fn script_path(&self, home: &Path) -> PathBuf {
        match self {
            Shell::Bash => home.join(".bash_completion.d").join("angreal"),
            Shell::Zsh => zsh_dir(home).join("_angreal"),
        }
    }

    fn rc_file(&self, home: &Path) -> PathBuf {
        match self {
            Shell::Bash => home.join(".bashrc"),
            Shell::Zsh => home.join(".zshrc"),
        }
    }

    fn rc_lines(&self, script: &Path) -> String {
        match self {
            Shell::Bash => format!(
                "{}\n[ -f \"{path}\" ] && source \"{path}\"\n",
                RC_MARKER,
                path = script.display()
            ),
            Shell::Zsh => {
                let dir = script.parent().unwrap_or(script);
                format!(
                    "{}\nfpath=(\"{}\" $fpath)\nautoload -U compinit && compinit\n",
                    RC_MARKER,
                    dir.display()
                )
            }
        }
    }

    pub fn is_installed(&self, home: &Path) -> bool {
        self.installed_scripts(home).next().is_some()
    }

    /// Writes the script and hooks it into the rc file
    pub fn install(&self, home: &Path) -> Result<PathBuf> {
        let path = self.script_path(home);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&path, self.script())
            .with_context(|| format!("Failed to write completion script: {}", path.display()))?;

        let rc = self.rc_file(home);
        let content = match fs::read_to_string(&rc) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", rc.display()));
            }
        };
        if !content.contains(RC_MARKER) {
            let mut updated = content;
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&self.rc_lines(&path));
            fs::write(&rc, updated).with_context(|| format!("Failed to update {}", rc.display()))?;
        }

        Ok(path)
    }

    /// Removes installed scripts and the rc hook; returns what was removed
    pub fn uninstall(&self, home: &Path) -> Result<Vec<PathBuf>> {
        let removed: Vec<PathBuf> = self.installed_scripts(home).collect();
        for path in &removed {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove completion script: {}", path.display()))?;
        }

        let rc = self.rc_file(home);
        if let Ok(content) = fs::read_to_string(&rc) {
            if content.contains(RC_MARKER) {
                let hook = self.hook_len();
                let mut kept = Vec::new();
                let mut skip = 0;
                for line in content.lines() {
                    if skip > 0 {
                        skip -= 1;
                    } else if line == RC_MARKER {
                        skip = hook;
                    } else {
                        kept.push(line);
                    }
                }
                let mut updated = kept.join("\n");
                if !updated.is_empty() {
                    updated.push('\n');
                }
                fs::write(&rc, updated)
                    .with_context(|| format!("Failed to update {}", rc.display()))?;
            }
        }

        Ok(removed)
    }

    /// Lines following the marker in the rc hook
    fn hook_len(&self) -> usize {
        match self {
            Shell::Bash => 1,
            Shell::Zsh => 2,
        }
    }

    fn installed_scripts<'h>(&self, home: &'h Path) -> impl Iterator<Item = PathBuf> + 'h {
        let candidates = match self {
            Shell::Bash => vec![home.join(".bash_completion.d").join("angreal")],
            Shell::Zsh => zsh_candidates(home)
                .into_iter()
                .map(|dir| dir.join("_angreal"))
                .collect(),
        };
        candidates.into_iter().filter(|path| path.is_file())
    }
}

fn zsh_candidates(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join(".zsh").join("completions"),
        home.join(".oh-my-zsh").join("completions"),
        home.join(".zsh_completions"),
    ]
}

fn zsh_dir(home: &Path) -> PathBuf {
    let candidates = zsh_candidates(home);
    candidates
        .iter()
        .find(|dir| dir.is_dir())
        .cloned()
        .unwrap_or_else(|| home.join(".zsh_completions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scripts_register_the_completion_function() {
        let bash = Shell::Bash.script();
        assert!(bash.contains("_angreal_completion()"));
        assert!(bash.contains("complete -F _angreal_completion angreal"));

        let zsh = Shell::Zsh.script();
        assert!(zsh.starts_with("#compdef angreal"));
        assert!(zsh.contains("_angreal()"));
    }

    #[test]
    fn detect_from_shell_path() {
        assert_eq!(Shell::from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_path("/usr/local/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::from_path("/usr/bin/fish"), None);
    }

    #[test]
    fn bash_install_and_uninstall() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(".bashrc"), "export A=1").unwrap();

        let path = Shell::Bash.install(home.path()).unwrap();
        assert_eq!(path, home.path().join(".bash_completion.d/angreal"));
        assert!(Shell::Bash.is_installed(home.path()));

        Shell::Bash.install(home.path()).unwrap();
        let rc = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert_eq!(rc.matches(RC_MARKER).count(), 1);
        assert!(rc.contains("source"));

        let removed = Shell::Bash.uninstall(home.path()).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!Shell::Bash.is_installed(home.path()));
        let rc = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert_eq!(rc, "export A=1\n");
    }

    #[test]
    fn zsh_prefers_existing_directory() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            Shell::Zsh.script_path(home.path()),
            home.path().join(".zsh_completions/_angreal")
        );

        fs::create_dir_all(home.path().join(".oh-my-zsh/completions")).unwrap();
        let path = Shell::Zsh.install(home.path()).unwrap();
        assert_eq!(path, home.path().join(".oh-my-zsh/completions/_angreal"));

        let rc = fs::read_to_string(home.path().join(".zshrc")).unwrap();
        assert!(rc.contains("fpath="));
    }

    #[test]
    fn uninstall_without_install_removes_nothing() {
        let home = TempDir::new().unwrap();
        assert!(Shell::Zsh.uninstall(home.path()).unwrap().is_empty());
    }
}
