//! Command risk classification.
//!
//! Classification depends only on the command text and the static tables in
//! this module. The order of checks is:
//!
//! 1. forbidden literal patterns over the whole command
//! 2. an allow-listed read-only leading command or prefix is safe
//! 3. dangerous leading tokens, per shell segment (`a && b | c` has three)
//! 4. fallback substring patterns (recursive-force flags, chained deletion,
//!    writes into device files, piping into a shell)
//! 5. otherwise safe

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Risk tier of a command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// May run without confirmation
    Safe,
    /// Runs only when the caller forces execution
    RequiresConfirmation,
    /// Never runs
    Forbidden,
}

impl RiskLevel {
    /// Wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::RequiresConfirmation => "requires_confirmation",
            RiskLevel::Forbidden => "forbidden",
        }
    }
}

/// Category of a dangerous leading command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Destructive,
    SystemModification,
    RegistryModification,
    NetworkSecurity,
}

impl RiskCategory {
    /// Wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Destructive => "destructive",
            RiskCategory::SystemModification => "system_modification",
            RiskCategory::RegistryModification => "registry_modification",
            RiskCategory::NetworkSecurity => "network_security",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RiskCategory::Destructive => "destructive operation",
            RiskCategory::SystemModification => "system modification",
            RiskCategory::RegistryModification => "registry modification",
            RiskCategory::NetworkSecurity => "network security change",
        }
    }

    fn commands(&self) -> &'static [&'static str] {
        match self {
            RiskCategory::Destructive => DESTRUCTIVE_COMMANDS,
            RiskCategory::SystemModification => SYSTEM_MODIFICATION_COMMANDS,
            RiskCategory::RegistryModification => REGISTRY_COMMANDS,
            RiskCategory::NetworkSecurity => NETWORK_SECURITY_COMMANDS,
        }
    }

    fn suggestions(&self) -> &'static [&'static str] {
        match self {
            RiskCategory::Destructive => &[
                "Use the interactive form (e.g. `rm -i`) to confirm each deletion",
                "List the targets first (e.g. `ls <path>`) to verify what will be removed",
                "Move files to a backup location instead of deleting them",
            ],
            RiskCategory::SystemModification => &[
                "Review exactly what will change before running with elevated privileges",
                "Prefer the narrowest change (e.g. `chmod u+x` over `chmod 777`)",
                "Record the current state so the change can be reverted",
            ],
            RiskCategory::RegistryModification => &[
                "Export the affected key first (`reg export <key> backup.reg`)",
                "Create a system restore point before editing the registry",
            ],
            RiskCategory::NetworkSecurity => &[
                "Save the current rules first (e.g. `iptables-save > rules.bak`)",
                "Make sure the change cannot cut off your own remote access",
                "Only scan or listen on hosts and ports you are authorized to use",
            ],
        }
    }

    const ALL: [RiskCategory; 4] = [
        RiskCategory::Destructive,
        RiskCategory::SystemModification,
        RiskCategory::RegistryModification,
        RiskCategory::NetworkSecurity,
    ];
}

/// A literal pattern that makes a command forbidden.
struct ForbiddenRule {
    pattern: &'static str,
    reason: &'static str,
    /// Pattern must be followed by end of input or a separator, so that
    /// `rm -rf /` does not match `rm -rf /tmp/build`.
    terminal: bool,
    /// Pattern must start a shell segment, optionally after `sudo`, so that
    /// `mkfs` does not match `grep mkfs`.
    leading: bool,
}

const ROOT_WIPE: &str = "Recursive deletion of the root filesystem";
const HOME_WIPE: &str = "Recursive deletion of the home directory";
const DISK_OVERWRITE: &str = "Overwriting a raw disk device";
const DISK_FORMAT: &str = "Formatting a disk destroys all data on it";

const FORBIDDEN_RULES: &[ForbiddenRule] = &[
    ForbiddenRule { pattern: "rm -rf /", reason: ROOT_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -fr /", reason: ROOT_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -rf /*", reason: ROOT_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -fr /*", reason: ROOT_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -rf --no-preserve-root /", reason: ROOT_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -rf ~", reason: HOME_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -rf ~/", reason: HOME_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: "rm -rf $home", reason: HOME_WIPE, terminal: true, leading: true },
    ForbiddenRule { pattern: ":(){ :|:& };:", reason: "Fork bomb", terminal: false, leading: false },
    ForbiddenRule { pattern: ":(){ :|:&};:", reason: "Fork bomb", terminal: false, leading: false },
    ForbiddenRule { pattern: ":(){:|:&};:", reason: "Fork bomb", terminal: false, leading: false },
    ForbiddenRule { pattern: "mkfs", reason: DISK_FORMAT, terminal: true, leading: true },
    ForbiddenRule { pattern: "mkfs.", reason: DISK_FORMAT, terminal: false, leading: true },
    ForbiddenRule { pattern: "format c:", reason: DISK_FORMAT, terminal: true, leading: true },
    ForbiddenRule { pattern: "of=/dev/sd", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule { pattern: "of=/dev/hd", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule { pattern: "of=/dev/nvme", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule { pattern: "> /dev/sd", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule { pattern: ">/dev/sd", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule { pattern: "> /dev/nvme", reason: DISK_OVERWRITE, terminal: false, leading: false },
    ForbiddenRule {
        pattern: "chmod -r 777 /",
        reason: "Recursive permission change on the root filesystem",
        terminal: true,
        leading: true,
    },
    ForbiddenRule {
        pattern: "rd /s /q c:\\",
        reason: "Recursive deletion of the system drive",
        terminal: true,
        leading: true,
    },
    ForbiddenRule {
        pattern: "del /f /s /q c:\\",
        reason: "Recursive deletion of the system drive",
        terminal: true,
        leading: true,
    },
];

/// Read-only inspection commands, matched against the leading token.
const SAFE_COMMANDS: &[&str] = &[
    "ls", "dir", "pwd", "whoami", "date", "echo", "cat", "type", "grep", "find", "where",
    "which", "ps", "tasklist", "df", "free", "uname", "systeminfo", "head", "tail", "wc",
    "sort", "uniq", "hostname", "uptime", "id", "env", "printenv", "du", "stat", "file",
    "tree", "cd", "findstr", "less", "more", "man",
];

/// Read-only commands that need their subcommand to be safe.
const SAFE_PREFIXES: &[&str] = &[
    "git status", "git log", "git diff", "git show", "git branch", "docker ps",
    "docker images", "kubectl get", "npm list", "pip list", "cargo --version",
];

const DESTRUCTIVE_COMMANDS: &[&str] = &[
    "rm", "rmdir", "del", "erase", "rd", "shred", "unlink", "truncate", "wipefs",
    "remove-item",
];

const SYSTEM_MODIFICATION_COMMANDS: &[&str] = &[
    "sudo", "su", "doas", "chmod", "chown", "chgrp", "mount", "umount", "fdisk", "parted",
    "diskpart", "dd", "format", "systemctl", "service", "shutdown", "reboot", "halt",
    "poweroff", "kill", "killall", "pkill", "useradd", "userdel", "usermod", "passwd",
    "crontab", "apt", "apt-get", "yum", "dnf", "pacman", "brew", "modprobe", "sysctl",
    "bcdedit", "sc",
];

const REGISTRY_COMMANDS: &[&str] = &[
    "reg", "regedit", "regedt32", "regini", "set-itemproperty", "new-itemproperty",
    "remove-itemproperty",
];

const NETWORK_SECURITY_COMMANDS: &[&str] = &[
    "iptables", "ip6tables", "nft", "ufw", "firewall-cmd", "netsh", "route", "ifconfig",
    "nc", "ncat", "netcat", "nmap", "tcpdump", "set-netfirewallrule", "new-netfirewallrule",
];

/// Substrings that warrant confirmation whatever the leading command is.
const FALLBACK_PATTERNS: &[(&str, &str)] = &[
    (" -rf", "recursive force flag"),
    (" -fr", "recursive force flag"),
    (" --recursive --force", "recursive force flag"),
    ("&& rm ", "chained deletion"),
    ("; rm ", "chained deletion"),
    ("| rm ", "chained deletion"),
    ("xargs rm", "chained deletion"),
    ("&& del ", "chained deletion"),
    ("| sh", "piping into a shell"),
    ("| bash", "piping into a shell"),
];

const DEVICE_REDIRECTS: &[&str] = &["> /dev/", ">/dev/"];
const HARMLESS_DEVICES: &[&str] = &["null", "stdout", "stderr", "tty"];

const FALLBACK_SUGGESTIONS: &[&str] = &[
    "Review the full command, including every chained part, before confirming",
    "Run the command without force flags first to see what it would touch",
];

/// Result of classifying one command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    /// Risk tier
    pub risk_level: RiskLevel,
    /// Why the command got this tier
    pub reason: String,
    /// Dangerous category, when a leading token matched one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RiskCategory>,
    /// Mitigations to consider before confirming
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Classification {
    fn new(risk_level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            risk_level,
            reason: reason.into(),
            category: None,
            suggestions: Vec::new(),
        }
    }

    fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = suggestions.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn is_safe(&self) -> bool {
        self.risk_level == RiskLevel::Safe
    }

    pub fn requires_confirmation(&self) -> bool {
        self.risk_level == RiskLevel::RequiresConfirmation
    }

    pub fn is_forbidden(&self) -> bool {
        self.risk_level == RiskLevel::Forbidden
    }
}

/// The classifier's rule tables, for display to operators.
#[derive(Debug, Clone, Serialize)]
pub struct CommandTables {
    pub safe_commands: Vec<&'static str>,
    pub safe_prefixes: Vec<&'static str>,
    pub dangerous_commands: BTreeMap<RiskCategory, Vec<&'static str>>,
    pub forbidden_patterns: Vec<&'static str>,
}

/// Maps command strings to risk tiers using static rule tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandClassifier;

impl CommandClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a command. Pure: same input, same output.
    pub fn classify(&self, command: &str) -> Classification {
        let normalized = normalize(command);

        if let Some(rule) = FORBIDDEN_RULES
            .iter()
            .find(|rule| rule.matches(&normalized))
        {
            return Classification::new(RiskLevel::Forbidden, rule.reason).with_suggestions(&[
                "This command is never executed; target a specific path or device instead",
            ]);
        }

        let segments = split_segments(&normalized);
        if segments.first().is_some_and(|segment| is_read_only(segment)) {
            return Classification::new(RiskLevel::Safe, "Read-only command");
        }

        for segment in &segments {
            let Some(token) = leading_token(segment) else {
                continue;
            };
            if let Some(category) = RiskCategory::ALL
                .into_iter()
                .find(|category| category.commands().contains(&token))
            {
                let mut classification = Classification::new(
                    RiskLevel::RequiresConfirmation,
                    format!("`{token}` is a {}", category.label()),
                )
                .with_suggestions(category.suggestions());
                classification.category = Some(category);
                return classification;
            }
        }

        if let Some(reason) = fallback_pattern(&normalized) {
            return Classification::new(
                RiskLevel::RequiresConfirmation,
                format!("Command contains a risky pattern: {reason}"),
            )
            .with_suggestions(FALLBACK_SUGGESTIONS);
        }

        Classification::new(RiskLevel::Safe, "No risky command or pattern detected")
    }

    /// The rule tables this classifier uses.
    pub fn tables(&self) -> CommandTables {
        CommandTables {
            safe_commands: SAFE_COMMANDS.to_vec(),
            safe_prefixes: SAFE_PREFIXES.to_vec(),
            dangerous_commands: RiskCategory::ALL
                .into_iter()
                .map(|category| (category, category.commands().to_vec()))
                .collect(),
            forbidden_patterns: FORBIDDEN_RULES.iter().map(|rule| rule.pattern).collect(),
        }
    }
}

/// Classify a command with the default tables.
pub fn classify(command: &str) -> Classification {
    CommandClassifier.classify(command)
}

/// Lowercase and collapse whitespace runs to single spaces.
fn normalize(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl ForbiddenRule {
    fn matches(&self, command: &str) -> bool {
        command.match_indices(self.pattern).any(|(start, _)| {
            (!self.leading || starts_segment(&command[..start]))
                && (!self.terminal || ends_word(&command[start + self.pattern.len()..]))
        })
    }
}

/// Whether a match preceded by `before` starts a shell segment, allowing
/// `sudo` in between.
fn starts_segment(before: &str) -> bool {
    let trimmed = before.trim_end();
    if let Some(rest) = trimmed.strip_suffix("sudo") {
        if trimmed.len() < before.len() && starts_segment(rest) {
            return true;
        }
    }
    trimmed.is_empty() || trimmed.ends_with([';', '&', '|', '(', '`'])
}

fn ends_word(after: &str) -> bool {
    after
        .chars()
        .next()
        .map_or(true, |c| c.is_whitespace() || matches!(c, ';' | '&' | '|' | ')'))
}

/// Split on `&&`, `||`, `;` and `|`.
fn split_segments(command: &str) -> Vec<&str> {
    command
        .split(['&', '|', ';'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// First word of a segment with environment assignments, directory prefixes
/// and a `.exe` suffix removed.
fn leading_token(segment: &str) -> Option<&str> {
    let word = segment
        .split_whitespace()
        .find(|word| !(word.contains('=') && !word.starts_with('=')))?;
    let word = word.rsplit(['/', '\\']).next().unwrap_or(word);
    Some(word.strip_suffix(".exe").unwrap_or(word))
}

fn is_read_only(segment: &str) -> bool {
    let Some(token) = leading_token(segment) else {
        return false;
    };
    SAFE_COMMANDS.contains(&token)
        || SAFE_PREFIXES
            .iter()
            .any(|prefix| segment == *prefix || segment.starts_with(&format!("{prefix} ")))
}

fn fallback_pattern(command: &str) -> Option<&'static str> {
    if let Some((_, reason)) = FALLBACK_PATTERNS
        .iter()
        .find(|(pattern, _)| command.contains(pattern))
    {
        return Some(reason);
    }

    let writes_device = DEVICE_REDIRECTS.iter().any(|redirect| {
        command.match_indices(redirect).any(|(start, _)| {
            let device: String = command[start + redirect.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect();
            !HARMLESS_DEVICES.contains(&device.as_str())
        })
    });
    writes_device.then_some("redirection into a device file")
}
