//! Terminal detection and capability utilities

use is_terminal::IsTerminal;
use std::env;
use std::io::stdout;

const CI_VARS: [&str; 11] = [
    "CI",
    "CONTINUOUS_INTEGRATION",
    "JENKINS_URL",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "TRAVIS",
    "CIRCLECI",
    "BUILDKITE",
    "DRONE",
    "TEAMCITY_VERSION",
    "TF_BUILD", // Azure DevOps
];

fn env_lookup(var: &str) -> Option<String> {
    env::var(var).ok()
}

/// Check if stdout is connected to an interactive terminal
pub fn is_interactive() -> bool {
    interactive_with(stdout().is_terminal(), env_lookup)
}

/// Check if the terminal supports ANSI escape codes for colors
pub fn supports_ansi() -> bool {
    ansi_with(is_interactive(), env_lookup)
}

/// Detect a CI environment from its marker variables
fn ci_with(lookup: impl Fn(&str) -> Option<String>) -> bool {
    CI_VARS.iter().any(|var| lookup(var).is_some())
}

fn interactive_with(is_tty: bool, lookup: impl Fn(&str) -> Option<String>) -> bool {
    if !is_tty {
        return false;
    }

    // CI runners may allocate a TTY but nobody is reading it
    if ci_with(&lookup) {
        return false;
    }

    lookup("DEBIAN_FRONTEND").as_deref() != Some("noninteractive")
}

fn ansi_with(interactive: bool, lookup: impl Fn(&str) -> Option<String>) -> bool {
    if !interactive {
        return false;
    }

    if lookup("NO_COLOR").is_some() {
        return false;
    }

    let term = lookup("TERM").unwrap_or_default();
    if term == "dumb" {
        return false;
    }

    #[cfg(windows)]
    {
        true
    }

    #[cfg(not(windows))]
    {
        !term.is_empty()
    }
}
