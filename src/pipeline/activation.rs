// ABOUTME: Activation command rendering and stderr classification.
// ABOUTME: Stderr is benign only when every non-empty line fully matches the allow-list.

use crate::runtime::{RuntimeType, quote};
use crate::types::TargetId;
use regex::Regex;

/// Values substituted into the activation template.
#[derive(Debug, Clone)]
pub struct ActivationVars<'a> {
    pub archive: &'a str,
    pub remote_path: &'a str,
    pub target: &'a TargetId,
    pub runtime: RuntimeType,
}

/// Fill `{archive}`, `{remote_path}`, `{target}` and `{runtime}`. Paths are shell-quoted.
pub fn render(template: &str, vars: &ActivationVars<'_>) -> String {
    template
        .replace("{archive}", &quote(vars.archive))
        .replace("{remote_path}", &quote(vars.remote_path))
        .replace("{target}", vars.target.as_str())
        .replace("{runtime}", vars.runtime.binary())
}

/// Lines of `stderr` not covered by `allow_list`.
pub fn unexpected_stderr<'a>(stderr: &'a str, allow_list: &[Regex]) -> Vec<&'a str> {
    stderr
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !allow_list.iter().any(|re| re.is_match(line)))
        .collect()
}
