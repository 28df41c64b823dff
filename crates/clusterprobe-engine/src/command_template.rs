//! Command Template Engine: renders a configured command template into an
//! argv for a specific target, validating the target and substituting it
//! into each token that references it.

use clusterprobe_core::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// RFC 1123 DNS label: letters, digits, hyphens, dot-separated labels, no
/// leading/trailing hyphen per label.
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("static regex is valid")
});

/// Validate that `target` is a well-formed hostname or dotted-decimal
/// address, rejecting anything shell metacharacters could hide in.
pub fn validate_target(target: &str) -> Result<()> {
    if target.is_empty() || target.len() > 253 || !TARGET_RE.is_match(target) {
        return Err(Error::InvalidTarget(target.to_string()));
    }
    Ok(())
}

/// Render `template` into an argv for `target`.
///
/// Validates `target` against RFC 1123 first (so a malformed target never
/// reaches the shell tokenizer or the substitution pass), tokenizes the
/// template with POSIX shell word-splitting, then replaces every `%s`,
/// `%v`, and `{target}` placeholder found inside each token with the
/// target string.
pub fn render(template: &str, target: &str) -> Result<Vec<String>> {
    validate_target(target)?;

    let tokens = shell_words::split(template)
        .map_err(|e| Error::InvalidTemplate(format!("failed to tokenize {template:?}: {e}")))?;

    if tokens.is_empty() {
        return Err(Error::InvalidTemplate(format!(
            "template {template:?} produced no tokens"
        )));
    }

    Ok(tokens
        .into_iter()
        .map(|token| {
            token
                .replace("%s", target)
                .replace("%v", target)
                .replace("{target}", target)
        })
        .collect())
}
