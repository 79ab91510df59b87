use crate::error::MilestoneError;

/// Primary credential variable.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Fallback credential variable.
pub const FALLBACK_TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

/// Where the credential was found. Logged at startup instead of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Env(String),
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Flag => write!(f, "--token"),
            TokenSource::Env(name) => write!(f, "${}", name),
        }
    }
}

/// Resolve the GitHub token: `--token` > `--token-env` > `GITHUB_TOKEN` >
/// `GITHUB_PERSONAL_ACCESS_TOKEN`. Empty values are treated as unset.
///
/// `lookup` reads an environment variable; pass `|k| std::env::var(k).ok()`
/// from the binary.
pub fn resolve_token<F>(
    flag: Option<String>,
    token_env: Option<&str>,
    lookup: F,
) -> Result<(String, TokenSource), MilestoneError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(t) = flag.filter(|t| !t.trim().is_empty()) {
        return Ok((t, TokenSource::Flag));
    }

    let candidates = token_env
        .into_iter()
        .chain([TOKEN_ENV, FALLBACK_TOKEN_ENV]);
    for name in candidates {
        match lookup(name) {
            Some(t) if !t.trim().is_empty() => return Ok((t, TokenSource::Env(name.to_string()))),
            _ => continue,
        }
    }

    Err(MilestoneError::MissingToken)
}
