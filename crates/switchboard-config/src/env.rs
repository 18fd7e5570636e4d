use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `{{ env.VAR }}` or `{{ env.VAR | default("fallback") }}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
});

/// Expand environment placeholders in raw TOML text
///
/// Tier defaults and provider lists are commonly injected per deployment,
/// so placeholders are resolved once here, before deserialization.
/// TOML comment lines are left untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    let lines = input
        .split('\n')
        .map(|line| {
            if line.trim_start().starts_with('#') {
                Ok(line.to_owned())
            } else {
                expand_line(line)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines.join("\n"))
}

fn expand_line(line: &str) -> Result<String, String> {
    let mut expanded = String::with_capacity(line.len());
    let mut cursor = 0;

    for captures in PLACEHOLDER.captures_iter(line) {
        let Some(whole) = captures.get(0) else { continue };
        expanded.push_str(&line[cursor..whole.start()]);
        expanded.push_str(&resolve(&captures)?);
        cursor = whole.end();
    }

    expanded.push_str(&line[cursor..]);
    Ok(expanded)
}

fn resolve(captures: &Captures<'_>) -> Result<String, String> {
    let key = captures.get(1).map_or("", |m| m.as_str());
    let fallback = captures.get(2).map(|m| m.as_str());

    let Some(var_name) = key.strip_prefix("env.").filter(|name| !name.is_empty() && !name.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(var_name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{var_name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let input = "[policy]\ndefault_trial_mode = false\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn expands_provider_list() {
        temp_env::with_var("SB_PROVIDER", Some("anthropic"), || {
            let result = expand_env("default_allowed_providers = [\"{{ env.SB_PROVIDER }}\"]").unwrap();
            assert_eq!(result, "default_allowed_providers = [\"anthropic\"]");
        });
    }

    #[test]
    fn expands_several_on_one_line() {
        let vars = [("SB_A", Some("openai")), ("SB_B", Some("anthropic"))];
        temp_env::with_vars(vars, || {
            let result = expand_env("p = [\"{{ env.SB_A }}\", \"{{env.SB_B}}\"]").unwrap();
            assert_eq!(result, "p = [\"openai\", \"anthropic\"]");
        });
    }

    #[test]
    fn missing_var_is_an_error() {
        temp_env::with_var_unset("SB_MISSING", || {
            let err = expand_env("max_age = \"{{ env.SB_MISSING }}\"").unwrap_err();
            assert!(err.contains("SB_MISSING"));
        });
    }

    #[test]
    fn default_fills_missing_var() {
        temp_env::with_var_unset("SB_MAX_AGE", || {
            let result = expand_env("max_age = \"{{ env.SB_MAX_AGE | default(\"12h\") }}\"").unwrap();
            assert_eq!(result, "max_age = \"12h\"");
        });
    }

    #[test]
    fn set_var_beats_default() {
        temp_env::with_var("SB_MAX_AGE", Some("1h"), || {
            let result = expand_env("max_age = \"{{ env.SB_MAX_AGE | default(\"12h\") }}\"").unwrap();
            assert_eq!(result, "max_age = \"1h\"");
        });
    }

    #[test]
    fn unscoped_key_rejected() {
        let err = expand_env("x = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("SB_MISSING", || {
            let input = "  # filter = \"{{ env.SB_MISSING }}\"\nfilter = \"info\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
