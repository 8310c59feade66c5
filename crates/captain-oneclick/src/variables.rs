//! Template variable resolution.
//!
//! Substitution operates on the raw serialized bundle text before
//! structured parsing, because random-hex directives are designed to
//! land inside fields that only exist after substitution. The flow:
//! expand hex directives, read the declared variables, merge implicit
//! and caller-supplied values, fill the rest from defaults (or an
//! operator prompt), then one textual substitution pass over the
//! whole document.

use crate::bundle::{OneClickBundle, VariableSpec};
use crate::error::{OneClickError, OneClickResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Implicit variable carrying the target app name; service keys are
/// prefixed with it by bundle convention.
pub const APP_NAME_VARIABLE: &str = "$$cap_appname";

/// Implicit variable carrying the platform's root domain.
pub const ROOT_DOMAIN_VARIABLE: &str = "$$cap_root_domain";

const HEX_DIRECTIVE: &str = r"\$\$cap_gen_random_hex\((\d+)\)";

/// Concrete values for every resolved variable, in resolution order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedVariables {
    values: IndexMap<String, String>,
}

impl ResolvedVariables {
    /// Store a value for a variable id, overwriting any previous one.
    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    /// Look up a variable's value.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    /// Whether the variable already has a value.
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Replace every occurrence of every variable id in `text` with
    /// its value. Ids are prefix-unique by bundle convention, so the
    /// replacement order does not matter.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (id, value) in &self.values {
            out = out.replace(id, value);
        }
        out
    }
}

/// Output of variable resolution: fully substituted bundle text plus
/// the values that were applied.
#[derive(Debug, Clone)]
pub struct ResolvedDefinition {
    /// Bundle text with every variable token replaced.
    pub text: String,
    /// The values that were substituted.
    pub variables: ResolvedVariables,
}

/// Strategy for obtaining a value for a variable that has no
/// caller-supplied value and no usable default. Interactive frontends
/// ask the operator; automated runs use [`NoPrompt`].
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    /// Produce a value for the variable, or `None` to give up.
    async fn provide(&self, variable: &VariableSpec) -> Option<String>;
}

/// Automated-mode strategy: never supplies a value, so unresolved
/// variables become hard failures.
pub struct NoPrompt;

#[async_trait]
impl OperatorPrompt for NoPrompt {
    async fn provide(&self, _variable: &VariableSpec) -> Option<String> {
        None
    }
}

/// Expands a bundle's template placeholders into a concrete
/// definition.
pub struct VariableResolver {
    prompt: Arc<dyn OperatorPrompt>,
}

impl VariableResolver {
    /// Resolver for unattended runs: a variable without a value is a
    /// hard failure.
    pub fn automated() -> Self {
        Self {
            prompt: Arc::new(NoPrompt),
        }
    }

    /// Resolver that falls back to the given prompt strategy for
    /// variables it cannot resolve on its own.
    pub fn interactive(prompt: Arc<dyn OperatorPrompt>) -> Self {
        Self { prompt }
    }

    /// Resolve `raw_text` into fully substituted bundle text.
    ///
    /// `supplied` maps variable ids (full tokens, `$$cap_...`) to
    /// caller-chosen values. The implicit app-name and root-domain
    /// variables are injected over the caller map, so caller input
    /// cannot displace them.
    #[instrument(skip(self, raw_text, supplied), fields(app_name = %app_name))]
    pub async fn resolve(
        &self,
        raw_text: &str,
        app_name: &str,
        root_domain: &str,
        supplied: &HashMap<String, String>,
    ) -> OneClickResult<ResolvedDefinition> {
        // Hex directives first: each occurrence gets an independent
        // value, including occurrences inside default values.
        let text = expand_hex_directives(raw_text)?;

        // Pre-substitution parse, only to read the declarations.
        let bundle = OneClickBundle::parse(&text)?;

        let mut variables = ResolvedVariables::default();
        for (id, value) in supplied {
            variables.insert(id, value);
        }
        variables.insert(APP_NAME_VARIABLE, app_name);
        variables.insert(ROOT_DOMAIN_VARIABLE, root_domain);

        for spec in &bundle.app.variables {
            if variables.contains(&spec.id) {
                continue;
            }
            self.resolve_declared(spec, &mut variables).await?;
        }

        debug!(
            variables = variables.values.len(),
            "substituting bundle variables"
        );
        let substituted = variables.substitute(&text);
        Ok(ResolvedDefinition {
            text: substituted,
            variables,
        })
    }

    /// Fill in one declared variable from its default, falling back
    /// to the prompt strategy.
    async fn resolve_declared(
        &self,
        spec: &VariableSpec,
        variables: &mut ResolvedVariables,
    ) -> OneClickResult<()> {
        let default = spec
            .default_value
            .as_deref()
            .filter(|value| !value.is_empty());

        if let Some(value) = default {
            if pattern_accepts(spec.valid_regex.as_deref(), value) {
                variables.insert(&spec.id, value);
                return Ok(());
            }
        }

        if let Some(value) = self.prompt.provide(spec).await {
            variables.insert(&spec.id, value);
            return Ok(());
        }

        match default {
            Some(_) => Err(OneClickError::InvalidVariable {
                id: spec.id.clone(),
                pattern: spec.valid_regex.clone().unwrap_or_default(),
            }),
            None => Err(OneClickError::MissingVariable {
                id: spec.id.clone(),
            }),
        }
    }
}

/// Validate a value against a slash-delimited pattern. A missing
/// pattern accepts anything; an unparsable pattern rejects.
fn pattern_accepts(pattern: Option<&str>, value: &str) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    let trimmed = pattern
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
        .unwrap_or(pattern);
    match Regex::new(trimmed) {
        Ok(regex) => regex.is_match(value),
        Err(error) => {
            warn!(pattern = %pattern, error = %error, "unparsable validation pattern");
            false
        }
    }
}

/// Replace every `$$cap_gen_random_hex(N)` directive with a freshly
/// generated N-character lowercase hex string. Occurrences are
/// independent: two directives never share a value. A length that
/// does not fit `usize` is a hard error rather than a silent empty
/// substitution.
fn expand_hex_directives(text: &str) -> OneClickResult<String> {
    let directive = Regex::new(HEX_DIRECTIVE).expect("hex directive pattern is valid");
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in directive.captures_iter(text) {
        let matched = caps.get(0).expect("capture 0 is the whole match");
        let len: usize =
            caps[1]
                .parse()
                .map_err(|_| OneClickError::InvalidDirective {
                    directive: matched.as_str().to_string(),
                })?;
        out.push_str(&text[last..matched.start()]);
        out.push_str(&random_hex(len));
        last = matched.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// A lowercase hex string of exactly `len` characters.
fn random_hex(len: usize) -> String {
    const HEX_CHARS: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| HEX_CHARS[rng.gen_range(0..HEX_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"
captainVersion: 4
services:
    $$cap_appname-db:
        image: postgres:16
        environment:
            POSTGRES_PASSWORD: $$cap_db_pass
    $$cap_appname:
        image: nginx:alpine
        environment:
            APP_URL: $$cap_appname.$$cap_root_domain
            GREETING: $$cap_greeting
caproverOneClickApp:
    variables:
        - id: $$cap_db_pass
          label: Database password
          defaultValue: $$cap_gen_random_hex(16)
        - id: $$cap_greeting
          label: Greeting
          defaultValue: Abcde
"#;

    fn is_lower_hex(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn random_hex_has_requested_length_and_charset() {
        for len in [1, 8, 24, 64] {
            let value = random_hex(len);
            assert_eq!(value.len(), len);
            assert!(is_lower_hex(&value));
        }
    }

    #[test]
    fn hex_directives_expand_independently() {
        let text = "a=$$cap_gen_random_hex(12) b=$$cap_gen_random_hex(12)";
        let expanded = expand_hex_directives(text).unwrap();
        assert!(!expanded.contains("$$cap_gen_random_hex"));

        let values: Vec<&str> = expanded
            .split_whitespace()
            .map(|kv| kv.split_once('=').unwrap().1)
            .collect();
        assert_eq!(values.len(), 2);
        assert!(is_lower_hex(values[0]));
        assert_eq!(values[0].len(), 12);
        assert_ne!(values[0], values[1]);
    }

    #[test]
    fn hex_directive_with_unrepresentable_length_is_rejected() {
        let text = "pass=$$cap_gen_random_hex(99999999999999999999999999)";
        let err = expand_hex_directives(text).unwrap_err();
        assert!(matches!(
            err,
            OneClickError::InvalidDirective { ref directive }
                if directive.contains("99999999999999999999999999")
        ));
    }

    #[test]
    fn pattern_accepts_slash_delimited_regex() {
        assert!(pattern_accepts(Some("/^.{6,}$/"), "long-enough"));
        assert!(!pattern_accepts(Some("/^.{6,}$/"), "short"));
        assert!(pattern_accepts(None, "anything"));
        assert!(!pattern_accepts(Some("/((/"), "anything"));
    }

    #[tokio::test]
    async fn default_value_resolves_literally_in_automated_mode() {
        let resolver = VariableResolver::automated();
        let resolved = resolver
            .resolve(BUNDLE, "my-app", "captain.example.com", &HashMap::new())
            .await
            .unwrap();

        assert!(resolved.text.contains("GREETING: Abcde"));
        assert_eq!(resolved.variables.get("$$cap_greeting"), Some("Abcde"));
    }

    #[tokio::test]
    async fn caller_supplied_value_beats_default() {
        let resolver = VariableResolver::automated();
        let supplied =
            HashMap::from([("$$cap_greeting".to_string(), "from-caller".to_string())]);
        let resolved = resolver
            .resolve(BUNDLE, "my-app", "captain.example.com", &supplied)
            .await
            .unwrap();

        assert!(resolved.text.contains("GREETING: from-caller"));
        assert!(!resolved.text.contains("Abcde"));
    }

    #[tokio::test]
    async fn implicit_variables_are_substituted_everywhere() {
        let resolver = VariableResolver::automated();
        let resolved = resolver
            .resolve(BUNDLE, "my-app", "captain.example.com", &HashMap::new())
            .await
            .unwrap();

        assert!(resolved.text.contains("my-app-db:"));
        assert!(resolved.text.contains("APP_URL: my-app.captain.example.com"));
        assert!(!resolved.text.contains("$$cap_appname"));
        assert!(!resolved.text.contains("$$cap_root_domain"));
    }

    #[tokio::test]
    async fn caller_cannot_displace_implicit_variables() {
        let resolver = VariableResolver::automated();
        let supplied = HashMap::from([(
            "$$cap_root_domain".to_string(),
            "evil.example.net".to_string(),
        )]);
        let resolved = resolver
            .resolve(BUNDLE, "my-app", "captain.example.com", &supplied)
            .await
            .unwrap();

        assert!(resolved.text.contains("my-app.captain.example.com"));
        assert!(!resolved.text.contains("evil.example.net"));
    }

    #[tokio::test]
    async fn no_declared_token_survives_resolution() {
        let resolver = VariableResolver::automated();
        let resolved = resolver
            .resolve(BUNDLE, "my-app", "captain.example.com", &HashMap::new())
            .await
            .unwrap();

        assert!(!resolved.text.contains("$$cap_"));
        let pass = resolved.variables.get("$$cap_db_pass").unwrap();
        assert_eq!(pass.len(), 16);
        assert!(is_lower_hex(pass));
    }

    #[tokio::test]
    async fn missing_variable_fails_in_automated_mode() {
        let bundle = r#"
services:
    $$cap_appname:
        image: nginx:alpine
caproverOneClickApp:
    variables:
        - id: $$cap_required
          label: Required value
"#;
        let resolver = VariableResolver::automated();
        let err = resolver
            .resolve(bundle, "app", "captain.example.com", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OneClickError::MissingVariable { id } if id == "$$cap_required"
        ));
    }

    #[tokio::test]
    async fn invalid_default_fails_in_automated_mode() {
        let bundle = r#"
services:
    $$cap_appname:
        image: nginx:alpine
caproverOneClickApp:
    variables:
        - id: $$cap_pass
          label: Password
          defaultValue: short
          validRegex: /^.{8,}$/
"#;
        let resolver = VariableResolver::automated();
        let err = resolver
            .resolve(bundle, "app", "captain.example.com", &HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OneClickError::InvalidVariable { id, .. } if id == "$$cap_pass"
        ));
    }

    #[tokio::test]
    async fn prompt_strategy_fills_unresolved_variables() {
        struct FixedPrompt;

        #[async_trait]
        impl OperatorPrompt for FixedPrompt {
            async fn provide(&self, variable: &VariableSpec) -> Option<String> {
                assert_eq!(variable.id, "$$cap_required");
                Some("operator-value".to_string())
            }
        }

        let bundle = r#"
services:
    $$cap_appname:
        image: nginx:alpine
        environment:
            REQUIRED: $$cap_required
caproverOneClickApp:
    variables:
        - id: $$cap_required
          label: Required value
"#;
        let resolver = VariableResolver::interactive(Arc::new(FixedPrompt));
        let resolved = resolver
            .resolve(bundle, "app", "captain.example.com", &HashMap::new())
            .await
            .unwrap();
        assert!(resolved.text.contains("REQUIRED: operator-value"));
    }
}
