//! Environment configuration loaded from `.reqmate.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = ".reqmate.yaml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub environments: BTreeMap<String, Environment>,
    pub requests: Vec<RequestDefinition>,
    pub variables: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub auth: AuthConfig,
    pub variables: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub api_key: String,
    pub token: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &str| if value.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("AuthConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// A named request stored in the config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefinition {
    pub name: String,
    pub method: String,
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub extract: BTreeMap<String, String>,
}

impl Config {
    /// Returns the environment called `name`.
    pub fn environment(&self, name: &str) -> Result<&Environment, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_owned()))
    }

    pub fn request(&self, name: &str) -> Option<&RequestDefinition> {
        self.requests.iter().find(|request| request.name == name)
    }

    /// Merges environments from `other`.
    ///
    /// Unknown environments are added whole. For known ones, credentials and
    /// base URL are overwritten only by non-empty values.
    pub fn merge(&mut self, other: &Config) {
        for (name, incoming) in &other.environments {
            let Some(env) = self.environments.get_mut(name) else {
                self.environments.insert(name.clone(), incoming.clone());
                continue;
            };

            overwrite_non_empty(&mut env.auth.api_key, &incoming.auth.api_key);
            overwrite_non_empty(&mut env.auth.username, &incoming.auth.username);
            overwrite_non_empty(&mut env.auth.password, &incoming.auth.password);
            overwrite_non_empty(&mut env.base_url, &incoming.base_url);
        }
    }

    /// Writes the config as two-space indented JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let encoded = serde_json::to_vec_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, encoded).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `REQMATE_<ENV>_APIKEY` overrides using `lookup` for variables.
    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, env) in &mut self.environments {
            if let Some(api_key) = lookup(&api_key_var_name(name)).filter(|v| !v.is_empty()) {
                env.auth.api_key = api_key;
            }
        }
    }
}

impl Environment {
    /// Headers to send for this environment, including the credential header
    /// implied by `auth.type`. Explicit headers take precedence.
    pub fn resolved_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some((name, value)) = self.auth.header() {
            headers.insert(name.to_owned(), value);
        }
        for (name, value) in &self.headers {
            headers.retain(|existing: &String, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}

impl AuthConfig {
    fn header(&self) -> Option<(&'static str, String)> {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            "bearer" if !self.token.trim().is_empty() => Some((
                "Authorization",
                normalize_bearer_authorization(&self.token),
            )),
            "api_key" | "apikey" if !self.api_key.is_empty() => {
                Some(("X-API-Key", self.api_key.clone()))
            }
            "basic" if !self.username.is_empty() => {
                let credentials = format!("{}:{}", self.username, self.password);
                Some(("Authorization", format!("Basic {}", STANDARD.encode(credentials))))
            }
            _ => None,
        }
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

fn overwrite_non_empty(target: &mut String, value: &str) {
    if !value.is_empty() {
        value.clone_into(target);
    }
}

fn api_key_var_name(env_name: &str) -> String {
    format!("REQMATE_{env_name}_APIKEY")
}

/// Loads the config from `path`, or from the default locations.
///
/// Without an explicit path, `./.reqmate.yaml` is tried first and then
/// `$HOME/.config/reqmate/.reqmate.yaml`. A missing file yields the default
/// config; an unreadable or malformed one is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => match default_locations().into_iter().find(|p| p.is_file()) {
            Some(path) => read_config(&path)?,
            None => {
                tracing::debug!("no config file found, using defaults");
                Config::default()
            }
        },
    };
    config.apply_env_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".config").join("reqmate").join(CONFIG_FILE_NAME));
    }
    locations
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Prefixes a relative `request_url` with `base_url`, joined by one slash.
///
/// Absolute URLs (anything starting with `http`) and empty bases pass through.
pub fn build_full_url(request_url: &str, base_url: &str) -> String {
    if base_url.is_empty() || request_url.starts_with("http") {
        return request_url.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        request_url.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{build_full_url, load_config, AuthConfig, Config, Environment};
    use crate::error::ConfigError;

    const SAMPLE: &str = r#"
version: "1"
environments:
  dev:
    base_url: https://dev.example.com/
    headers:
      Accept: application/json
    auth:
      type: bearer
      token: abc123
  prod:
    base_url: https://example.com
requests:
  - name: list-users
    method: GET
    endpoint: /users
  - name: create-user
    method: POST
    endpoint: /users
    body:
      name: Kit
"#;

    fn env_with(base_url: &str) -> Environment {
        Environment {
            base_url: base_url.to_owned(),
            ..Environment::default()
        }
    }

    #[test]
    fn full_url_joins_with_single_slash() {
        assert_eq!(
            build_full_url("/users", "https://api.example.com/"),
            "https://api.example.com/users"
        );
        assert_eq!(
            build_full_url("users", "https://api.example.com"),
            "https://api.example.com/users"
        );
    }

    #[test]
    fn full_url_keeps_absolute_urls_and_empty_base() {
        assert_eq!(
            build_full_url("https://other.example.com/x", "https://api.example.com"),
            "https://other.example.com/x"
        );
        assert_eq!(build_full_url("/users", ""), "/users");
    }

    #[test]
    fn loads_yaml_from_explicit_path() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("must create temp file");
        file.write_all(SAMPLE.as_bytes()).expect("must write");

        let config = load_config(Some(file.path())).expect("config must load");
        let dev = config.environment("dev").expect("dev must exist");
        assert_eq!(dev.base_url, "https://dev.example.com/");
        assert_eq!(dev.headers["Accept"], "application/json");
        assert_eq!(config.requests.len(), 2);
        assert_eq!(
            config.request("create-user").and_then(|r| r.body.clone()),
            Some(serde_json::json!({"name": "Kit"}))
        );
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("must create temp file");
        file.write_all(b"environments: [unclosed").expect("must write");

        let err = load_config(Some(file.path())).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_explicit_file_is_read_error() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let err = load_config(Some(&dir.path().join("absent.yaml"))).expect_err("must fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn unknown_environment_is_reported() {
        let err = Config::default()
            .environment("staging")
            .expect_err("must be missing");
        assert!(matches!(err, ConfigError::EnvironmentNotFound(name) if name == "staging"));
    }

    #[test]
    fn env_var_overrides_api_key() {
        let mut config = Config::default();
        config.environments.insert("dev".to_owned(), env_with("https://dev"));
        config.environments.insert("prod".to_owned(), env_with("https://prod"));

        config.apply_env_overrides(|name| {
            (name == "REQMATE_dev_APIKEY").then(|| "from-env".to_owned())
        });

        assert_eq!(config.environments["dev"].auth.api_key, "from-env");
        assert_eq!(config.environments["prod"].auth.api_key, "");
    }

    #[test]
    fn merge_adds_and_overwrites_only_non_empty_fields() {
        let mut base = Config::default();
        let mut dev = env_with("https://dev");
        dev.auth.username = "alice".to_owned();
        base.environments.insert("dev".to_owned(), dev);

        let mut other = Config::default();
        let mut incoming = env_with("");
        incoming.auth.api_key = "k".to_owned();
        other.environments.insert("dev".to_owned(), incoming);
        other
            .environments
            .insert("qa".to_owned(), env_with("https://qa"));

        base.merge(&other);

        let dev = &base.environments["dev"];
        assert_eq!(dev.base_url, "https://dev");
        assert_eq!(dev.auth.username, "alice");
        assert_eq!(dev.auth.api_key, "k");
        assert_eq!(base.environments["qa"].base_url, "https://qa");
    }

    #[test]
    fn save_writes_indented_json() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let path = dir.path().join("out.json");
        let mut config = Config::default();
        config.version = "1".to_owned();

        config.save_to_file(&path).expect("must save");
        let written = std::fs::read_to_string(&path).expect("must read back");
        assert!(written.starts_with("{\n  \"version\": \"1\""));
    }

    #[test]
    fn resolved_headers_add_auth_and_let_explicit_headers_win() {
        let mut env = env_with("https://dev");
        env.auth = AuthConfig {
            kind: "bearer".to_owned(),
            token: "abc".to_owned(),
            ..AuthConfig::default()
        };
        env.headers.insert("Accept".to_owned(), "text/plain".to_owned());
        assert_eq!(env.resolved_headers()["Authorization"], "Bearer abc");
        assert_eq!(env.resolved_headers()["Accept"], "text/plain");

        env.headers
            .insert("authorization".to_owned(), "Token xyz".to_owned());
        let headers = env.resolved_headers();
        assert_eq!(headers.get("Authorization"), None);
        assert_eq!(headers["authorization"], "Token xyz");
    }

    #[test]
    fn basic_and_api_key_auth_headers() {
        let basic = AuthConfig {
            kind: "basic".to_owned(),
            username: "user".to_owned(),
            password: "pass".to_owned(),
            ..AuthConfig::default()
        };
        assert_eq!(
            basic.header(),
            Some(("Authorization", "Basic dXNlcjpwYXNz".to_owned()))
        );

        let api_key = AuthConfig {
            kind: "api_key".to_owned(),
            api_key: "k-1".to_owned(),
            ..AuthConfig::default()
        };
        assert_eq!(api_key.header(), Some(("X-API-Key", "k-1".to_owned())));
        assert_eq!(AuthConfig::default().header(), None);
    }

    #[test]
    fn bearer_prefix_is_not_duplicated() {
        let auth = AuthConfig {
            kind: "Bearer".to_owned(),
            token: "bEaReR abc123".to_owned(),
            ..AuthConfig::default()
        };
        assert_eq!(
            auth.header(),
            Some(("Authorization", "bEaReR abc123".to_owned()))
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let auth = AuthConfig {
            token: "secret-token".to_owned(),
            ..AuthConfig::default()
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
