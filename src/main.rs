use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use reqmate::config::{self, Config, Environment, RequestDefinition};
use reqmate::output::{self, PrintOptions};
use reqmate::{AppError, CancellationToken, Client, RequestOptions, RetryPolicy};

#[derive(Debug, Parser)]
#[command(version, about = "Scriptable, auditable API testing from the terminal")]
struct Cli {
    /// Config file (default is ./.reqmate.yaml, then ~/.config/reqmate/.reqmate.yaml)
    #[arg(long, global = true, env = "REQMATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a request against a URL, a path, or a named request from the config
    Run(RunArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// URL, path relative to the environment base URL, or request name
    target: String,

    /// Environment to use
    #[arg(long, short = 'e', default_value = "dev")]
    env: String,

    /// Show response headers
    #[arg(long)]
    headers: bool,

    /// HTTP method (overrides the named request's method)
    #[arg(long, short = 'X', ignore_case = true)]
    method: Option<HttpMethod>,

    /// Extra header as 'Name: value' (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    extra_headers: Vec<(String, String)>,

    /// Request body; valid JSON is re-encoded, anything else is sent verbatim
    #[arg(long, short = 'd')]
    data: Option<String>,

    /// End-to-end timeout, retries included (e.g. 500ms, 10s, 1m)
    #[arg(long, value_parser = parse_duration_arg)]
    timeout: Option<Duration>,

    /// Number of retries after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Base backoff between retries
    #[arg(long, default_value = "100ms", value_parser = parse_duration_arg)]
    retry_wait: Duration,

    /// Maximum backoff between retries
    #[arg(long, default_value = "2s", value_parser = parse_duration_arg)]
    retry_max_wait: Duration,

    /// Status codes that trigger a retry
    #[arg(long, value_delimiter = ',', default_value = "500,502,503,504")]
    retry_on: Vec<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    reqmate::logger::init_logging(cli.verbose);

    let result = match cli.command {
        Command::Version => {
            print_version();
            Ok(())
        }
        Command::Run(args) => run(cli.config, cli.no_color, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn print_version() {
    println!("Reqmate v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Build profile: {}",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
}

async fn run(config_path: Option<PathBuf>, no_color: bool, args: RunArgs) -> Result<(), AppError> {
    let cfg = config::load_config(config_path.as_deref())?;
    let env = select_environment(&cfg, &args.env)?;
    let definition = cfg.request(&args.target);

    let endpoint = definition.map_or(args.target.as_str(), |d| d.endpoint.as_str());
    let url = config::build_full_url(endpoint, &env.base_url);
    let method = resolve_method(args.method, definition)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let options = build_options(&args, &env, definition).with_cancellation(cancel);
    tracing::info!(%url, ?method, env = %args.env, "executing request");

    let client = Client::new();
    let response = match method {
        HttpMethod::Get => client.get(&url, options).await,
        HttpMethod::Post => client.post(&url, options).await,
        HttpMethod::Put => client.put(&url, options).await,
        HttpMethod::Delete => client.delete(&url, options).await,
    }?;

    let mut stdout = std::io::stdout().lock();
    output::print_response(
        response,
        PrintOptions::for_stdout(args.headers, no_color),
        &mut stdout,
    )
    .await
}

/// An empty config has no environments; fall back to a bare one so plain
/// URLs work without a config file.
fn select_environment(cfg: &Config, name: &str) -> Result<Environment, AppError> {
    if cfg.environments.is_empty() {
        return Ok(Environment::default());
    }
    Ok(cfg.environment(name)?.clone())
}

fn resolve_method(
    flag: Option<HttpMethod>,
    definition: Option<&RequestDefinition>,
) -> Result<HttpMethod, AppError> {
    if let Some(method) = flag {
        return Ok(method);
    }
    match definition.map(|d| d.method.trim()).filter(|m| !m.is_empty()) {
        Some(method) => HttpMethod::from_str(method, true)
            .map_err(|_| AppError::Argument(format!("unsupported method {method:?}"))),
        None => Ok(HttpMethod::Get),
    }
}

fn build_options(
    args: &RunArgs,
    env: &Environment,
    definition: Option<&RequestDefinition>,
) -> RequestOptions {
    let mut options = RequestOptions::new().with_headers(env.resolved_headers());

    if let Some(definition) = definition {
        options = options.with_headers(definition.headers.clone());
        if let Some(body) = &definition.body {
            options = options.with_json(body);
        }
    }
    options = options.with_headers(args.extra_headers.iter().cloned());

    if let Some(data) = &args.data {
        options = match serde_json::from_str::<serde_json::Value>(data) {
            Ok(json) => options.with_json(&json),
            Err(_) => options.with_body(data.clone()),
        };
    }
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(timeout);
    }
    if let Some(retries) = args.retries {
        options = options.with_retry(RetryPolicy {
            max_attempts: retries,
            wait_time: args.retry_wait,
            max_wait_time: args.retry_max_wait,
            retryable_status_codes: args.retry_on.iter().copied().collect(),
        });
    }
    options
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("invalid header {s:?}, expected 'Name: value'")),
    }
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    let value = s.trim();
    let digits_len = value.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(format!("invalid duration {value:?}"));
    }
    let (num_part, unit_part) = value.split_at(digits_len);
    let number: u64 = num_part
        .parse()
        .map_err(|err| format!("invalid duration {value:?}: {err}"))?;

    let duration = match unit_part {
        "ms" => Duration::from_millis(number),
        "" | "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(
            number
                .checked_mul(60)
                .ok_or_else(|| format!("duration {value:?} overflows"))?,
        ),
        unit => return Err(format!("invalid duration unit {unit:?}")),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::{parse_duration_arg, parse_header, resolve_method, Cli, Command, HttpMethod};
    use reqmate::config::RequestDefinition;

    #[test]
    fn parses_run_with_flags() {
        let cli = Cli::try_parse_from([
            "reqmate", "run", "/users", "-e", "prod", "--headers", "-X", "POST", "-H",
            "X-Trace: 1", "--retries", "2", "--retry-on", "503,504", "--timeout", "5s",
        ])
        .expect("args must parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.target, "/users");
        assert_eq!(args.env, "prod");
        assert!(args.headers);
        assert_eq!(args.method, Some(HttpMethod::Post));
        assert_eq!(args.extra_headers, vec![("X-Trace".to_owned(), "1".to_owned())]);
        assert_eq!(args.retries, Some(2));
        assert_eq!(args.retry_on, vec![503, 504]);
        assert_eq!(args.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn env_defaults_to_dev() {
        let cli = Cli::try_parse_from(["reqmate", "run", "https://example.com"]).expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.env, "dev");
        assert_eq!(args.retries, None);
    }

    #[test]
    fn header_parser_requires_colon() {
        assert_eq!(
            parse_header("Accept: text/html"),
            Ok(("Accept".to_owned(), "text/html".to_owned()))
        );
        assert!(parse_header("Accept").is_err());
        assert!(parse_header(": empty").is_err());
    }

    #[test]
    fn duration_parser_supports_units() {
        assert_eq!(parse_duration_arg("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration_arg("3"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration_arg("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration_arg("fast").is_err());
        assert!(parse_duration_arg("5d").is_err());
    }

    #[test]
    fn method_flag_overrides_definition() {
        let definition = RequestDefinition {
            method: "put".to_owned(),
            ..RequestDefinition::default()
        };
        assert_eq!(
            resolve_method(None, Some(&definition)).ok(),
            Some(HttpMethod::Put)
        );
        assert_eq!(
            resolve_method(Some(HttpMethod::Delete), Some(&definition)).ok(),
            Some(HttpMethod::Delete)
        );
        assert_eq!(resolve_method(None, None).ok(), Some(HttpMethod::Get));
    }

    #[test]
    fn unsupported_definition_method_is_rejected() {
        let definition = RequestDefinition {
            method: "PATCH".to_owned(),
            ..RequestDefinition::default()
        };
        assert!(resolve_method(None, Some(&definition)).is_err());
    }
}
