use std::io::{IsTerminal, Write};

use crossterm::style::{StyledContent, Stylize};
use reqwest::StatusCode;

use crate::error::AppError;
use crate::HttpResponse;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PrintOptions {
    pub show_headers: bool,
    pub color: bool,
}

impl PrintOptions {
    /// Colors only when stdout is a terminal and `no_color` is not set.
    pub fn for_stdout(show_headers: bool, no_color: bool) -> Self {
        Self {
            show_headers,
            color: !no_color && std::io::stdout().is_terminal(),
        }
    }
}

fn status_style(status: StatusCode, text: String) -> StyledContent<String> {
    match status.as_u16() {
        200..=299 => text.green().bold(),
        400..=499 => text.yellow().bold(),
        500.. => text.red().bold(),
        _ => text.stylize(),
    }
}

/// Prints the status line, optionally the headers, and the body.
///
/// Only a failure to read the body (or to write) aborts printing.
pub async fn print_response<W: Write>(
    response: HttpResponse,
    options: PrintOptions,
    out: &mut W,
) -> Result<(), AppError> {
    let status_line = response.status_line();
    if options.color {
        writeln!(out, "{}", status_style(response.status(), status_line))?;
    } else {
        writeln!(out, "{status_line}")?;
    }

    if options.show_headers {
        for (name, value) in response.headers() {
            let line = format!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
            if options.color {
                writeln!(out, "{}", line.cyan())?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        writeln!(out)?;
    }

    let body = response.text().await?;
    if options.color && options.show_headers {
        writeln!(out, "{}", body.white())?;
    } else {
        writeln!(out, "{body}")?;
    }
    Ok(())
}

/// Prints `Error: <err>` to stderr, red when stderr is a terminal.
pub fn print_error(err: &dyn std::error::Error) {
    let message = format!("Error: {err}");
    if std::io::stderr().is_terminal() {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{message}");
    }
}
