use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

#[macro_export]
macro_rules! warning {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!($fmt $(, $($arg)*)?).yellow());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!("{}", $expr).yellow());
    }};
}

#[macro_export]
macro_rules! error {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!($fmt $(, $($arg)*)?).red());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!("{}", $expr).red());
    }};
}

#[macro_export]
macro_rules! status {
    // format string literal (with or without inline formatting)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", format!($fmt $(, $($arg)*)?).green());
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", format!("{}", $expr).green());
    }};
}

/// dimmed trace line on stderr, for `--verbose`
#[macro_export]
macro_rules! debug {
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use colored::Colorize;
        use std::io::{self, Write};
        let _ = writeln!(io::stderr(), "{}", format!($fmt $(, $($arg)*)?).dimmed());
    }};
}

#[macro_export]
macro_rules! info {
    () => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout());
    }};
    // format string literal (with or without inline formatting or args)
    ($fmt:literal $(, $($arg:tt)*)?) => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), $fmt $(, $($arg)*)?);
    }};
    // arbitrary expression (non-literal)
    ($expr:expr) => {{
        use std::io::{self, Write};
        let _ = writeln!(io::stdout(), "{}", $expr);
    }};
}

/// cyan section heading
pub fn heading(title: &str) {
    use colored::Colorize;
    info!();
    info!("{}", title.cyan().bold());
}

/// one "├── label: value" row of a summary block
pub fn row(label: &str, value: &str, last: bool) {
    use colored::Colorize;
    let prefix = if last { "└──" } else { "├──" };
    info!("{} {} {}", prefix.cyan(), format!("{label}:").dimmed(), value);
}

/// steady-ticking spinner with a message; finish it with one of the `spinner_*` helpers
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn spinner_done(spinner: &ProgressBar, message: &str) {
    use colored::Colorize;
    spinner.finish_and_clear();
    status!("{} {}", "✓".green(), message);
}

pub fn spinner_failed(spinner: &ProgressBar, message: &str) {
    use colored::Colorize;
    spinner.finish_and_clear();
    error!("{} {}", "✗".red(), message);
}

/// show everything but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

/// single keypress choice between `options`, returns the lowercased first
/// character of the chosen option
///
/// enter picks the first option, esc or ctrl-c exits
pub fn choose(question: &str, options: &[&str]) -> Result<char> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
        terminal::{disable_raw_mode, enable_raw_mode},
    };
    use std::io::{self, Write};

    debug_assert!(!options.is_empty(), "choose requires at least one option");

    // "[a]dd/[e]xit" and the matching key for each option
    let mut labels = Vec::with_capacity(options.len());
    let mut keys = Vec::with_capacity(options.len());
    for option in options {
        let mut chars = option.chars();
        let first = chars.next().unwrap_or('?');
        labels.push(format!("[{first}]{}", chars.as_str()));
        keys.push(first.to_lowercase().next().unwrap_or(first));
    }

    print!("{question} {} ? ", labels.join("/"));
    let _ = io::stdout().flush();

    enable_raw_mode().context("this command requires an interactive terminal")?;

    let selected = loop {
        let Ok(Event::Key(KeyEvent {
            code, modifiers, ..
        })) = event::read()
        else {
            continue;
        };
        match code {
            KeyCode::Esc => {
                disable_raw_mode().ok();
                info!("^C");
                std::process::exit(1);
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                disable_raw_mode().ok();
                info!("^C");
                std::process::exit(130);
            }
            KeyCode::Enter => break 0,
            KeyCode::Char(c) => {
                let lower = c.to_lowercase().next().unwrap_or(c);
                if let Some(idx) = keys.iter().position(|&key| key == lower) {
                    break idx;
                }
            }
            _ => {}
        }
    };

    disable_raw_mode().ok();
    info!(options[selected]);
    Ok(keys[selected])
}

/// read one line with editing support, `None` when the user cancels
pub fn read_line(label: &str, initial: &str) -> Result<Option<String>> {
    use rustyline::DefaultEditor;

    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;

    match editor.readline_with_initial(&format!("{label}: "), (initial, "")) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(_) => {
            info!("^C");
            Ok(None)
        }
    }
}
