//! The interactive loop.
//!
//! Lines are collected until they form a `;`-terminated statement, then the
//! whole statement goes through the [`Executor`]. Errors are printed and the
//! loop carries on with the next statement.

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};

use pgterm_core::{Session, ShellConfig};
use pgterm_runtime::{Dispatcher, Executor};
use pgterm_sql::Prompter;
use pgterm_sql::command::{is_exit, is_help};

use crate::{help, render};

const CONTINUATION_PROMPT: &str = "... ";

pub async fn run<D, P>(mut executor: Executor<D, P>, settings: &ShellConfig) -> Result<()>
where
    D: Dispatcher,
    P: Prompter,
{
    let config = Config::builder()
        .max_history_size(settings.max_history)
        .context("invalid history size")?
        .history_ignore_dups(true)
        .context("invalid history settings")?
        .history_ignore_space(true)
        .build();
    let mut editor = DefaultEditor::with_config(config).context("failed to start line editor")?;

    let history_path = settings.history_path();
    if let Err(e) = editor.load_history(&history_path) {
        tracing::debug!(path = %history_path.display(), error = %e, "No history loaded");
    }

    let mut buffer = String::new();
    loop {
        // Rebuilt every time so schema and database changes show at once.
        let prompt = if buffer.is_empty() {
            prompt_for(executor.session())
        } else {
            CONTINUATION_PROMPT.to_string()
        };

        match editor.readline(&prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if !is_statement_complete(&buffer) {
                    continue;
                }
                let statement = std::mem::take(&mut buffer);
                let _ = editor.add_history_entry(statement.as_str());

                if is_exit(&statement) {
                    break;
                }
                if is_help(&statement) {
                    println!("{}", help::help_text(executor.session()));
                    continue;
                }

                match executor.execute(&statement).await {
                    Ok(report) => {
                        if report.prompt_reset {
                            tracing::debug!(
                                database = %executor.session().database(),
                                schema = %executor.session().schema(),
                                "Prompt reset"
                            );
                        }
                        println!("{}", render::render(&report.output));
                    }
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C drops the statement being typed.
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    if let Err(e) = editor.save_history(&history_path) {
        tracing::warn!(path = %history_path.display(), error = %e, "Failed to save history");
    }

    executor
        .shutdown()
        .await
        .context("failed to close connection")?;
    println!("Goodbye!");
    Ok(())
}

/// `pgterm [database.schema]> `
pub fn prompt_for(session: &Session) -> String {
    format!("pgterm [{}.{}]> ", session.database(), session.schema())
}

/// Whether `input` ends with a `;` that is not inside a string, a quoted
/// identifier or a comment. An unclosed `/*` keeps the statement open.
pub fn is_statement_complete(input: &str) -> bool {
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;
    let mut last_code: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    // A doubled quote is an escaped quote.
                    if chars.peek() == Some(&q) {
                        chars.next();
                    } else {
                        quote = None;
                        last_code = Some(c);
                    }
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    last_code = Some(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = '\0';
                    let mut closed = false;
                    for skipped in chars.by_ref() {
                        if prev == '*' && skipped == '/' {
                            closed = true;
                            break;
                        }
                        prev = skipped;
                    }
                    if !closed {
                        return false;
                    }
                }
                c if c.is_whitespace() => {}
                c => last_code = Some(c),
            },
        }
    }

    quote.is_none() && last_code == Some(';')
}
