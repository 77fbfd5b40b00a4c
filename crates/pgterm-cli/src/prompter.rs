use std::io::{self, BufRead, Write};

use pgterm_sql::Prompter;

/// Asks for confirmation on the controlling terminal. Anything but an
/// explicit yes is a no.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str) -> io::Result<bool> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{message} [y/N]: ")?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for confirmation",
            ));
        }
        Ok(is_yes(&line))
    }
}

fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
