use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

/// Questions and notices the booking flow puts to the user.
pub trait Prompter {
    /// Presents `message` with yes/no options and returns the user's decision.
    fn confirm(&self, message: &str) -> bool;

    fn notify(&self, level: Notice, message: &str);
}

/// Prompts on stderr, reads answers from stdin. Answers nothing but "y"/"yes" count as
/// consent; a closed stdin declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> bool {
        eprint!("{message} [y/N] ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }

    fn notify(&self, level: Notice, message: &str) {
        let tag = match level {
            Notice::Info => "info",
            Notice::Success => "ok",
            Notice::Warning => "warning",
            Notice::Error => "error",
        };
        eprintln!("{tag}: {message}");
    }
}
