// src/prompt.rs

//! Operator input
//!
//! The operator drives the updater with single-key commands and answers one
//! blocking continue/cancel question. [`TerminalOperator`] reads them from a
//! line-oriented input (stdin by default); [`ScriptedOperator`] replays a
//! fixed script for tests and non-interactive runs.

use crate::error::Result;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use strum_macros::Display;

/// Menu command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Command {
    #[strum(serialize = "update")]
    Update,
    #[strum(serialize = "downgrade")]
    Downgrade,
    #[strum(serialize = "self-test")]
    SelfTest,
    #[strum(serialize = "exit")]
    Exit,
}

impl Command {
    /// Parse a menu key (`a`, `y`, `x`, `b`) or the command name
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "a" | "update" => Some(Self::Update),
            "y" | "downgrade" => Some(Self::Downgrade),
            "x" | "self-test" | "selftest" => Some(Self::SelfTest),
            "b" | "exit" | "q" | "quit" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Source of operator decisions
pub trait Operator {
    /// Wait for the next menu command
    fn next_command(&mut self) -> Result<Command>;

    /// Ask a blocking continue/cancel question; `true` means continue
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Block until the operator asks to exit
    fn wait_for_exit(&mut self) -> Result<()> {
        while self.next_command()? != Command::Exit {}
        Ok(())
    }
}

/// Line-oriented operator on a terminal
pub struct TerminalOperator {
    input: Box<dyn BufRead>,
}

impl TerminalOperator {
    pub fn stdin() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader(input: impl BufRead + 'static) -> Self {
        Self {
            input: Box::new(input),
        }
    }

    /// Next trimmed, lowercased line; `None` at end of input
    fn read_answer(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_lowercase()))
    }
}

impl Operator for TerminalOperator {
    fn next_command(&mut self) -> Result<Command> {
        let mut stdout = io::stdout();
        loop {
            write!(stdout, "Choice [a/y/x/b]: ")?;
            stdout.flush()?;

            let Some(answer) = self.read_answer()? else {
                return Ok(Command::Exit);
            };
            match Command::from_key(&answer) {
                Some(command) => return Ok(command),
                None if answer.is_empty() => continue,
                None => writeln!(stdout, "Unknown option. Please try again.")?,
            }
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        writeln!(stdout)?;
        writeln!(stdout, "{}", question)?;
        writeln!(stdout, "  [a] Continue")?;
        writeln!(stdout, "  [b] Cancel")?;
        loop {
            write!(stdout, "Choice [a/b]: ")?;
            stdout.flush()?;

            // End of input cancels
            let Some(answer) = self.read_answer()? else {
                return Ok(false);
            };
            match answer.as_str() {
                "a" | "y" | "yes" | "continue" => return Ok(true),
                "b" | "n" | "no" | "cancel" => return Ok(false),
                _ => {}
            }
        }
    }
}

/// Operator that replays queued commands and answers
///
/// Once the script runs out every command is `Exit` and every question is
/// answered with cancel.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    commands: VecDeque<Command>,
    answers: VecDeque<bool>,
    questions: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        Self {
            commands: commands.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_answers(mut self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.answers.extend(answers);
        self
    }

    /// Questions asked so far
    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Operator for ScriptedOperator {
    fn next_command(&mut self) -> Result<Command> {
        Ok(self.commands.pop_front().unwrap_or(Command::Exit))
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_command_keys() {
        assert_eq!(Command::from_key("a"), Some(Command::Update));
        assert_eq!(Command::from_key(" Y\n"), Some(Command::Downgrade));
        assert_eq!(Command::from_key("x"), Some(Command::SelfTest));
        assert_eq!(Command::from_key("B"), Some(Command::Exit));
        assert_eq!(Command::from_key("downgrade"), Some(Command::Downgrade));
        assert_eq!(Command::from_key("z"), None);
        assert_eq!(Command::SelfTest.to_string(), "self-test");
    }

    #[test]
    fn test_terminal_operator_skips_unknown_input() {
        let mut operator = TerminalOperator::from_reader(Cursor::new(b"z\n\ny\n".to_vec()));
        assert_eq!(operator.next_command().unwrap(), Command::Downgrade);
        // End of input
        assert_eq!(operator.next_command().unwrap(), Command::Exit);
    }

    #[test]
    fn test_terminal_confirm() {
        let mut operator = TerminalOperator::from_reader(Cursor::new(b"maybe\na\nb\n".to_vec()));
        assert!(operator.confirm("Continue?").unwrap());
        assert!(!operator.confirm("Continue?").unwrap());
        assert!(!operator.confirm("Continue?").unwrap());
    }

    #[test]
    fn test_scripted_operator() {
        let mut operator =
            ScriptedOperator::new([Command::Update, Command::Update]).with_answers([true]);
        assert_eq!(operator.next_command().unwrap(), Command::Update);
        assert!(operator.confirm("first").unwrap());
        assert!(!operator.confirm("second").unwrap());
        assert_eq!(operator.questions(), &["first".to_string(), "second".to_string()]);

        operator.wait_for_exit().unwrap();
        assert_eq!(operator.next_command().unwrap(), Command::Exit);
    }
}
