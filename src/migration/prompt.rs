//! Operator confirmation

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Asks the operator a yes/no question and returns the raw answer
pub trait OperatorPrompt {
    fn ask(&self, question: &str) -> io::Result<String>;
}

/// `y` or `yes`, ignoring case and surrounding whitespace
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Prompts on stdout and reads one line from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl OperatorPrompt for StdinPrompt {
    fn ask(&self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question} [y/N] ")?;
        stdout.flush()?;

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(answer)
    }
}

/// Answers yes without asking, for `--yes`
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl OperatorPrompt for AutoConfirm {
    fn ask(&self, question: &str) -> io::Result<String> {
        log::info!("{question} [auto-confirmed]");
        Ok("y".to_string())
    }
}

/// Gives a fixed answer and remembers the questions it was asked
#[derive(Debug)]
pub struct ScriptedPrompt {
    answer: io::Result<String>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Ok(answer.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A prompt whose input is broken, e.g. closed stdin
    pub fn failing() -> Self {
        Self {
            answer: Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no operator input")),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn ask(&self, question: &str) -> io::Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        match &self.answer {
            Ok(answer) => Ok(answer.clone()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        }
    }
}
