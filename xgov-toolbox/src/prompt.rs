//! Operator interaction. The voting flow asks through [`Prompter`]; the
//! command line answers from the terminal and tests answer from a script.

use owo_colors::OwoColorize;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("aborted by the operator")]
    Aborted,

    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

/// An entry of a selection list. Disabled entries are shown with their
/// reason but cannot be picked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub description: Option<String>,
    pub disabled: Option<String>,
}

impl Choice {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            disabled: None,
        }
    }

    pub fn is_selectable(&self) -> bool {
        self.disabled.is_none()
    }
}

pub trait Prompter {
    /// Index of the picked choice; never a disabled one.
    fn select(&mut self, message: &str, choices: &[Choice]) -> Result<usize, Error>;

    /// Indices of the picked options, ascending and without repeats.
    fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<usize>, Error>;

    /// Raw answer to a weight prompt; validation is the caller's job.
    fn prompt_weight(&mut self, question: &str, remaining: u64) -> Result<String, Error>;

    fn confirm(&mut self, message: &str) -> Result<bool, Error>;

    /// Shows a message that needs no answer.
    fn notify(&mut self, message: &str);
}

/// Line input and output of an interactive terminal.
pub trait Terminal {
    /// `None` once the operator closed or interrupted the input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, Error>;

    fn write_line(&mut self, line: &str);
}

/// The process terminal, driven by `rustyline-async`.
pub struct ReadlineTerminal {
    readline: Readline,
    writer: SharedWriter,
}

impl ReadlineTerminal {
    pub fn new() -> Result<Self, Error> {
        let (readline, writer) = Readline::new(String::new())?;
        Ok(Self { readline, writer })
    }
}

impl Terminal for ReadlineTerminal {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, Error> {
        self.readline.update_prompt(prompt)?;
        let readline = &mut self.readline;
        // Prompter is synchronous and runs on a runtime worker
        let event = tokio::task::block_in_place(|| futures::executor::block_on(readline.readline()))?;
        match event {
            ReadlineEvent::Line(line) => Ok(Some(line)),
            ReadlineEvent::Eof | ReadlineEvent::Interrupted => Ok(None),
        }
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{}", line);
    }
}

impl Drop for ReadlineTerminal {
    fn drop(&mut self) {
        let _ = self.readline.flush();
    }
}

const ABORT: &str = "q";

/// Terminal prompter. End of input, Ctrl-C or `q` aborts.
pub struct ConsolePrompter<T> {
    terminal: T,
}

impl ConsolePrompter<ReadlineTerminal> {
    pub fn open() -> Result<Self, Error> {
        ReadlineTerminal::new().map(Self::new)
    }
}

impl<T: Terminal> ConsolePrompter<T> {
    pub fn new(terminal: T) -> Self {
        Self { terminal }
    }

    fn ask(&mut self, message: &str) -> Result<String, Error> {
        let prompt = format!("{} {} ", "?".green(), message.bold());
        let line = self.terminal.read_line(&prompt)?.ok_or(Error::Aborted)?;
        let answer = line.trim();
        if answer == ABORT {
            return Err(Error::Aborted);
        }
        Ok(answer.to_string())
    }

    fn say(&mut self, message: &str) {
        self.terminal.write_line(message)
    }
}

fn parse_indices(answer: &str, len: usize) -> Option<Vec<usize>> {
    let mut indices = answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok().filter(|n| (1..=len).contains(n)))
        .map(|n| n.map(|n| n - 1))
        .collect::<Option<Vec<_>>>()?;
    indices.sort_unstable();
    indices.dedup();
    Some(indices)
}

impl<T: Terminal> Prompter for ConsolePrompter<T> {
    fn select(&mut self, message: &str, choices: &[Choice]) -> Result<usize, Error> {
        loop {
            for (n, choice) in choices.iter().enumerate() {
                match &choice.disabled {
                    Some(reason) => {
                        self.say(&format!("  {}) {} {}", n + 1, choice.label.dimmed(), reason))
                    }
                    None => self.say(&format!("  {}) {}", n + 1, choice.label)),
                }
                if let Some(description) = &choice.description {
                    self.say(&format!("     {}", description.dimmed()));
                }
            }
            let answer = self.ask(message)?;
            match parse_indices(&answer, choices.len()).as_deref() {
                Some([index]) if choices[*index].is_selectable() => return Ok(*index),
                _ => self.say(&"Pick one of the enabled entries by number".red().to_string()),
            }
        }
    }

    fn select_many(&mut self, message: &str, options: &[String]) -> Result<Vec<usize>, Error> {
        for (n, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", n + 1, option));
        }
        loop {
            let answer = self.ask(&format!("{} (numbers separated by commas)", message))?;
            match parse_indices(&answer, options.len()) {
                Some(indices) => return Ok(indices),
                None => self.say(&"Unknown entry".red().to_string()),
            }
        }
    }

    fn prompt_weight(&mut self, question: &str, remaining: u64) -> Result<String, Error> {
        self.ask(&format!(
            "Enter vote weight for {} ({} available):",
            question.cyan(),
            remaining
        ))
    }

    fn confirm(&mut self, message: &str) -> Result<bool, Error> {
        loop {
            match self.ask(&format!("{} (y/n)", message))?.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Answer y or n"),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        self.say(message)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back typed lines; `None` stands for Ctrl-C.
    #[derive(Default)]
    struct TypedLines {
        lines: VecDeque<Option<String>>,
        output: Vec<String>,
    }

    impl Terminal for TypedLines {
        fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, Error> {
            Ok(self.lines.pop_front().flatten())
        }

        fn write_line(&mut self, line: &str) {
            self.output.push(line.to_string());
        }
    }

    fn console(input: &str) -> ConsolePrompter<TypedLines> {
        ConsolePrompter::new(TypedLines {
            lines: input.lines().map(|line| Some(line.to_string())).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn select_skips_disabled_entries() {
        let choices = vec![
            Choice {
                disabled: Some("(voted)".to_string()),
                ..Choice::new("first")
            },
            Choice::new("second"),
        ];
        let mut prompter = console("1\n2\n");
        assert_eq!(prompter.select("Select Voting Round", &choices).unwrap(), 1);
        assert!(prompter
            .terminal
            .output
            .iter()
            .any(|line| line.contains("(voted)")));
    }

    #[test]
    fn select_many_parses_lists() {
        let options = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut prompter = console("9\n3, 1 3\n");
        assert_eq!(
            prompter.select_many("Select Questions", &options).unwrap(),
            vec![0, 2]
        );

        let mut prompter = console("\n");
        assert!(prompter
            .select_many("Select Questions", &options)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn end_of_input_aborts() {
        let mut prompter = console("");
        assert!(matches!(prompter.confirm("Submit?"), Err(Error::Aborted)));

        let mut prompter = console("q\n");
        assert!(matches!(prompter.prompt_weight("Q1", 10), Err(Error::Aborted)));
    }

    #[test]
    fn interrupt_aborts() {
        let mut prompter = ConsolePrompter::new(TypedLines {
            lines: VecDeque::from([Some("maybe".to_string()), None]),
            ..Default::default()
        });
        assert!(matches!(prompter.confirm("Submit?"), Err(Error::Aborted)));
    }

    #[test]
    fn confirm_repeats_until_answered() {
        let mut prompter = console("maybe\nY\n");
        assert!(prompter.confirm("Submit?").unwrap());
    }
}
