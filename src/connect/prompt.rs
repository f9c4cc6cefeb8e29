use std::io::{self, BufRead, Write};

/// Asks the user a question and returns their raw answer
pub trait Prompter: Send + Sync {
    fn prompt(&self, message: &str) -> io::Result<String>;
}

/// Prompts on stdout and reads a single line from stdin
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, message: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(message.as_bytes())?;
        stdout.flush()?;

        read_answer(&mut io::stdin().lock())
    }
}

fn read_answer(reader: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before an answer was given",
        ));
    }

    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Whether an answer to a `[y/n]` question is affirmative
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted answers and records every question asked
    #[derive(Default)]
    pub struct ScriptedPrompter {
        answers: Mutex<VecDeque<io::Result<String>>>,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedPrompter {
        pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().map(|a| Ok(a.into())).collect()),
                asked: Mutex::default(),
            }
        }

        pub fn with_answer(self, answer: io::Result<String>) -> Self {
            self.answers.lock().unwrap().push_back(answer);
            self
        }

        pub fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    impl Prompter for ScriptedPrompter {
        fn prompt(&self, message: &str) -> io::Result<String> {
            self.asked.lock().unwrap().push(message.to_string());
            self.answers.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "no scripted answer left",
                ))
            })
        }
    }
}
