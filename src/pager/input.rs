//! Answers to the pagination prompt.

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::pager::interrupt::InterruptFlag;

/// Answers that stop rendering (compared trimmed and case-insensitively)
pub const QUIT_WORDS: [&str; 3] = ["q", "quit", "exit"];

/// Whether a prompt answer asks to stop
#[must_use]
pub fn is_quit(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    QUIT_WORDS.contains(&answer.as_str())
}

/// Blocking source of one line of user input
pub trait LineInput {
    /// Read one line; `Ok(None)` at end of input
    ///
    /// Fails with [`io::ErrorKind::Interrupted`] when an interrupt shared
    /// through [`LineInput::set_interrupt`] is raised while waiting.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Interrupt to observe while blocked in [`LineInput::read_line`]
    fn set_interrupt(&mut self, _interrupt: InterruptFlag) {}
}

impl<T: LineInput + ?Sized> LineInput for &mut T {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        (**self).read_line()
    }

    fn set_interrupt(&mut self, interrupt: InterruptFlag) {
        (**self).set_interrupt(interrupt);
    }
}

impl<T: LineInput + ?Sized> LineInput for Box<T> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        (**self).read_line()
    }

    fn set_interrupt(&mut self, interrupt: InterruptFlag) {
        (**self).set_interrupt(interrupt);
    }
}

/// How often a waiting [`StdinInput`] checks its interrupt flag
pub const INTERRUPT_POLL: Duration = Duration::from_millis(50);

type Answer = io::Result<String>;

/// Reads answers from standard input (or another reader)
///
/// Lines are read on a background thread so that waiting for an answer can
/// be cut short by Ctrl-C. The thread starts at the first prompt.
#[derive(Default)]
pub struct StdinInput {
    reader: Option<Box<dyn BufRead + Send>>,
    answers: Option<Receiver<Answer>>,
    interrupt: Option<InterruptFlag>,
}

impl StdinInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read answers from `reader` instead of standard input
    #[must_use]
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self { reader: Some(Box::new(reader)), ..Self::default() }
    }

    fn answers(&mut self) -> io::Result<&Receiver<Answer>> {
        if self.answers.is_none() {
            let (tx, rx) = mpsc::channel();
            let reader = self.reader.take();
            thread::Builder::new().name("docshell-stdin".to_string()).spawn(move || match reader {
                Some(reader) => forward_lines(reader, &tx),
                None => forward_lines(io::stdin().lock(), &tx),
            })?;
            self.answers = Some(rx);
        }
        self.answers.as_ref().ok_or_else(|| io::Error::other("answer channel missing"))
    }
}

impl std::fmt::Debug for StdinInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinInput")
            .field("started", &self.answers.is_some())
            .field("interrupt", &self.interrupt)
            .finish_non_exhaustive()
    }
}

impl LineInput for StdinInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let interrupt = self.interrupt.clone();
        let answers = self.answers()?;

        let Some(interrupt) = interrupt else {
            return answers.recv().map_or(Ok(None), |answer| answer.map(Some));
        };
        loop {
            if interrupt.is_raised() {
                return Err(io::ErrorKind::Interrupted.into());
            }
            match answers.recv_timeout(INTERRUPT_POLL) {
                Ok(answer) => return answer.map(Some),
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    fn set_interrupt(&mut self, interrupt: InterruptFlag) {
        self.interrupt = Some(interrupt);
    }
}

/// Send every line of `reader` until end of input or until nobody listens
fn forward_lines(mut reader: impl BufRead, answers: &Sender<Answer>) {
    loop {
        let mut line = String::new();
        let answer = match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => Ok(line),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => Err(err),
        };
        let failed = answer.is_err();
        if answers.send(answer).is_err() || failed {
            return;
        }
    }
}

/// Pre-recorded answers, then end of input
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    asked: usize,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { answers: answers.into_iter().map(Into::into).collect(), asked: 0 }
    }

    /// How many times the prompt was answered (or hit end of input)
    #[must_use]
    pub const fn asked(&self) -> usize {
        self.asked
    }
}

impl LineInput for ScriptedInput {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.asked += 1;
        Ok(self.answers.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_words() {
        for answer in ["q", "Q", "quit", " QUIT \n", "exit", "Exit\r\n"] {
            assert!(is_quit(answer), "{answer:?}");
        }
        for answer in ["", "\n", "y", "quitting", "ex it"] {
            assert!(!is_quit(answer), "{answer:?}");
        }
    }

    /// Reader that never produces a line until its sender is dropped
    struct Stalled(mpsc::Receiver<()>);

    impl io::Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_reader_input_lines_then_end() {
        let mut input = StdinInput::from_reader(io::Cursor::new("\nq\n"));
        assert_eq!(input.read_line().unwrap(), Some("\n".to_string()));
        assert_eq!(input.read_line().unwrap(), Some("q\n".to_string()));
        assert_eq!(input.read_line().unwrap(), None);
        assert_eq!(input.read_line().unwrap(), None);
    }

    #[test]
    fn test_interrupt_ends_a_blocked_read() {
        let (_keep_blocked, rx) = mpsc::channel();
        let mut input = StdinInput::from_reader(io::BufReader::new(Stalled(rx)));
        let interrupt = InterruptFlag::new();
        input.set_interrupt(interrupt.clone());

        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupt.raise();
        });
        let err = input.read_line().unwrap_err();
        raiser.join().unwrap();

        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::new(["", "q"]);
        assert_eq!(input.read_line().unwrap(), Some(String::new()));
        assert_eq!(input.read_line().unwrap(), Some("q".to_string()));
        assert_eq!(input.read_line().unwrap(), None);
        assert_eq!(input.asked(), 3);
    }
}
