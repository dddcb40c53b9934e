//! Terminal prompts: scope question, font selection with completion, overwrite confirmation.

use crate::catalog;
use crate::engine::Confirm;
use crate::model::{AnswerPolicy, Scope};
use anyhow::{Context, Result};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::config::{Behavior, Config};
use rustyline::{Editor, Helper};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

const SCOPE_PROMPT: &str = "Do you want to save the fonts globally (across entire system) (y/N)? : ";
const SELECT_PROMPT: &str = "Select your fonts: ";

/// Something that can read one line of user input. `Ok(None)` means input ended.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Tab completion of catalog names for the word under the cursor.
struct FontHelper;

/// Start of the word ending at `pos` and the catalog names it could complete to.
fn completion_candidates(line: &str, pos: usize) -> (usize, Vec<String>) {
    let head = &line[..pos];
    let start = head.rfind([' ', '\t']).map_or(0, |i| i + 1);
    let candidates = catalog::complete(&head[start..])
        .map(str::to_string)
        .collect();
    (start, candidates)
}

impl Completer for FontHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(completion_candidates(line, pos))
    }
}

impl Hinter for FontHelper {
    type Hint = String;
}

impl Highlighter for FontHelper {}

impl Validator for FontHelper {}

impl Helper for FontHelper {}

/// Interactive line editor backed by rustyline.
pub struct LineEditor {
    editor: Editor<FontHelper, DefaultHistory>,
}

impl LineEditor {
    pub fn new() -> Result<Self> {
        // Prompts go to the terminal even when stdout is redirected.
        let config = Config::builder().behavior(Behavior::PreferTerm).build();
        let mut editor = Editor::<FontHelper, DefaultHistory>::with_config(config)
            .context("failed to open terminal")?;
        editor.set_helper(Some(FontHelper));
        Ok(Self { editor })
    }
}

impl LineSource for LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(e).context("failed to read input"),
        }
    }
}

/// Ask for the install scope. Anything but a yes means local.
pub fn ask_scope(source: &mut impl LineSource) -> Result<Option<Scope>> {
    Ok(source.read_line(SCOPE_PROMPT)?.map(|answer| {
        if AnswerPolicy::Strict.accepts(&answer) {
            Scope::Global
        } else {
            Scope::Local
        }
    }))
}

/// Prompt until at least one catalog font is named. Unknown names are reported to `warn`
/// and dropped. `Ok(None)` when input ends first.
pub fn select_fonts(
    source: &mut impl LineSource,
    warn: &mut impl Write,
) -> Result<Option<Vec<String>>> {
    loop {
        let Some(line) = source.read_line(SELECT_PROMPT)? else {
            return Ok(None);
        };
        let selection = catalog::partition(&line);
        if !selection.unknown.is_empty() {
            writeln!(warn, "Unknown fonts: {}", selection.unknown.join(" "))?;
        }
        if !selection.valid.is_empty() {
            return Ok(Some(selection.valid));
        }
    }
}

/// Held by whoever is writing to the terminal. The output writer takes it per line,
/// an overwrite question holds it until the answer is read.
pub type TerminalLock = Arc<Mutex<()>>;

/// Write `question` to `out` and read one line from `input`, keeping the terminal
/// to ourselves meanwhile.
fn ask_blocking(
    question: &str,
    input: &mut impl BufRead,
    out: &mut impl Write,
    terminal: &Mutex<()>,
) -> Result<String> {
    let _terminal = terminal.lock().unwrap_or_else(|e| e.into_inner());
    write!(out, "{question}")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer)
}

/// Overwrite questions on stderr, answered on stdin, one at a time across all workers.
pub struct StdinConfirm {
    turn: tokio::sync::Mutex<()>,
    terminal: TerminalLock,
}

impl StdinConfirm {
    pub fn new(terminal: TerminalLock) -> Self {
        Self {
            turn: tokio::sync::Mutex::new(()),
            terminal,
        }
    }
}

impl Confirm for StdinConfirm {
    async fn ask(&self, question: String) -> Result<String> {
        let _turn = self.turn.lock().await;
        let terminal = self.terminal.clone();
        tokio::task::spawn_blocking(move || {
            ask_blocking(
                &question,
                &mut std::io::stdin().lock(),
                &mut std::io::stderr(),
                &terminal,
            )
        })
        .await
        .context("prompt task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        lines: VecDeque<&'static str>,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn new(lines: &[&'static str]) -> Self {
            Self {
                lines: lines.iter().copied().collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            self.prompts.push(prompt.to_string());
            Ok(self.lines.pop_front().map(str::to_string))
        }
    }

    #[test]
    fn unknown_fonts_are_warned_and_dropped() {
        let mut input = Scripted::new(&["Hack FooBar JetBrainsMono"]);
        let mut warnings = Vec::new();

        let fonts = select_fonts(&mut input, &mut warnings).unwrap();

        assert_eq!(fonts, Some(vec!["Hack".to_string(), "JetBrainsMono".to_string()]));
        assert_eq!(String::from_utf8(warnings).unwrap(), "Unknown fonts: FooBar\n");
    }

    #[test]
    fn reprompts_until_a_valid_font_is_given() {
        let mut input = Scripted::new(&["", "FooBar Baz", "   ", "Noto"]);
        let mut warnings = Vec::new();

        let fonts = select_fonts(&mut input, &mut warnings).unwrap();

        assert_eq!(fonts, Some(vec!["Noto".to_string()]));
        assert_eq!(input.prompts.len(), 4);
        assert!(input.prompts.iter().all(|p| p == SELECT_PROMPT));
        assert_eq!(String::from_utf8(warnings).unwrap(), "Unknown fonts: FooBar Baz\n");
    }

    #[test]
    fn end_of_input_aborts_selection() {
        let mut input = Scripted::new(&["Nope"]);
        let fonts = select_fonts(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(fonts, None);
    }

    #[test]
    fn scope_defaults_to_local() {
        let mut input = Scripted::new(&["y", "", "nah", "YES"]);
        assert_eq!(ask_scope(&mut input).unwrap(), Some(Scope::Global));
        assert_eq!(ask_scope(&mut input).unwrap(), Some(Scope::Local));
        assert_eq!(ask_scope(&mut input).unwrap(), Some(Scope::Local));
        assert_eq!(ask_scope(&mut input).unwrap(), Some(Scope::Global));
        assert_eq!(ask_scope(&mut input).unwrap(), None);
        assert_eq!(input.prompts[0], SCOPE_PROMPT);
    }

    #[test]
    fn overwrite_question_is_written_before_the_answer_is_read() {
        let terminal = Mutex::new(());
        let mut input = std::io::Cursor::new("y\nleftover\n");
        let mut out = Vec::new();

        let answer = ask_blocking("Hack already exists. Override? ", &mut input, &mut out, &terminal)
            .unwrap();

        assert_eq!(answer, "y\n");
        assert_eq!(String::from_utf8(out).unwrap(), "Hack already exists. Override? ");
        assert!(terminal.try_lock().is_ok());
    }

    #[test]
    fn completes_the_word_under_the_cursor() {
        let line = "Hack Jet";
        let (start, candidates) = completion_candidates(line, line.len());
        assert_eq!(start, 5);
        assert_eq!(candidates, vec!["JetBrainsMono"]);

        let (start, candidates) = completion_candidates("Ubu", 3);
        assert_eq!(start, 0);
        assert_eq!(candidates, vec!["Ubuntu", "UbuntuMono"]);

        let (_, candidates) = completion_candidates("Hack ", 5);
        assert_eq!(candidates.len(), catalog::FONTS.len());
    }
}
