use crate::bootstrap;
use crate::catalog::{self, NERD_FONTS_BASE_URL, NERD_FONTS_RELEASE};
use crate::engine::{Confirm, Extractor, Fetcher, HttpFetcher, InstallEngine, TarExtractor};
use crate::layout::FontLayout;
use crate::model::{AnswerPolicy, InstallEvent, RunConfig, RunSummary, Scope};
use crate::privilege::Privilege;
use crate::prompt::{self, LineEditor, LineSource, StdinConfirm, TerminalLock};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// With `--json` stdout carries only the summary, so progress goes to stderr too.
fn route_event(ev: &InstallEvent, json: bool) -> OutputLine {
    let line = ev.to_message();
    if json || ev.is_error() {
        OutputLine::Stderr(line)
    } else {
        OutputLine::Stdout(line)
    }
}

/// Spawn a blocking writer for stdout/stderr so workers never block on the terminal.
fn spawn_output_writer(
    terminal: TerminalLock,
) -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    spawn_output_writer_to(std::io::stdout(), std::io::stderr(), terminal)
}

fn spawn_output_writer_to<O, E>(
    mut stdout: O,
    mut stderr: E,
    terminal: TerminalLock,
) -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
)
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        while let Some(line) = rx.blocking_recv() {
            // Per line, so an overwrite question is never split by progress output.
            let _terminal = terminal.lock().unwrap_or_else(|e| e.into_inner());
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(stdout, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(stderr, "{}", msg);
                }
            }
        }

        let _ = stdout.flush();
        let _ = stderr.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "nerdfont-install",
    version,
    about = "Pick Nerd Fonts by name and install them for this user or system-wide"
)]
pub struct Cli {
    /// Install scope; asked interactively when omitted
    #[arg(long, value_enum)]
    pub scope: Option<Scope>,

    /// Nerd Fonts release tag to download from
    #[arg(long, default_value = NERD_FONTS_RELEASE)]
    pub release: String,

    /// Base URL of the release downloads
    #[arg(long, default_value = NERD_FONTS_BASE_URL)]
    pub base_url: String,

    /// Maximum number of fonts downloaded at once
    #[arg(long, default_value_t = 5)]
    pub jobs: usize,

    /// Download+extract attempts per font
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    /// Time limit for a single download+extract attempt
    #[arg(long, default_value = "10s")]
    pub timeout: humantime::Duration,

    /// Pause between failed attempts
    #[arg(long, default_value = "1s")]
    pub retry_delay: humantime::Duration,

    /// Which answers to "override it?" count as yes
    #[arg(long, value_enum, default_value_t = AnswerPolicy::Strict)]
    pub overwrite_answers: AnswerPolicy,

    /// Program used for privileged operations in global scope
    #[arg(long = "sudo", default_value = "sudo")]
    pub elevation_helper: String,

    /// Font cache rebuild command run after installing
    #[arg(long, default_value = "fc-cache")]
    pub cache_tool: String,

    /// Print the known font names and exit
    #[arg(long)]
    pub list: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        base_url: args.base_url.clone(),
        release: args.release.clone(),
        concurrency: args.jobs.max(1),
        max_attempts: args.attempts.max(1),
        attempt_timeout: Duration::from(args.timeout),
        retry_delay: Duration::from(args.retry_delay),
        overwrite_answers: args.overwrite_answers,
        user_agent: format!("nerdfont-install/{}", env!("CARGO_PKG_VERSION")),
        elevation_helper: args.elevation_helper.clone(),
        cache_tool: args.cache_tool.clone(),
    }
}

/// Runs the whole interactive session. Returns the summary, or `None` when the user
/// ended input before choosing anything.
pub async fn run(args: Cli) -> Result<Option<RunSummary>> {
    if args.list {
        for font in catalog::FONTS {
            println!("{font}");
        }
        return Ok(None);
    }

    let cfg = build_config(&args);
    let mut editor = LineEditor::new()?;

    let scope = match args.scope {
        Some(scope) => scope,
        None => match prompt::ask_scope(&mut editor)? {
            Some(scope) => scope,
            None => return Ok(None),
        },
    };
    let layout = FontLayout::resolve(scope)?;

    let selected = prepare_and_select(
        scope,
        &layout,
        &cfg.elevation_helper,
        &mut editor,
        &mut std::io::stderr(),
    )
    .await?;
    let Some((privilege, fonts)) = selected else {
        return Ok(None);
    };
    drop(editor);

    let terminal = TerminalLock::default();
    let fetcher = HttpFetcher::new(&cfg.user_agent)?;
    let engine = InstallEngine::new(
        cfg.clone(),
        layout,
        privilege,
        fetcher,
        TarExtractor::default(),
        StdinConfirm::new(terminal.clone()),
    );

    let (out_tx, out_handle) = spawn_output_writer(terminal);
    let json = args.json;
    let (summary, refresh_err) = install_then_refresh(
        engine,
        fonts,
        |ev| {
            let _ = out_tx.send(route_event(&ev, json));
        },
        || bootstrap::spawn_cache_refresh(&cfg.cache_tool),
    )
    .await?;
    if let Some(e) = refresh_err {
        let _ = out_tx.send(OutputLine::Stderr(format!("Warning: {e:#}")));
    }

    if args.json {
        let out = serde_json::to_string_pretty(&summary)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::text_summary::build_text_summary(&summary).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(Some(summary))
}

/// Get the scope ready, then ask which fonts to install. Done before selection so
/// nothing downloads into a missing directory. `Ok(None)` when input ends first.
async fn prepare_and_select(
    scope: Scope,
    layout: &FontLayout,
    elevation_helper: &str,
    source: &mut impl LineSource,
    warn: &mut impl Write,
) -> Result<Option<(Privilege, Vec<String>)>> {
    let privilege = match scope {
        Scope::Local => {
            bootstrap::prepare_local(layout)?;
            Privilege::User
        }
        Scope::Global => Privilege::acquire(elevation_helper).await?,
    };
    Ok(prompt::select_fonts(source, warn)?.map(|fonts| (privilege, fonts)))
}

/// Drive the engine to completion, handing each event to `on_event`, then start the
/// cache refresh. A refresh failure comes back next to the summary.
async fn install_then_refresh<F, X, C>(
    engine: InstallEngine<F, X, C>,
    fonts: Vec<String>,
    mut on_event: impl FnMut(InstallEvent),
    refresh: impl FnOnce() -> Result<()>,
) -> Result<(RunSummary, Option<anyhow::Error>)>
where
    F: Fetcher,
    X: Extractor,
    C: Confirm,
{
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<InstallEvent>();
    let handle = tokio::spawn(async move { engine.run(fonts, evt_tx).await });

    while let Some(ev) = evt_rx.recv().await {
        on_event(ev);
    }

    let summary = handle.await.context("install engine task failed")?;

    // Always refresh, whatever happened to individual fonts.
    Ok((summary, refresh().err()))
}
