use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use termfx::config::{ConfigOverrides, TerminalConfig};
use termfx::effects::{BuildContext, EffectSpec, EFFECTS};
use termfx::error::ErrorEnvelope;
use termfx::geometry::Anchor;
use termfx::terminal::{install_panic_hook, terminal_size, FramePacer, TerminalOutput};
use termfx::EffectIterator;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TERMFX_LOG";

#[derive(Debug, Parser)]
#[command(name = "termfx")]
#[command(about = "Terminal character animation effects")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TERMFX_GIT_HASH"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Animate input text in the terminal.
    Play {
        effect: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Write frames to stdout without terminal control sequences.
    Render {
        effect: String,
        #[command(flatten)]
        run: RunArgs,
        /// Only print the final frame.
        #[arg(long)]
        last: bool,
        /// Print a JSON summary instead of frames; errors become a JSON envelope.
        #[arg(long)]
        json: bool,
    },
    /// List registered effects.
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Input text file; stdin when omitted.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,
    /// Terminal configuration YAML.
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Effect configuration YAML.
    #[arg(long = "effect-config")]
    effect_config: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    #[arg(long = "canvas-anchor", value_parser = parse_anchor)]
    canvas_anchor: Option<Anchor>,
    #[arg(long = "text-anchor", value_parser = parse_anchor)]
    text_anchor: Option<Anchor>,
    #[arg(long = "frame-rate")]
    frame_rate: Option<u32>,
    #[arg(long = "tab-width")]
    tab_width: Option<usize>,
    #[arg(long = "wrap-text")]
    wrap_text: bool,
    #[arg(long = "xterm-colors")]
    xterm_colors: bool,
    #[arg(long = "no-color")]
    no_color: bool,
    #[arg(long = "end-symbol")]
    end_symbol: Option<String>,
    /// Play on the alternate screen; `render` ignores it.
    #[arg(long = "alternate-screen")]
    alternate_screen: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            width: self.width,
            height: self.height,
            canvas_anchor: self.canvas_anchor,
            text_anchor: self.text_anchor,
            frame_rate: self.frame_rate,
            tab_width: self.tab_width,
            wrap_text: self.wrap_text.then_some(true),
            xterm_colors: self.xterm_colors.then_some(true),
            no_color: self.no_color.then_some(true),
            end_symbol: self.end_symbol.clone(),
            alternate_screen: self.alternate_screen.then_some(true),
        }
    }
}

fn parse_anchor(value: &str) -> Result<Anchor, String> {
    value.parse::<Anchor>().map_err(|error| error.to_string())
}

struct Prepared {
    config: TerminalConfig,
    terminal: Option<(usize, usize)>,
    effect: EffectIterator,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct RenderSummary<'a> {
    ok: bool,
    effect: &'a str,
    frames: usize,
    ticks: u64,
    width: usize,
    height: usize,
    last_frame: Vec<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let json = matches!(
        cli.command,
        Commands::Render { json: true, .. } | Commands::List { json: true }
    );

    if let Err(error) = run(cli) {
        if json {
            let envelope = ErrorEnvelope::from_error(&error);
            match serde_json::to_string_pretty(&envelope) {
                Ok(body) => println!("{body}"),
                Err(_) => eprintln!("error: {error:#}"),
            }
        } else {
            eprintln!("error: {error:#}");
        }
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Play { effect, run } => run_play(&effect, &run),
        Commands::Render {
            effect,
            run,
            last,
            json,
        } => run_render(&effect, &run, last, json),
        Commands::List { json } => run_list(json),
    }
}

fn prepare(effect_name: &str, args: &RunArgs, detect_terminal: bool) -> Result<Prepared> {
    let mut config = match &args.config {
        Some(path) => TerminalConfig::load(path)?,
        None => TerminalConfig::default(),
    };
    config
        .apply(args.overrides())
        .context("invalid terminal options")?;

    let spec = match &args.effect_config {
        Some(path) => EffectSpec::load(effect_name, path)?,
        None => EffectSpec::from_name(effect_name)?,
    };

    let input = read_input(args)?;
    if input.trim().is_empty() {
        bail!("no input text; pass --input or pipe text on stdin");
    }

    let terminal = if detect_terminal { terminal_size() } else { None };
    let canvas = config.canvas(&input, terminal)?;
    debug!(
        effect = spec.name(),
        width = canvas.width(),
        height = canvas.height(),
        seed = args.seed,
        "building effect"
    );
    let context = BuildContext {
        input: &input,
        canvas,
        ingest: config.ingest_options(),
        color_mode: config.color_mode(),
        seed: args.seed,
    };
    let effect = spec
        .build(&context)
        .with_context(|| format!("failed to build effect '{}'", spec.name()))?;

    Ok(Prepared {
        config,
        terminal,
        effect,
        name: spec.name(),
    })
}

fn read_input(args: &RunArgs) -> Result<String> {
    match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input {}", path.display())),
        None => {
            let mut stdin = io::stdin();
            if stdin.is_terminal() {
                bail!("no input text; pass --input or pipe text on stdin");
            }
            let mut input = String::new();
            stdin
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

fn run_play(effect_name: &str, args: &RunArgs) -> Result<()> {
    let Prepared {
        config,
        terminal,
        effect,
        name,
    } = prepare(effect_name, args, true)?;
    install_panic_hook(config.alternate_screen);

    let canvas = *effect.stage().canvas();
    let mut output = TerminalOutput::acquire(
        io::stdout().lock(),
        (canvas.width(), canvas.height()),
        config.canvas_anchor,
        terminal,
        config.end_symbol.clone(),
        config.alternate_screen,
    )
    .context("failed to prepare terminal")?;
    let mut pacer = FramePacer::new(config.frame_rate);

    let mut frames = 0_usize;
    for frame in effect {
        pacer.wait();
        output.print(&frame).context("failed to write frame")?;
        frames += 1;
    }
    output.finish().context("failed to restore terminal")?;
    info!(effect = name, frames, "playback finished");
    Ok(())
}

fn run_render(effect_name: &str, args: &RunArgs, last: bool, json: bool) -> Result<()> {
    let Prepared {
        config,
        mut effect,
        name,
        ..
    } = prepare(effect_name, args, false)?;
    let canvas = *effect.stage().canvas();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0_usize;
    let mut final_frame = None;
    for frame in effect.by_ref() {
        frames += 1;
        if !last && !json {
            writeln!(out, "{}", frame.to_text()).context("failed to write frame")?;
        }
        final_frame = Some(frame);
    }

    if json {
        let summary = RenderSummary {
            ok: true,
            effect: name,
            frames,
            ticks: effect.tick(),
            width: canvas.width(),
            height: canvas.height(),
            last_frame: final_frame
                .map(|frame| frame.plain_lines().to_vec())
                .unwrap_or_default(),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else if last {
        if let Some(frame) = final_frame {
            write!(out, "{}{}", frame.to_text(), config.end_symbol)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_list(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&EFFECTS)?);
        return Ok(());
    }
    for info in EFFECTS {
        println!("{:<14} {}", info.name, info.description);
    }
    Ok(())
}
