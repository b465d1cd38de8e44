use crate::canvas::Canvas;
use crate::codec::default_file_name;
use crate::command::script_lines;
use crate::config::load_config;
use crate::render::{write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "wfc",
    version,
    about = "Workflow canvas: load, merge, script and export workflow documents"
)]
pub struct Args {
    /// Workflow document to load, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Workflow document to merge in after loading (repeatable)
    #[arg(short = 'a', long = "append")]
    pub append: Vec<PathBuf>,

    /// Command script: one slash command per line, '#' starts a comment
    #[arg(short = 's', long = "script")]
    pub script: Option<PathBuf>,

    /// Output file. JSON defaults to workflow-{timestamp}.json, SVG to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config file (JSON5): theme, themeVariables, layout, render, flowlineType
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Log every mutation to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    config.render.width = args.width;
    config.render.height = args.height;

    let mut canvas = Canvas::with_config(config.layout.clone());
    canvas.set_default_flowline_type(config.flowline_type);

    if let Some(path) = args.input.as_deref() {
        let input = read_input(path)?;
        let report = canvas
            .load_json(&input)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
    }

    for path in &args.append {
        let input = read_input(path)?;
        let report = canvas
            .append_json(&input)
            .with_context(|| format!("Failed to append {}", path.display()))?;
        for (old, new) in report.renamed() {
            eprintln!("{}: renamed '{old}' to '{new}'", path.display());
        }
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
    }

    if let Some(path) = args.script.as_deref() {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        run_script(&mut canvas, &script)
            .with_context(|| format!("Script {} failed", path.display()))?;
    }

    match args.output_format {
        OutputFormat::Json => {
            let json = canvas.save_json()?;
            let output = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_file_name(chrono::Utc::now())));
            std::fs::write(&output, json)?;
            eprintln!("Saved {}", output.display());
        }
        OutputFormat::Svg => {
            let svg = canvas.to_svg(&config.theme);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = canvas.to_svg(&config.theme);
            write_output_png(&svg, &output, &config.render, &config.theme)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init();
}

/// Runs every command of a script, stopping at the first failure.
fn run_script<M: crate::layout::Measure>(canvas: &mut Canvas<M>, script: &str) -> Result<()> {
    for (line_no, line) in script_lines(script) {
        let output = canvas
            .run(line)
            .map_err(|err| anyhow::anyhow!("line {line_no}: {err}"))?;
        eprintln!("{output}");
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_stops_at_the_failing_line() {
        let mut canvas = Canvas::new();
        let script = "# build\n/task-create \"Draft\"\n/task-advance \"Draft\"\n/workflow-status\n";
        let err = run_script(&mut canvas, script).unwrap_err();
        assert!(err.to_string().starts_with("line 3:"), "{err}");
        assert_eq!(canvas.stats().tasks, 1);
    }

    #[test]
    fn args_accept_repeated_appends() {
        let args = Args::try_parse_from(["wfc", "-i", "a.json", "-a", "b.json", "-a", "c.json", "-e", "svg"])
            .unwrap();
        assert_eq!(args.append.len(), 2);
        assert!(matches!(args.output_format, OutputFormat::Svg));
        assert!(!args.verbose);
    }

    #[test]
    fn png_needs_an_output_path() {
        assert!(ensure_output(&None, "png").is_err());
    }
}
