use clap::{ArgAction, Parser};
use doc_styler::config::{self, StylerConfig};
use doc_styler::confirm::{NoTtyPolicy, StdinConfirm};
use doc_styler::fragments::{Family, Feature, StylesheetMode};
use doc_styler::inject::{self, Outcome, Request, StyleError};
use doc_styler::output;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "doc-styler")]
#[command(about = "Idempotent styling injector for compiled HTML documents")]
#[command(long_about = "\
Idempotent styling injector for compiled HTML documents

Links (or embeds) a stylesheet and optionally adds a light/dark/auto theme
toggle and a table-of-contents sidebar. Earlier injections are removed first,
so running it again replaces them instead of stacking them.

Where things go:

  <head>   viewport meta (bootstrap)   ← start of head
           stylesheet link or <style>  ← end of head
           feature styles
  <body>   theme toggle, TOC sidebar   ← start of body
           ...document content...
           feature scripts             ← end of body
           bootstrap bundle

Missing <head>/<body> elements are created inside <html>. <style> blocks whose
first line is a comment containing \"Diagram colors\" are kept.

Run 'doc-styler --gen-config' to generate a documented doc-styler.toml.")]
#[command(version = version_string())]
struct Cli {
    /// HTML document to style
    #[arg(required_unless_present = "gen_config")]
    input: Option<PathBuf>,

    /// Where to write the result (default: overwrite the input)
    output: Option<PathBuf>,

    /// Embed the stylesheet in a <style> block instead of linking it
    #[arg(long)]
    inline: bool,

    /// Replace existing styling without asking
    #[arg(long)]
    force: bool,

    /// Add the light/dark/auto theme toggle
    #[arg(long)]
    theme_toggle: bool,

    /// Add the table-of-contents sidebar
    #[arg(long)]
    toc_sidebar: bool,

    /// Use Bootstrap 5 components (family = "bootstrap")
    #[arg(long)]
    bootstrap: bool,

    /// Stylesheet to link or embed (default: styles.css, bootstrap: styles-bootstrap.css)
    #[arg(long, value_name = "PATH")]
    css: Option<String>,

    /// Append ?v=<mtime> to the stylesheet link
    #[arg(long)]
    cache_bust: bool,

    /// What to do when the overwrite prompt cannot be answered
    #[arg(long, value_enum, value_name = "POLICY")]
    on_no_tty: Option<NoTtyPolicy>,

    /// Config file (default: doc-styler.toml next to the input)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print a stock doc-styler.toml with all options documented
    #[arg(long)]
    gen_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    match style(&cli) {
        Ok(Outcome::Written(report)) => {
            if cli.json {
                match output::report_json(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                output::print_report(&report);
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::Aborted) => {
            if cli.json {
                match output::aborted_json() {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("Aborted.");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr; stdout carries the report.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn style(cli: &Cli) -> Result<Outcome, StyleError> {
    let input = cli
        .input
        .clone()
        .ok_or_else(|| StyleError::MissingInput(PathBuf::new()))?;
    let document_dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let (config, _) = config::load_config(document_dir, cli.config.as_deref())?;
    let config = apply_overrides(config, cli)?;

    let features = [
        (cli.theme_toggle, Feature::ThemeToggle),
        (cli.toc_sidebar, Feature::TocSidebar),
    ]
    .into_iter()
    .filter_map(|(on, feature)| on.then_some(feature))
    .collect();

    let request = Request {
        input,
        output: cli.output.clone(),
        mode: if cli.inline {
            StylesheetMode::Inline
        } else {
            StylesheetMode::External
        },
        features,
        force: cli.force,
        config,
    };
    inject::run(&request, &mut StdinConfirm::stdio())
}

/// Command-line flags win over the config file.
fn apply_overrides(mut config: StylerConfig, cli: &Cli) -> Result<StylerConfig, StyleError> {
    if cli.bootstrap {
        config.family = Family::Bootstrap;
    }
    if let Some(css) = &cli.css {
        config.stylesheet = Some(css.clone());
    }
    if cli.cache_bust {
        config.cache_bust = true;
    }
    if let Some(policy) = cli.on_no_tty {
        config.on_no_tty = policy;
    }
    config.validate()?;
    Ok(config)
}
