// src/cli.rs
use clap::{
    Parser, ValueHint,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use std::path::PathBuf;

const HELP_STR: &str = r#"
{before-help}{name} {version}
{author-with-newline}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"#;

// Custom styles for clap
pub fn custom_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightMagenta.on_default() | Effects::BOLD)
        .error(AnsiColor::BrightRed.on_default() | Effects::BOLD)
        .valid(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .invalid(AnsiColor::BrightYellow.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .placeholder(AnsiColor::BrightBlue.on_default())
        .usage(AnsiColor::BrightCyan.on_default() | Effects::BOLD | Effects::UNDERLINE)
}

// Custom parser to enforce .ir extension
fn parse_ir_file(s: &str) -> Result<PathBuf, String> {
    let p = PathBuf::from(s);
    let is_ir = p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("ir")).unwrap_or(false);
    if is_ir {
        Ok(p)
    } else {
        Err("expected a path to an .ir file".into())
    }
}

#[derive(Parser, Debug)]
#[command(
    version = clap::crate_version!(),
    author = clap::crate_authors!("\n"),
    about,
    long_about = None,
    help_template = HELP_STR,
    styles = custom_styles()
)]
pub struct Args {
    /// Input module (an .ir file is required)
    #[arg(
        short,
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        value_parser = parse_ir_file
    )]
    pub input: PathBuf,

    /// Parse and verify only; skip the optimization pipeline
    #[arg(long)]
    pub no_opt: bool,

    /// Dump every graph before optimization as well
    #[arg(long)]
    pub dump_initial: bool,

    /// Only optimize graphs whose name matches this regular expression
    #[arg(long, value_name = "REGEX")]
    pub only: Option<String>,

    /// Treat Unknown values as Top (fold dead code consuming them)
    #[arg(long)]
    pub unknown_as_top: bool,

    /// Share congruent computations across blocks
    #[arg(long)]
    pub gcse: bool,

    /// Print per-phase wall-clock timings
    #[arg(long)]
    pub timings: bool,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
