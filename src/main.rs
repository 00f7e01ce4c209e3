use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "snip-ocr",
    version,
    about = "Recognize and translate text inside a region of a screenshot"
)]
struct Cli {
    /// Settings file (default: ~/.snip-ocr/settings.toml)
    #[arg(short = 's', long = "settings", global = true)]
    settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Write defaults for missing settings (existing values are kept)
    Init,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the last recognized text and its translation
    Last,

    /// Select a region of a screenshot and run OCR on it
    Snip {
        /// PNG screenshot standing in for the visible page
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// Selection in CSS pixels: LEFT,TOP,WIDTH,HEIGHT
        #[arg(short = 'r', long = "rect")]
        rect: String,

        /// Device pixel ratio of the screenshot
        #[arg(long = "dpr", default_value_t = 1.0)]
        dpr: f64,

        /// Press the panel's translate button after the run
        #[arg(short = 't', long = "translate")]
        translate: bool,

        /// Resolve the `system` theme as dark
        #[arg(long = "prefers-dark")]
        prefers_dark: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings (credentials masked)
    Show,
    /// Set one option, e.g. `config set auto-translate false`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    snip_ocr::logging::init(cli.verbose)?;

    let command = match cli.command {
        CliCommand::Init => snip_ocr::Command::Init,
        CliCommand::Config {
            action: ConfigAction::Show,
        } => snip_ocr::Command::ShowConfig,
        CliCommand::Config {
            action: ConfigAction::Set { key, value },
        } => snip_ocr::Command::SetConfig { key, value },
        CliCommand::Last => snip_ocr::Command::Last,
        CliCommand::Snip {
            image,
            rect,
            dpr,
            translate,
            prefers_dark,
        } => snip_ocr::Command::Snip(snip_ocr::SnipRequest {
            image,
            rect: snip_ocr::parse_rect(&rect)?,
            dpr,
            translate,
            prefers_dark,
        }),
    };

    let output = snip_ocr::run(snip_ocr::Config {
        settings_path: cli.settings,
        command,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
