use std::io::{self, IsTerminal, Read};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "vibetrans",
    version,
    about = "Translator tools with language-direction detection, backed by Gemini"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Gemini model name (overrides [gemini] model)
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// API key (overrides settings and environment variables)
    #[arg(short = 'k', long = "key", global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected language and direction as JSON
    Detect {
        /// Translator id or route name
        #[arg(short = 't', long = "tool")]
        tool: String,

        /// Text to inspect (read from stdin when omitted)
        text: Option<String>,
    },

    /// Translate text, or an image/audio file with --data
    Translate {
        /// Translator id or route name
        #[arg(short = 't', long = "tool")]
        tool: String,

        /// Prompt mode (defaults to the translator's default)
        #[arg(short = 'M', long = "mode")]
        mode: Option<String>,

        /// Direction such as zh-to-en (auto-detected when omitted)
        #[arg(short = 'd', long = "direction")]
        direction: Option<String>,

        /// Only report the detected direction
        #[arg(long = "detect-only")]
        detect_only: bool,

        /// Image or audio file to translate
        #[arg(long = "data")]
        data: Option<String>,

        /// Mime type for --data (auto, image/*, audio/*, png, jpg, webp, gif, mp3, wav, ...)
        #[arg(long = "data-mime")]
        data_mime: Option<String>,

        /// Append model name to output
        #[arg(long = "with-using-model")]
        with_using_model: bool,

        /// Append token usage to output
        #[arg(long = "with-using-tokens")]
        with_using_tokens: bool,

        /// Text to translate (read from stdin when omitted)
        text: Option<String>,
    },

    /// List the translator catalog
    Tools,

    /// Send a trivial prompt to confirm the model answers
    Check,

    /// Run the HTTP server
    Serve {
        /// Listen address (defaults to [server] addr)
        #[arg(short = 'a', long = "addr")]
        addr: Option<String>,
    },

    /// Interactive session with direction detection and manual override
    Interactive {
        /// Translator id or route name
        #[arg(short = 't', long = "tool")]
        tool: String,

        /// Detect directions through a running server, e.g. http://127.0.0.1:8787
        #[arg(long = "server")]
        server: Option<String>,
    },
}

fn read_input(arg: Option<String>) -> Result<Option<String>> {
    if let Some(text) = arg {
        return Ok(Some(text));
    }
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    let text = String::from_utf8(buffer)
        .map_err(|_| anyhow!("stdin must be UTF-8 text (use --data for media files)"))?;
    Ok(Some(text))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vibetrans::logging::init(cli.verbose)?;
    let config = vibetrans::Config {
        settings_path: cli.read_settings,
        model: cli.model,
        key: cli.key,
    };

    match cli.command {
        Command::Detect { tool, text } => {
            let input = read_input(text)?.unwrap_or_default();
            println!("{}", vibetrans::detect(&config, &tool, &input)?);
        }
        Command::Translate {
            tool,
            mode,
            direction,
            detect_only,
            data,
            data_mime,
            with_using_model,
            with_using_tokens,
            text,
        } => {
            let input = if data.is_some() {
                text
            } else {
                read_input(text)?
            };
            let args = vibetrans::TranslateArgs {
                tool,
                mode,
                direction,
                detect_only,
                data,
                data_mime,
                with_using_model,
                with_using_tokens,
            };
            println!("{}", vibetrans::translate(&config, args, input).await?);
        }
        Command::Tools => println!("{}", vibetrans::tools(&config)?),
        Command::Check => println!("{}", vibetrans::check(&config).await?),
        Command::Serve { addr } => vibetrans::serve(&config, addr).await?,
        Command::Interactive { tool, server } => {
            vibetrans::interactive::run_interactive(&config, &tool, server.as_deref()).await?
        }
    }
    Ok(())
}
