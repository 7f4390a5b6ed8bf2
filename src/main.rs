//! palimpsest - rich-text format converter

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use palimpsest::upload::{DirectoryUploader, HttpFetcher, ImageUploader, NoopUploader};
use palimpsest::{ContentEnvelope, ContentFormat, ConversionConfig, Converter, HtmlOptions, ImportPipeline, ImportRequest};

#[derive(Parser)]
#[command(name = "palimpsest")]
#[command(version, about = "Rich-text format converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    palimpsest convert --from markdown --to html post.md
    palimpsest word-count --from ckEditorMarkup post.html
    palimpsest import --document-id abc123 --upload-dir images/ export.html
    cat post.html | palimpsest convert --from html --to markdown -")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a document to another format
    Convert {
        /// Input format: html, markdown, ckEditorMarkup or draftJS
        #[arg(long, value_parser = parse_format)]
        from: ContentFormat,

        #[arg(long, value_enum)]
        to: Target,

        /// Sanitize HTML input
        #[arg(long)]
        sanitize: bool,

        /// Leave TeX unrendered
        #[arg(long)]
        skip_math: bool,

        /// Input file, or - for stdin
        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// Estimate the number of words, excluding footnotes and appendices
    WordCount {
        #[arg(long, value_parser = parse_format)]
        from: ContentFormat,

        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// Turn a Google Docs HTML export into editor markup
    Import {
        #[arg(long)]
        document_id: String,

        /// Store rehosted and cropped images in this directory
        #[arg(long, value_name = "DIR")]
        upload_dir: Option<PathBuf>,

        #[arg(value_name = "INPUT")]
        input: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Html,
    Markdown,
    Editor,
}

fn parse_format(s: &str) -> Result<ContentFormat, String> {
    s.parse().map_err(|e: palimpsest::Error| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("palimpsest={level}"))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(input: &str) -> palimpsest::Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&PathBuf>) -> palimpsest::Result<ConversionConfig> {
    match path {
        Some(path) => ConversionConfig::from_json(&std::fs::read_to_string(path)?),
        None => Ok(ConversionConfig::default()),
    }
}

fn run(cli: Cli) -> palimpsest::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let converter = Converter::new(config);
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    match cli.command {
        Command::Convert {
            from,
            to,
            sanitize,
            skip_math,
            input,
        } => {
            let envelope = ContentEnvelope::from_text(from, &read_input(&input)?)?;
            let output = match to {
                Target::Html => runtime.block_on(converter.to_html(&envelope, HtmlOptions { sanitize, skip_math })),
                Target::Markdown => converter.to_markdown(&envelope),
                Target::Editor => converter.to_editor_markup(&envelope),
            };
            println!("{output}");
        }
        Command::WordCount { from, input } => {
            let envelope = ContentEnvelope::from_text(from, &read_input(&input)?)?;
            println!("{}", converter.word_count(&envelope));
        }
        Command::Import {
            document_id,
            upload_dir,
            input,
        } => {
            let fetcher = Arc::new(HttpFetcher::default());
            let uploader: Arc<dyn ImageUploader> = match upload_dir {
                Some(dir) => Arc::new(DirectoryUploader::new(dir, fetcher.clone())),
                None => Arc::new(NoopUploader),
            };
            let pipeline = ImportPipeline::new(Arc::new(converter), uploader, fetcher);
            let request = ImportRequest {
                html: read_input(&input)?,
                document_id,
            };
            println!("{}", runtime.block_on(pipeline.run(request))?);
        }
    }
    Ok(())
}
