use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use snr::backend::{PageNumber, default_decoder, load_note_bytes};
use snr::config::Config;
use snr::converter::ImageConverter;
use snr::error::{NoteError, NoteResult};
use snr::export::{MarkdownExporter, write_page_images};

#[derive(Debug, Parser)]
#[command(name = "snr", version, about = "Render Supernote notes to images")]
struct Cli {
    /// Config file (defaults to $SNR_CONFIG_PATH or ~/.config/snr/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print page count and page size
    Info { path: PathBuf },
    /// Render pages to PNG files, optionally with a markdown document
    Convert {
        path: PathBuf,
        /// Pages to render, e.g. `1,3-5` (default: all)
        #[arg(long)]
        pages: Option<String>,
        /// Worker threads (default: config, then available parallelism)
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long)]
        markdown: bool,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> NoteResult<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_logging(log_level(config.log.level_filter(), cli.verbose));

    match cli.command {
        Command::Info { path } => {
            let note = default_decoder().decode(load_note_bytes(&path)?)?;
            println!("{}", path.display());
            println!("pages: {}", note.page_count());
            println!("size: {}x{}", note.width, note.height);
            Ok(())
        }
        Command::Convert {
            path,
            pages,
            workers,
            out,
            markdown,
        } => {
            let bytes = load_note_bytes(&path)?;
            let note = default_decoder().decode(bytes.clone())?;
            let pages = pages.as_deref().map(parse_page_spec).transpose()?;

            let mut convert_config = config.convert.clone();
            if let Some(workers) = workers {
                convert_config.max_workers = workers;
            }
            let images = ImageConverter::from_config(&convert_config)
                .convert_once(&note, pages.as_deref(), &bytes)
                .await?;

            let stem = note_stem(&path);
            if markdown {
                let written = MarkdownExporter::from_config(&config.export)
                    .export(&out, &stem, &note, &images)?;
                println!("{}", written.display());
            } else {
                for written in write_page_images(&out, &stem, &images)? {
                    println!("{}", written.display());
                }
            }
            Ok(())
        }
    }
}

fn init_logging(level: LevelFilter) {
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}

fn log_level(configured: LevelFilter, verbose: u8) -> LevelFilter {
    match verbose {
        0 => configured,
        1 => configured.max(LevelFilter::Info),
        _ => configured.max(LevelFilter::Debug),
    }
}

fn note_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "note".to_string())
}

/// Parses `1,3-5` into `[1, 3, 4, 5]`, keeping the given order.
fn parse_page_spec(spec: &str) -> NoteResult<Vec<PageNumber>> {
    let invalid = || NoteError::invalid_argument(format!("invalid page list: {spec:?}"));
    let mut pages = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse::<PageNumber>().map_err(|_| invalid())?;
                let end = end.trim().parse::<PageNumber>().map_err(|_| invalid())?;
                if start > end {
                    return Err(invalid());
                }
                pages.extend(start..=end);
            }
            None => pages.push(part.parse::<PageNumber>().map_err(|_| invalid())?),
        }
    }
    if pages.is_empty() {
        return Err(invalid());
    }
    Ok(pages)
}
