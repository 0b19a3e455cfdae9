use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use deckhand_core::{Config, DeckLibrary, OpenAiClient, ProgressEvent, config_file};
use deckhand_pdf_mupdf::MupdfBackend;
use deckhand_reporting::ExportFormat;

mod output;

use output::ColorMode;

/// Pitch Deck Extractor - pull structured startup data out of pitch-deck PDFs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract structured fields from a pitch-deck PDF or a directory of them
    Extract {
        /// Path to a PDF file or a directory containing PDFs
        path: PathBuf,

        /// Write the aggregated records to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format: csv or json
        #[arg(long, default_value = "csv")]
        format: String,

        /// API key for the completion endpoint
        #[arg(long)]
        api_key: Option<String>,

        /// Model used for extraction
        #[arg(long)]
        model: Option<String>,

        /// Number of concurrent workers
        #[arg(long)]
        workers: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Character budget for the deck text in the prompt
        #[arg(long)]
        max_prompt_chars: Option<usize>,

        /// Also run the rubric scoring pass
        #[arg(long)]
        score: bool,

        /// Also run the red-flags/questions insight pass
        #[arg(long)]
        insights: bool,

        /// Also identify the Team/Market/Traction slides
        #[arg(long)]
        key_slides: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Print the extracted slide text without calling the endpoint
        #[arg(long)]
        dry_run: bool,
    },

    /// Dump per-deck slide text to .txt files (no API calls)
    ExtractText {
        /// Directory containing pitch-deck PDFs
        input_dir: PathBuf,

        /// Directory to write the .txt files into
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ExtractText {
            input_dir,
            output_dir,
        } => extract_text(input_dir, output_dir),
        Command::Extract {
            path,
            output,
            format,
            api_key,
            model,
            workers,
            timeout,
            max_prompt_chars,
            score,
            insights,
            key_slides,
            no_color,
            dry_run,
        } => {
            let color = ColorMode(!no_color);
            if dry_run {
                dry_run_extract(path, color)
            } else {
                extract(
                    path,
                    output,
                    format,
                    api_key,
                    model,
                    workers,
                    timeout,
                    max_prompt_chars,
                    score,
                    insights,
                    key_slides,
                    color,
                )
                .await
            }
        }
    }
}

/// Collect the PDFs to process: a single file, or `*.pdf` from a directory
/// (sorted by name so runs are reproducible).
fn collect_pdfs(path: &PathBuf) -> anyhow::Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.clone()]);
    }

    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        anyhow::bail!("No PDF files found in {}", path.display());
    }
    Ok(pdfs)
}

/// Resolve configuration: CLI flags > env vars > config file > defaults.
#[allow(clippy::too_many_arguments)]
fn resolve_config(
    api_key: Option<String>,
    model: Option<String>,
    workers: Option<usize>,
    timeout: Option<u64>,
    max_prompt_chars: Option<usize>,
    score: bool,
    insights: bool,
    key_slides: bool,
) -> Config {
    let mut config = Config::default();
    config_file::load_config().apply(&mut config);

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.api_key = Some(key);
    }
    if let Ok(base) = std::env::var("OPENAI_API_BASE") {
        config.api_base = base;
    }

    if let Some(key) = api_key {
        config.api_key = Some(key);
    }
    if let Some(model) = model {
        config.model = model;
    }
    if let Some(workers) = workers {
        config.num_workers = workers;
    }
    if let Some(timeout) = timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(chars) = max_prompt_chars {
        config.max_prompt_chars = chars;
    }
    config.with_scoring |= score;
    config.with_insights |= insights;
    config.with_key_slides |= key_slides;
    config
}

#[allow(clippy::too_many_arguments)]
async fn extract(
    path: PathBuf,
    output: Option<PathBuf>,
    format: String,
    api_key: Option<String>,
    model: Option<String>,
    workers: Option<usize>,
    timeout: Option<u64>,
    max_prompt_chars: Option<usize>,
    score: bool,
    insights: bool,
    key_slides: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: String| anyhow::anyhow!("{e} (expected csv or json)"))?;

    let pdfs = collect_pdfs(&path)?;
    let config = resolve_config(
        api_key,
        model,
        workers,
        timeout,
        max_prompt_chars,
        score,
        insights,
        key_slides,
    );

    let Some(ref key) = config.api_key else {
        anyhow::bail!(
            "No API key configured. Pass --api-key, set OPENAI_API_KEY, or add it to .deckhand.toml"
        );
    };

    let backend = Arc::new(MupdfBackend::new());
    let llm = Arc::new(OpenAiClient::new(
        key.clone(),
        config.api_base.clone(),
        config.max_tokens,
    ));

    println!("Processing {} deck(s)...", pdfs.len());

    let bar = indicatif::ProgressBar::new(pdfs.len() as u64);
    bar.set_style(
        indicatif::ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .expect("progress template"),
    );

    let progress_writer: Arc<Mutex<Box<dyn Write + Send>>> =
        Arc::new(Mutex::new(Box::new(std::io::stderr())));
    let progress_bar = bar.clone();
    let progress_cb = {
        let pw = Arc::clone(&progress_writer);
        move |event: ProgressEvent| {
            match &event {
                ProgressEvent::Finished { .. } => progress_bar.inc(1),
                ProgressEvent::Started { filename, .. } => {
                    progress_bar.set_message(filename.clone())
                }
                _ => {}
            }
            if let Ok(mut w) = pw.lock() {
                let _ = progress_bar.suspend(|| output::print_progress(&mut *w, &event, color));
                let _ = w.flush();
            }
        }
    };

    let cancel = CancellationToken::new();

    // Ctrl+C abandons the remaining documents
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let outcome = deckhand_core::process_batch(
        pdfs,
        backend,
        llm,
        config.clone(),
        progress_cb,
        cancel.clone(),
    )
    .await;
    bar.finish_and_clear();

    // Aggregate into the session store, then render/export from it.
    let library = DeckLibrary::new();
    for entry in outcome.entries {
        library.add(entry);
    }
    let entries = library.all();

    let mut stdout = std::io::stdout();
    output::print_library(&mut stdout, &entries, color)?;
    for entry in &entries {
        output::print_supplements(&mut stdout, entry, color)?;
    }
    output::print_summary(&mut stdout, &entries, color)?;

    if let Some(ref output_path) = output {
        deckhand_reporting::export_to_path(&entries, format, output_path)?;
        println!("Wrote {}", output_path.display());
    }

    if let Some(fatal) = outcome.fatal {
        if color.enabled() {
            eprintln!("{} {}", "ERROR:".red().bold(), fatal);
        } else {
            eprintln!("ERROR: {}", fatal);
        }
        anyhow::bail!("run stopped: {fatal}");
    }

    Ok(())
}

fn dry_run_extract(path: PathBuf, color: ColorMode) -> anyhow::Result<()> {
    use deckhand_core::{DeckText, PdfBackend, pipeline::deck_key};

    let pdfs = collect_pdfs(&path)?;
    let backend = MupdfBackend::new();
    let mut stdout = std::io::stdout();

    for pdf in &pdfs {
        let filename = deck_key(pdf);
        match backend.extract_pages(pdf) {
            Ok(pages) => {
                let text = DeckText::from_pages(filename.clone(), pages);
                if color.enabled() {
                    writeln!(
                        stdout,
                        "{} {} ({} slides)\n",
                        "DRY RUN:".bold().cyan(),
                        filename.bold(),
                        text.pages.len()
                    )?;
                } else {
                    writeln!(
                        stdout,
                        "DRY RUN: {} ({} slides)\n",
                        filename,
                        text.pages.len()
                    )?;
                }
                writeln!(stdout, "{}", text.joined())?;
            }
            Err(e) => {
                if color.enabled() {
                    writeln!(stdout, "{} {}: {}", "SKIPPED".red(), filename, e)?;
                } else {
                    writeln!(stdout, "SKIPPED {}: {}", filename, e)?;
                }
            }
        }
    }
    Ok(())
}

/// Write per-deck slide text to `<output_dir>/<deck>.txt`.
fn extract_text(input_dir: PathBuf, output_dir: PathBuf) -> anyhow::Result<()> {
    use deckhand_core::{DeckText, PdfBackend, pipeline::deck_key};

    let pdfs = collect_pdfs(&input_dir)?;
    std::fs::create_dir_all(&output_dir)?;
    let backend = MupdfBackend::new();

    for pdf in &pdfs {
        let filename = deck_key(pdf);
        let pages = match backend.extract_pages(pdf) {
            Ok(pages) => pages,
            Err(e) => {
                eprintln!("Skipping {}: {}", filename, e);
                continue;
            }
        };
        let text = DeckText::from_pages(filename.clone(), pages);
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(filename.clone());
        let out_path = output_dir.join(format!("{}.txt", stem));
        std::fs::write(&out_path, text.joined())?;
        println!("Extracted text for {} -> {}", filename, out_path.display());
    }
    Ok(())
}
