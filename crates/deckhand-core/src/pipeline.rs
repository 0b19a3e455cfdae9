//! End-to-end deck processing and the bounded batch worker pool.
//!
//! One document flows acquisition -> prompt -> completion -> normalize ->
//! entry. Batches run the same flow over a bounded pool of workers; the only
//! shared mutable state is the first run-fatal error and the store the
//! caller aggregates into.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::llm::CompletionClient;
use crate::normalize::record_from_response;
use crate::rate_limit::complete_with_retry;
use crate::{Config, DeckEntry, DeckError, DeckText, PdfBackend, insight, keyslides, prompt, score};

/// Progress events emitted during a batch run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        index: usize,
        total: usize,
        filename: String,
    },
    /// A completion attempt failed and the worker is backing off.
    Retrying {
        index: usize,
        total: usize,
        filename: String,
        attempt: u32,
        backoff: Duration,
    },
    Finished {
        index: usize,
        total: usize,
        entry: Box<DeckEntry>,
    },
    /// A run-fatal error occurred; remaining documents are abandoned.
    Aborted { reason: String },
}

/// Result of a batch run: one entry per document that was processed (failed
/// documents included), plus the run-fatal error if one stopped the batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub entries: Vec<DeckEntry>,
    pub fatal: Option<DeckError>,
}

/// Document key used in the store: the source filename.
pub fn deck_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Process a single deck end-to-end.
///
/// Per-document failures propagate as errors here; converting them into
/// failed entries is the batch boundary's job. The optional scoring,
/// insight and key-slide passes degrade silently on non-fatal failure: the
/// extraction record is already in hand, a lost supplement is not worth
/// failing the document over.
pub async fn process_deck(
    path: &Path,
    backend: &dyn PdfBackend,
    llm: &dyn CompletionClient,
    client: &reqwest::Client,
    config: &Config,
    on_retry: Option<&(dyn Fn(u32, Duration) + Send + Sync)>,
) -> Result<DeckEntry, DeckError> {
    let filename = deck_key(path);
    let pages = backend.extract_pages(path)?;
    let text = DeckText::from_pages(filename, pages);
    let joined = text.joined();

    let extraction_prompt = prompt::build_extraction_prompt(&joined, config.max_prompt_chars);
    let raw = complete_with_retry(
        llm,
        &config.model,
        &extraction_prompt,
        client,
        config,
        on_retry,
    )
    .await?;
    let record = record_from_response(&raw)?;
    let mut entry = DeckEntry::extracted(text.filename.clone(), record);

    if config.with_scoring {
        match score::score_deck(&joined, llm, client, config).await {
            Ok(s) => entry.score = Some(s),
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => tracing::warn!(deck = %entry.key, error = %e, "scoring pass failed"),
        }
    }

    if config.with_insights {
        match insight::generate_insight(&joined, llm, client, config).await {
            Ok(i) => entry.insight = Some(i),
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => tracing::warn!(deck = %entry.key, error = %e, "insight pass failed"),
        }
    }

    if config.with_key_slides {
        match keyslides::identify_key_slides(&text.pages, llm, client, config).await {
            Ok(ks) => entry.key_slides = Some(ks),
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => tracing::warn!(deck = %entry.key, error = %e, "key-slide pass failed"),
        }
    }

    Ok(entry)
}

struct DeckJob {
    path: PathBuf,
    index: usize,
    result_tx: oneshot::Sender<Option<DeckEntry>>,
}

/// Process a batch of decks over a bounded worker pool.
///
/// Per-document errors become failed entries and the batch continues.
/// Run-fatal errors (auth/quota) cancel the token: remaining documents are
/// abandoned and the error is surfaced in the outcome. Entries come back in
/// submission order regardless of completion order.
pub async fn process_batch(
    paths: Vec<PathBuf>,
    backend: Arc<dyn PdfBackend>,
    llm: Arc<dyn CompletionClient>,
    config: Config,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> BatchOutcome {
    let total = paths.len();
    if total == 0 {
        return BatchOutcome {
            entries: vec![],
            fatal: None,
        };
    }

    let num_workers = config.num_workers.max(1);
    let config = Arc::new(config);
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);
    let fatal: Arc<Mutex<Option<DeckError>>> = Arc::new(Mutex::new(None));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    // Queue every job up front; workers drain until the channel is empty.
    let (job_tx, job_rx) = async_channel::unbounded::<DeckJob>();
    let mut receivers = Vec::with_capacity(total);
    for (index, path) in paths.into_iter().enumerate() {
        let (result_tx, result_rx) = oneshot::channel();
        let _ = job_tx
            .send(DeckJob {
                path,
                index,
                result_tx,
            })
            .await;
        receivers.push((index, result_rx));
    }
    job_tx.close();

    let mut workers = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        workers.push(tokio::spawn(worker_loop(
            job_rx.clone(),
            backend.clone(),
            llm.clone(),
            config.clone(),
            client.clone(),
            progress.clone(),
            cancel.clone(),
            fatal.clone(),
            total,
        )));
    }
    drop(job_rx);

    let mut results: Vec<Option<DeckEntry>> = (0..total).map(|_| None).collect();
    for (index, rx) in receivers {
        if let Ok(entry) = rx.await {
            results[index] = entry;
        }
    }

    for worker in workers {
        let _ = worker.await;
    }

    BatchOutcome {
        entries: results.into_iter().flatten().collect(),
        fatal: fatal.lock().unwrap().take(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    job_rx: async_channel::Receiver<DeckJob>,
    backend: Arc<dyn PdfBackend>,
    llm: Arc<dyn CompletionClient>,
    config: Arc<Config>,
    client: reqwest::Client,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
    cancel: CancellationToken,
    fatal: Arc<Mutex<Option<DeckError>>>,
    total: usize,
) {
    while let Ok(job) = job_rx.recv().await {
        // Abandoned documents get no entry; the store invariant (one row
        // per *processed* document) is preserved by the caller.
        if cancel.is_cancelled() {
            let _ = job.result_tx.send(None);
            continue;
        }

        let filename = deck_key(&job.path);
        progress(ProgressEvent::Started {
            index: job.index,
            total,
            filename: filename.clone(),
        });

        let retry_progress = {
            let progress = progress.clone();
            let filename = filename.clone();
            let index = job.index;
            move |attempt: u32, backoff: Duration| {
                progress(ProgressEvent::Retrying {
                    index,
                    total,
                    filename: filename.clone(),
                    attempt,
                    backoff,
                });
            }
        };

        let result = process_deck(
            &job.path,
            backend.as_ref(),
            llm.as_ref(),
            &client,
            &config,
            Some(&retry_progress),
        )
        .await;

        let entry = match result {
            Ok(entry) => Some(entry),
            Err(err) if err.is_run_fatal() => {
                let mut slot = fatal.lock().unwrap();
                if slot.is_none() {
                    progress(ProgressEvent::Aborted {
                        reason: err.to_string(),
                    });
                    *slot = Some(err);
                    cancel.cancel();
                }
                None
            }
            Err(err) => Some(DeckEntry::failed(&filename, &err)),
        };

        if let Some(ref entry) = entry {
            progress(ProgressEvent::Finished {
                index: job.index,
                total,
                entry: Box::new(entry.clone()),
            });
        }
        let _ = job.result_tx.send(entry);
    }
}
