use std::io::Write;

use deckhand_core::{DeckEntry, EntryStatus, ProgressEvent};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Started {
            index,
            total,
            filename,
        } => {
            writeln!(w, "[{}/{}] Extracting: {}", index + 1, total, filename)?;
        }
        ProgressEvent::Retrying {
            index,
            total,
            filename,
            attempt,
            backoff,
        } => {
            let msg = format!(
                "[{}/{}] {} attempt {} failed, retrying in {:.1}s",
                index + 1,
                total,
                filename,
                attempt,
                backoff.as_secs_f64()
            );
            if color.enabled() {
                writeln!(w, "{}", msg.dimmed())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
        ProgressEvent::Finished {
            index,
            total,
            entry,
        } => {
            let idx = index + 1;
            match entry.status {
                EntryStatus::Extracted => {
                    let name = if entry.record.startup_name.is_empty() {
                        "(unnamed)"
                    } else {
                        entry.record.startup_name.as_str()
                    };
                    if color.enabled() {
                        writeln!(w, "[{}/{}] -> {} ({})", idx, total, "OK".green(), name)?;
                    } else {
                        writeln!(w, "[{}/{}] -> OK ({})", idx, total, name)?;
                    }
                }
                EntryStatus::Failed => {
                    let reason = entry.error.as_deref().unwrap_or("unknown error");
                    if color.enabled() {
                        writeln!(w, "[{}/{}] -> {} ({})", idx, total, "FAILED".red(), reason)?;
                    } else {
                        writeln!(w, "[{}/{}] -> FAILED ({})", idx, total, reason)?;
                    }
                }
            }
        }
        ProgressEvent::Aborted { reason } => {
            if color.enabled() {
                writeln!(w, "{} {}", "RUN ABORTED:".red().bold(), reason)?;
            } else {
                writeln!(w, "RUN ABORTED: {}", reason)?;
            }
        }
    }
    Ok(())
}

/// Print the final library table: one line per submitted document.
pub fn print_library(
    w: &mut dyn Write,
    entries: &[DeckEntry],
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    writeln!(
        w,
        "{:<28} {:<20} {:<14} {:<10} {:<12} {}",
        "File", "Startup", "Industry", "Founded", "Stage", "Raised"
    )?;
    for entry in entries {
        let r = &entry.record;
        if entry.is_failed() {
            let line = format!(
                "{:<28} <failed: {}>",
                shorten(&entry.key, 27),
                entry.error.as_deref().unwrap_or("unknown")
            );
            if color.enabled() {
                writeln!(w, "{}", line.red())?;
            } else {
                writeln!(w, "{}", line)?;
            }
        } else {
            writeln!(
                w,
                "{:<28} {:<20} {:<14} {:<10} {:<12} {}",
                shorten(&entry.key, 27),
                shorten(&r.startup_name, 19),
                shorten(&r.industry, 13),
                r.founding_year.as_deref().unwrap_or("-"),
                shorten(&r.funding_stage, 11),
                if r.amount_raised.is_empty() {
                    "-"
                } else {
                    r.amount_raised.as_str()
                },
            )?;
        }
    }
    Ok(())
}

/// Print per-deck supplements (score, insights, key slides) when present.
pub fn print_supplements(
    w: &mut dyn Write,
    entry: &DeckEntry,
    color: ColorMode,
) -> std::io::Result<()> {
    let has_any = entry.score.is_some() || entry.insight.is_some() || entry.key_slides.is_some();
    if !has_any {
        return Ok(());
    }

    if color.enabled() {
        writeln!(w, "\n{}", entry.key.bold())?;
    } else {
        writeln!(w, "\n{}", entry.key)?;
    }

    if let Some(score) = &entry.score {
        if let Some(total) = score.total_score {
            writeln!(w, "  Pitch score: {}/100", total)?;
        }
        for section in &score.sections {
            writeln!(
                w,
                "    {:<16} {:>2}/10  {}",
                section.name,
                section.score,
                shorten(&section.reason, 60)
            )?;
        }
    }

    if let Some(insight) = &entry.insight {
        for flag in &insight.red_flags {
            if color.enabled() {
                writeln!(w, "  {} {}", "flag:".yellow(), flag)?;
            } else {
                writeln!(w, "  flag: {}", flag)?;
            }
        }
        for q in &insight.suggested_questions {
            writeln!(w, "  ask: {}", q)?;
        }
    }

    if let Some(summary) = entry.summary() {
        writeln!(w, "  {}", summary)?;
    }

    if let Some(ks) = &entry.key_slides {
        if !ks.is_empty() {
            let fmt = |p: Option<usize>| p.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
            writeln!(
                w,
                "  Key slides: team p{}, market p{}, traction p{}",
                fmt(ks.team_page),
                fmt(ks.market_page),
                fmt(ks.traction_page)
            )?;
        }
    }

    Ok(())
}

/// Print the run summary line.
pub fn print_summary(
    w: &mut dyn Write,
    entries: &[DeckEntry],
    color: ColorMode,
) -> std::io::Result<()> {
    let failed = entries.iter().filter(|e| e.is_failed()).count();
    let ok = entries.len() - failed;
    writeln!(w)?;
    if failed > 0 {
        let msg = format!("{} decks extracted, {} failed", ok, failed);
        if color.enabled() {
            writeln!(w, "{}", msg.yellow())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    } else if color.enabled() {
        writeln!(w, "{}", format!("{} decks extracted", ok).green())?;
    } else {
        writeln!(w, "{} decks extracted", ok)?;
    }
    Ok(())
}
