use crate::{
    api::PlatformApi,
    cli::Cli,
    config::RunConfig,
    error::{ApiError, ErrorClass, ErrorClassifier, Interruption},
    fetcher, filter,
    models::LikedEntry,
    remover, resolver,
};
use std::fmt::Write as _;
use tracing::{debug, info};

#[derive(Debug, PartialEq)]
pub enum Outcome {
    NothingLiked,
    StartIndexOutOfRange,
    NoCandidates,
    /// Candidates that would have been unliked.
    DryRun,
    Removed {
        removed: usize,
        /// Set when fewer than all candidates were removed.
        ///
        /// Counted against this run's candidate list. Removed entries drop out of the
        /// collection, so a later run starting here skips that many of the videos still liked.
        next_index: Option<usize>,
        /// Candidates left for a later run, in order.
        remaining: Vec<LikedEntry>,
    },
}

#[derive(Debug)]
pub struct RunReport {
    pub min_duration: f64,
    pub start_index: usize,
    pub total_liked: usize,
    pub resolved: usize,
    pub selected: usize,
    pub retained: usize,
    pub unresolved: usize,
    /// Selected entries from `start_index` on.
    pub candidates: Vec<LikedEntry>,
    pub interruptions: Vec<Interruption>,
    pub outcome: Outcome,
}

impl RunReport {
    fn new(config: &RunConfig) -> Self {
        Self {
            min_duration: config.min_duration,
            start_index: config.start_index,
            total_liked: 0,
            resolved: 0,
            selected: 0,
            retained: 0,
            unresolved: 0,
            candidates: Vec::new(),
            interruptions: Vec::new(),
            outcome: Outcome::NothingLiked,
        }
    }

    /// A stage stopped on an error classified as fatal.
    pub fn has_fatal_interruption(&self) -> bool {
        self.interruptions.iter().any(Interruption::is_fatal)
    }
}

/// Fetch, resolve, filter and (unless dry-running) remove, in that order.
pub async fn run(
    api: &dyn PlatformApi,
    config: &RunConfig,
    classifier: &dyn ErrorClassifier,
) -> Result<RunReport, ApiError> {
    let mut report = RunReport::new(config);

    info!("Retrieving your liked videos...");
    let liked = fetcher::fetch_liked(api, config.page_size, config.resilience, classifier).await?;
    report.interruptions.extend(liked.interruption);
    debug!("Liked videos collection: {}", liked.value.collection_id);
    let entries = liked.value.entries;
    report.total_liked = entries.len();
    info!("Found {} liked videos.", entries.len());

    if entries.is_empty() {
        return Ok(report);
    }

    info!("Retrieving video durations...");
    let ids: Vec<String> = entries.iter().map(|e| e.video_id.clone()).collect();
    let durations = resolver::resolve_durations(
        api,
        &ids,
        config.lookup_batch_size,
        config.resilience,
        classifier,
    )
    .await?;
    report.interruptions.extend(durations.interruption);
    report.resolved = durations.value.len();

    let selection = filter::select_short(entries, &durations.value, config.min_duration);
    report.selected = selection.selected.len();
    report.retained = selection.retained.len();
    report.unresolved = selection.unresolved.len();

    let mut candidates = selection.selected;
    if config.start_index > 0 {
        if config.start_index >= candidates.len() {
            report.outcome = Outcome::StartIndexOutOfRange;
            return Ok(report);
        }
        candidates = candidates.split_off(config.start_index);
    }
    report.candidates = candidates;

    if report.candidates.is_empty() {
        report.outcome = Outcome::NoCandidates;
        return Ok(report);
    }
    if config.dry_run {
        report.outcome = Outcome::DryRun;
        return Ok(report);
    }

    info!("Unliking videos...");
    let limit = config.removal_limit.min(report.candidates.len());
    let removal = remover::remove_entries(
        api,
        &report.candidates[..limit],
        config.clear_rating,
        config.resilience,
        classifier,
    )
    .await?;
    report.interruptions.extend(removal.interruption);

    let removed = removal.removed;
    let (next_index, remaining) = if removed < report.candidates.len() {
        (
            Some(config.start_index + removed),
            report.candidates[removed..].to_vec(),
        )
    } else {
        (None, Vec::new())
    };
    report.outcome = Outcome::Removed {
        removed,
        next_index,
        remaining,
    };

    Ok(report)
}

/// Header printed before any API work starts.
pub fn render_banner(config: &RunConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "YouTube Liked Videos Cleaner");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Minimum video duration: {} minutes", config.min_duration);
    let _ = writeln!(out, "Starting from index: {}", config.start_index);
    if config.dry_run {
        let _ = writeln!(out, "Mode: dry run");
    }
    let _ = write!(out, "{}", "=".repeat(60));
    out
}

/// Human-readable end-of-run summary, including the command that resumes an interrupted run.
pub fn render_report(report: &RunReport, config: &RunConfig, cli: &Cli) -> String {
    let mut out = String::new();
    let threshold = report.min_duration;

    match &report.outcome {
        Outcome::NothingLiked => {
            if report.interruptions.is_empty() {
                let _ = writeln!(out, "No liked videos found. Exiting.");
            } else {
                let _ = writeln!(out, "No liked videos retrieved. Exiting.");
            }
            write_interruptions(&mut out, report, true);
            return out;
        }
        Outcome::StartIndexOutOfRange => {
            let _ = writeln!(
                out,
                "\nFound {} videos under {} minutes.",
                report.selected, threshold
            );
            let _ = writeln!(
                out,
                "Start index {} exceeds the number of videos to unlike. Exiting.",
                report.start_index
            );
            write_interruptions(&mut out, report, true);
            return out;
        }
        _ => {}
    }

    let _ = writeln!(
        out,
        "\nResolved durations for {} of {} liked videos.",
        report.resolved, report.total_liked
    );
    let _ = writeln!(
        out,
        "Found {} videos under {} minutes ({} kept).",
        report.selected, threshold, report.retained
    );
    if report.unresolved > 0 {
        let _ = writeln!(
            out,
            "Skipped {} videos with unknown duration.",
            report.unresolved
        );
    }
    if report.start_index > 0 {
        let _ = writeln!(
            out,
            "Starting from index {}, {} videos remaining.",
            report.start_index,
            report.candidates.len()
        );
    }

    match &report.outcome {
        Outcome::NoCandidates => {
            let _ = writeln!(out, "\nNo videos under the specified duration were found.");
        }
        Outcome::DryRun => {
            let _ = writeln!(out, "\nVideos that would be unliked:");
            for entry in &report.candidates {
                let _ = writeln!(out, "{}", candidate_line(entry));
            }
            let _ = writeln!(out, "\nDRY RUN: No videos were unliked.");
        }
        Outcome::Removed {
            removed,
            next_index,
            remaining,
        } => {
            let _ = writeln!(out, "\nSample of videos to unlike:");
            for entry in report.candidates.iter().take(config.sample_size) {
                let _ = writeln!(out, "{}", candidate_line(entry));
            }
            if report.candidates.len() > config.sample_size {
                let _ = writeln!(
                    out,
                    "... and {} more",
                    report.candidates.len() - config.sample_size
                );
            }

            if let Some(next) = next_index {
                let quota_hit = report
                    .interruptions
                    .iter()
                    .any(|i| i.class == ErrorClass::TransientQuota);
                if quota_hit {
                    let _ = writeln!(out, "\nQuota likely exceeded. To continue later, run with:");
                } else {
                    let _ = writeln!(
                        out,
                        "\n{} videos were not unliked this run. To continue later, run with:",
                        remaining.len()
                    );
                }
                let _ = writeln!(out, "{}", cli.resume_command(threshold, *next));
            }
            let _ = writeln!(out, "\nSuccessfully unliked {} videos.", removed);
        }
        Outcome::NothingLiked | Outcome::StartIndexOutOfRange => {}
    }

    write_interruptions(&mut out, report, false);
    out
}

/// `quota_hint` is for outcomes that never reach the resume command.
fn write_interruptions(out: &mut String, report: &RunReport, quota_hint: bool) {
    if quota_hint
        && report
            .interruptions
            .iter()
            .any(|i| i.class == ErrorClass::TransientQuota)
    {
        let _ = writeln!(
            out,
            "Quota likely exceeded. Please wait 24 hours for quota to reset and run again."
        );
    }
    for interruption in &report.interruptions {
        let _ = writeln!(
            out,
            "Stopped early while {} ({}): {}",
            interruption.stage, interruption.class, interruption.message
        );
    }
}

fn candidate_line(entry: &LikedEntry) -> String {
    format!(
        "- {} [{}] ({:.2} minutes)",
        entry.title,
        entry.video_id,
        entry.duration_minutes.unwrap_or_default()
    )
}
