//! Supervised patching of a text field on a remote record.
//!
//! A patch is a pure splice (insert after an anchor, or replace the region
//! between an anchor and a terminator) wrapped in the fetch/review/update
//! flow the deploy scripts followed by hand: fetch the blob, skip if the
//! guard substring shows the patch already landed, splice, save a local
//! review copy, then write the field back unless this is a dry run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use similar::TextDiff;

use crate::client::RecordApi;
use crate::splice::{SpliceError, find_first, insert_after, replace_to_terminator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchMode {
    InsertAfter,
    ReplaceToTerminator,
}

#[derive(Debug, Clone)]
pub struct PatchSpec {
    pub mode: PatchMode,
    /// Anchors tried in order; the first one present in the blob wins.
    pub anchors: Vec<String>,
    /// Terminator candidates for ReplaceToTerminator, also tried in order.
    pub terminators: Vec<String>,
    /// Skip the patch when this substring is already present.
    pub guard: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Applied {
        patched: String,
        anchor_used: String,
        terminator_used: Option<String>,
    },
    Skipped {
        guard: String,
    },
}

/// Apply a patch spec to a buffer. Pure; remote access happens in
/// [`patch_record_field`].
pub fn apply_patch(buffer: &str, spec: &PatchSpec) -> Result<PatchOutcome, SpliceError> {
    if let Some(guard) = &spec.guard
        && buffer.contains(guard.as_str())
    {
        return Ok(PatchOutcome::Skipped {
            guard: guard.clone(),
        });
    }

    let (anchor_start, anchor) = find_first(buffer, &spec.anchors).ok_or_else(|| {
        SpliceError::AnchorNotFound {
            anchor: spec
                .anchors
                .first()
                .cloned()
                .unwrap_or_default(),
            searched_from: 0,
        }
    })?;

    match spec.mode {
        PatchMode::InsertAfter => {
            let patched = insert_after(buffer, anchor, &spec.content)?;
            Ok(PatchOutcome::Applied {
                patched,
                anchor_used: anchor.to_string(),
                terminator_used: None,
            })
        }
        PatchMode::ReplaceToTerminator => {
            // The terminator fallbacks mirror the anchor fallbacks: the
            // first candidate present after the anchor closes the region.
            let search_from = crate::splice::after_start(buffer, anchor_start);
            let terminator = spec
                .terminators
                .iter()
                .find(|candidate| buffer[search_from..].contains(candidate.as_str()))
                .ok_or_else(|| SpliceError::AnchorNotFound {
                    anchor: spec
                        .terminators
                        .first()
                        .cloned()
                        .unwrap_or_default(),
                    searched_from: search_from,
                })?;
            let patched = replace_to_terminator(buffer, anchor, terminator, &spec.content)?;
            Ok(PatchOutcome::Applied {
                patched,
                anchor_used: anchor.to_string(),
                terminator_used: Some(terminator.clone()),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatchTarget {
    pub table: String,
    pub sys_id: String,
    pub field: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub dry_run: bool,
    /// Directory the patched blob is written into for human review.
    pub review_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    pub action: String,
    pub table: String,
    pub sys_id: String,
    pub field: String,
    pub fetched_len: usize,
    pub patched_len: Option<usize>,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub anchor_used: Option<String>,
    pub terminator_used: Option<String>,
    pub review_path: Option<String>,
    pub request_count: usize,
}

/// Fetch, patch, and write back one text field on one record.
pub fn patch_record_field<A: RecordApi>(
    api: &mut A,
    target: &PatchTarget,
    spec: &PatchSpec,
    options: &PatchOptions,
) -> Result<PatchReport> {
    if spec.content.is_empty() {
        bail!("patch content is empty");
    }
    if spec.anchors.is_empty() {
        bail!("patch requires at least one anchor");
    }
    if spec.mode == PatchMode::ReplaceToTerminator && spec.terminators.is_empty() {
        bail!("replace patch requires at least one terminator");
    }

    let fetched = api
        .fetch_field(&target.table, &target.sys_id, &target.field)
        .with_context(|| {
            format!(
                "failed to fetch {}/{}.{}",
                target.table, target.sys_id, target.field
            )
        })?;

    let outcome = apply_patch(&fetched, spec).with_context(|| {
        format!(
            "patch does not fit {}/{}.{}; the blob's shape no longer matches",
            target.table, target.sys_id, target.field
        )
    })?;

    let mut report = PatchReport {
        action: String::new(),
        table: target.table.clone(),
        sys_id: target.sys_id.clone(),
        field: target.field.clone(),
        fetched_len: fetched.len(),
        patched_len: None,
        lines_added: 0,
        lines_removed: 0,
        anchor_used: None,
        terminator_used: None,
        review_path: None,
        request_count: api.request_count(),
    };

    let (patched, anchor_used, terminator_used) = match outcome {
        PatchOutcome::Skipped { guard } => {
            report.action = format!("skipped (guard {guard:?} already present)");
            return Ok(report);
        }
        PatchOutcome::Applied {
            patched,
            anchor_used,
            terminator_used,
        } => (patched, anchor_used, terminator_used),
    };

    let (lines_added, lines_removed) = diff_line_counts(&fetched, &patched);
    report.patched_len = Some(patched.len());
    report.lines_added = lines_added;
    report.lines_removed = lines_removed;
    report.anchor_used = Some(anchor_used);
    report.terminator_used = terminator_used;

    if let Some(review_dir) = &options.review_dir {
        let review_path = write_review_copy(review_dir, target, &patched)?;
        report.review_path = Some(review_path.to_string_lossy().replace('\\', "/"));
    }

    if options.dry_run {
        report.action = "would_apply".to_string();
        report.request_count = api.request_count();
        return Ok(report);
    }

    api.update_field(&target.table, &target.sys_id, &target.field, &patched)
        .with_context(|| {
            format!(
                "failed to update {}/{}.{}",
                target.table, target.sys_id, target.field
            )
        })?;
    report.action = "applied".to_string();
    report.request_count = api.request_count();
    Ok(report)
}

fn diff_line_counts(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    let mut added = 0;
    let mut removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Insert => added += 1,
            similar::ChangeTag::Delete => removed += 1,
            similar::ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

fn write_review_copy(review_dir: &Path, target: &PatchTarget, patched: &str) -> Result<PathBuf> {
    fs::create_dir_all(review_dir)
        .with_context(|| format!("failed to create {}", review_dir.display()))?;
    let filename = format!("{}_{}_{}.txt", target.table, target.sys_id, target.field);
    let path = review_dir.join(filename);
    fs::write(&path, patched).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
