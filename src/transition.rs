use crate::checkout::checkout;
use crate::errors::{AppError, AppResult};
use crate::lock::LockService;
use crate::models::{is_drawing_num, single_job_id, Job, ProjectStatus};
use crate::routing::{
    leading_token, move_to, workspace_documents, CompletionNotifier, DestinationResolver,
};
use crate::store::JobStore;

/// Outcome of a terminal status change: which expected document identifiers
/// were routed, and which had no matching document. Missing documents are
/// reported to the caller and never block the status change itself.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub moved: Vec<String>,
    pub missing: Vec<String>,
}

/// Apply a new status to the selected projects of a checked-out job.
///
/// When the status is terminal, the corresponding finished documents are
/// routed out of the workspace first; a destination-resolution failure
/// aborts before any status mutates. Afterwards every selected project's
/// status is set unconditionally. Re-running the same completion finds no
/// documents left to move but still sets the statuses.
pub fn apply_status(
    job: &mut Job,
    selection: &[String],
    status: ProjectStatus,
    resolver: &dyn DestinationResolver,
) -> AppResult<StatusReport> {
    if selection.is_empty() {
        return Err(AppError::AmbiguousSelection(
            "no projects are selected".to_string(),
        ));
    }
    let job_id = single_job_id(selection)?;
    if job_id != job.job_id() {
        return Err(AppError::AmbiguousSelection(format!(
            "selection belongs to job {}, not {}",
            job_id,
            job.job_id()
        )));
    }
    for key in selection {
        if !job.projects.contains_key(key) {
            return Err(AppError::NotFound(format!(
                "no project '{}' in job {}",
                key, job_id
            )));
        }
    }

    let report = if status.is_terminal() {
        route_finished_documents(job, selection, resolver)?
    } else {
        StatusReport::default()
    };

    for key in selection {
        if let Some(project) = job.projects.get_mut(key) {
            project.status = status;
        }
    }
    tracing::info!(
        job_id = %job.job_id(),
        status = status.as_str(),
        selected = selection.len(),
        moved = report.moved.len(),
        missing = report.missing.len(),
        "project status applied"
    );
    Ok(report)
}

fn route_finished_documents(
    job: &Job,
    selection: &[String],
    resolver: &dyn DestinationResolver,
) -> AppResult<StatusReport> {
    let expected: Vec<String> = selection
        .iter()
        .filter(|key| is_drawing_num(key))
        .cloned()
        .collect();

    let destination = resolver.finished_documents_dir(job.job_id())?;

    let documents = match job.workspace.as_deref() {
        Some(workspace) => workspace_documents(workspace),
        None => Vec::new(),
    };

    let mut moved = Vec::new();
    for document in documents {
        if moved.len() >= expected.len() {
            break;
        }
        let Some(filename) = document.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let token = leading_token(filename);
        if selection.iter().any(|key| key == token) {
            move_to(&document, &destination)?;
            moved.push(token.to_string());
        }
    }

    let missing = expected
        .iter()
        .filter(|key| !moved.contains(*key))
        .cloned()
        .collect();
    Ok(StatusReport { moved, missing })
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedJobSummary {
    pub job_id: String,
    pub drawing_count: usize,
    pub incomplete_count: usize,
    pub documents_moved: usize,
}

/// Administratively close a job: check it out, sweep every remaining
/// workspace document to the finished-documents folder, delete the job's
/// backing files, and send the confirmation.
pub fn close_job(
    store: &JobStore,
    locks: &dyn LockService,
    owner_id: &str,
    job_id: &str,
    resolver: &dyn DestinationResolver,
    notifier: &dyn CompletionNotifier,
) -> AppResult<ClosedJobSummary> {
    let mut session = checkout(store, locks, owner_id, job_id)?;

    let drawing_nums = session.job.drawing_numbers();
    let incomplete_count = drawing_nums
        .iter()
        .filter_map(|key| session.job.projects.get(key))
        .filter(|project| !project.status.is_terminal())
        .count();

    let destination = resolver.finished_documents_dir(job_id)?;
    let mut documents_moved = 0usize;
    if let Some(workspace) = session.job.workspace.clone() {
        for document in workspace_documents(&workspace) {
            move_to(&document, &destination)?;
            documents_moved += 1;
        }
    }

    let due_by = session.job.latest_due_date();
    store.remove(job_id)?;
    // The marker went with the backing files; releasing is a formality that
    // clears the session's grant state.
    session.release(locks)?;

    let summary = ClosedJobSummary {
        job_id: job_id.to_string(),
        drawing_count: drawing_nums.len(),
        incomplete_count,
        documents_moved,
    };
    let mut lines = vec![
        format!("Drawings found: {}", summary.drawing_count),
        format!("Drawings not completed: {}", summary.incomplete_count),
        format!("Documents moved: {}", summary.documents_moved),
    ];
    if let Some(due_by) = &due_by {
        lines.push(format!("Due by: {}", due_by));
    }
    notifier.job_closed(job_id, &lines)?;
    tracing::info!(
        job_id,
        drawings = summary.drawing_count,
        incomplete = summary.incomplete_count,
        moved = summary.documents_moved,
        "job closed"
    );
    Ok(summary)
}
