use crate::errors::{AppError, AppResult};
use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DATE_FORMAT: &str = "%m/%d/%Y";
pub const NOTE_STAMP_FORMAT: &str = "%m/%d/%Y @ %I:%M:%S %p";
pub const WORK_INSTRUCTIONS: &str = "Work Instructions";

static JOB_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("job id pattern"));

pub fn is_job_id(text: &str) -> bool {
    JOB_ID_PATTERN.is_match(text)
}

/// Fully qualified drawing numbers carry three `-` separators
/// (`jobid-part-process-detail`); alias numbers do not.
pub fn is_drawing_num(text: &str) -> bool {
    text.matches('-').count() == 3
}

/// First six characters of a project key, the owning job's identifier.
pub fn job_prefix(key: &str) -> &str {
    key.get(..6).unwrap_or(key)
}

/// Resolve the single job a selection of project keys belongs to.
pub fn single_job_id(keys: &[String]) -> AppResult<String> {
    let ids: BTreeSet<&str> = keys.iter().map(|key| job_prefix(key)).collect();
    match ids.len() {
        1 => Ok(ids.into_iter().next().map(str::to_string).unwrap_or_default()),
        count => Err(AppError::AmbiguousSelection(format!(
            "selection spans {} jobs; only one job may be modified at a time",
            count
        ))),
    }
}

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| AppError::Corrupt(format!("date '{}' is not in MM/DD/YYYY form", value)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Unassigned,
    #[serde(rename = "In Process")]
    InProcess,
    #[serde(rename = "On Hold")]
    OnHold,
    #[serde(rename = "At Review")]
    AtReview,
    Completed,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        Self::Unassigned,
        Self::InProcess,
        Self::OnHold,
        Self::AtReview,
        Self::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unassigned => "Unassigned",
            Self::InProcess => "In Process",
            Self::OnHold => "On Hold",
            Self::AtReview => "At Review",
            Self::Completed => "Completed",
        }
    }

    /// Completed is terminal; assigning it triggers document routing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Chronological note log. The first entry is always "Work Instructions";
/// later entries are stamped with creation time and author and are never
/// reordered or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteLog {
    entries: IndexMap<String, String>,
}

impl NoteLog {
    pub fn new(work_instructions: &str) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(WORK_INSTRUCTIONS.to_string(), work_instructions.to_string());
        Self { entries }
    }

    pub fn add(&mut self, text: &str, author: &str) {
        let stamp = format!("{} by {}", Local::now().format(NOTE_STAMP_FORMAT), author);
        self.entries.insert(stamp, text.to_string());
    }

    pub fn work_instructions(&self) -> &str {
        self.entries
            .get(WORK_INSTRUCTIONS)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(label, text)| (label.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub alias_num: String,
    pub owner: String,
    pub due_date: String,
    pub status: ProjectStatus,
    pub notes: NoteLog,
}

impl Project {
    pub fn due_date_parsed(&self) -> AppResult<NaiveDate> {
        parse_date(&self.due_date)
    }
}

/// A collection of work orders billed under one 6-digit job number. Project
/// keys double as renamable identity: either an alias number
/// (`jobid.suffix`) or a drawing number, both prefixed by the job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    job_id: String,
    pub workspace: Option<PathBuf>,
    pub projects: IndexMap<String, Project>,
}

impl Job {
    pub fn new(job_id: &str, workspace: Option<PathBuf>) -> Self {
        Self {
            job_id: job_id.to_string(),
            workspace,
            projects: IndexMap::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn add_project(
        &mut self,
        key: &str,
        work_instructions: &str,
        owner: &str,
        due_date: &str,
        status: ProjectStatus,
    ) -> AppResult<()> {
        parse_date(due_date)?;
        self.projects.insert(
            key.to_string(),
            Project {
                alias_num: key.to_string(),
                owner: owner.to_string(),
                due_date: due_date.to_string(),
                status,
                notes: NoteLog::new(work_instructions),
            },
        );
        Ok(())
    }

    /// Move a project to a new key. Renaming a key to itself leaves the
    /// mapping untouched.
    pub fn rename_project(&mut self, old: &str, new: &str) -> AppResult<()> {
        if old == new {
            return if self.projects.contains_key(old) {
                Ok(())
            } else {
                Err(AppError::NotFound(format!(
                    "no project '{}' in job {}",
                    old, self.job_id
                )))
            };
        }
        let Some(project) = self.projects.shift_remove(old) else {
            return Err(AppError::NotFound(format!(
                "no project '{}' in job {}",
                old, self.job_id
            )));
        };
        self.projects.insert(new.to_string(), project);
        Ok(())
    }

    /// Copy a project under a generated `"{key} (n)"` key, probing n = 2, 3, …
    /// until unused. The copy keeps the source's work instructions, owner,
    /// due date, status, and alias number; its note history starts fresh.
    pub fn duplicate_project(&mut self, key: &str) -> AppResult<String> {
        let Some(source) = self.projects.get(key).cloned() else {
            return Err(AppError::NotFound(format!(
                "no project '{}' in job {}",
                key, self.job_id
            )));
        };
        let mut copy_num = 2u32;
        let new_key = loop {
            let candidate = format!("{} ({})", key, copy_num);
            if !self.projects.contains_key(&candidate) {
                break candidate;
            }
            copy_num += 1;
        };
        self.projects.insert(
            new_key.clone(),
            Project {
                alias_num: source.alias_num.clone(),
                owner: source.owner.clone(),
                due_date: source.due_date.clone(),
                status: source.status,
                notes: NoteLog::new(source.notes.work_instructions()),
            },
        );
        Ok(new_key)
    }

    pub fn remove_project(&mut self, key: &str) -> AppResult<()> {
        self.projects.shift_remove(key).map(|_| ()).ok_or_else(|| {
            AppError::NotFound(format!("no project '{}' in job {}", key, self.job_id))
        })
    }

    pub fn set_owner(&mut self, keys: &[String], owner: &str) -> AppResult<()> {
        for key in keys {
            self.project_mut(key)?.owner = owner.to_string();
        }
        Ok(())
    }

    pub fn set_due_date(&mut self, keys: &[String], due_date: &str) -> AppResult<()> {
        parse_date(due_date)?;
        for key in keys {
            self.project_mut(key)?.due_date = due_date.to_string();
        }
        Ok(())
    }

    pub fn set_alias(&mut self, keys: &[String], alias_num: &str) -> AppResult<()> {
        for key in keys {
            self.project_mut(key)?.alias_num = alias_num.to_string();
        }
        Ok(())
    }

    pub fn add_note(&mut self, keys: &[String], text: &str, author: &str) -> AppResult<()> {
        for key in keys {
            self.project_mut(key)?.notes.add(text, author);
        }
        Ok(())
    }

    pub fn drawing_numbers(&self) -> Vec<String> {
        self.projects
            .keys()
            .filter(|key| is_drawing_num(key))
            .cloned()
            .collect()
    }

    /// Latest due date across this job's projects, in storage form.
    pub fn latest_due_date(&self) -> Option<String> {
        self.projects
            .values()
            .filter_map(|project| project.due_date_parsed().ok())
            .max()
            .map(|date| date.format(DATE_FORMAT).to_string())
    }

    fn project_mut(&mut self, key: &str) -> AppResult<&mut Project> {
        let job_id = self.job_id.clone();
        self.projects
            .get_mut(key)
            .ok_or_else(|| AppError::NotFound(format!("no project '{}' in job {}", key, job_id)))
    }
}
