use crate::errors::AppResult;
use crate::models::{job_prefix, parse_date, Project};
use crate::store::{decode_record, JobStore};
use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;

/// Lock-free, point-in-time merge of every active job's projects.
///
/// The aggregator never touches the lock service: it copies each backing
/// record into a private temp slot, reads the copy, and discards it. The
/// result is coherent per job but only approximately consistent across
/// jobs, and must never be fed back into a save without a fresh checkout.
pub struct SnapshotAggregator<'a> {
    store: &'a JobStore,
    caller_id: String,
}

impl<'a> SnapshotAggregator<'a> {
    pub fn new(store: &'a JobStore, caller_id: impl Into<String>) -> Self {
        Self {
            store,
            caller_id: caller_id.into(),
        }
    }

    /// All projects across all active jobs, keyed by project key.
    pub fn merged_projects(&self) -> AppResult<IndexMap<String, Project>> {
        let mut merged = IndexMap::new();
        for job_id in self.store.list_active()? {
            // Temp slots are keyed by job and caller: reruns by the same
            // caller overwrite their slot, different callers never collide.
            let temp = self
                .store
                .temp_dir()
                .join(format!("{}.{}", job_id, self.caller_id));
            if let Err(error) = fs::copy(self.store.record_path(&job_id), &temp) {
                // A record can vanish between enumeration and copy when
                // another user completes the job. Reporting carries on.
                tracing::warn!(%job_id, %error, "skipping job record during snapshot");
                continue;
            }
            match fs::read(&temp) {
                Ok(bytes) => match decode_record(&job_id, &bytes) {
                    Ok(job) => {
                        for (key, project) in job.projects {
                            merged.insert(key, project);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%job_id, %error, "skipping unreadable snapshot copy")
                    }
                },
                Err(error) => tracing::warn!(%job_id, %error, "skipping unreadable snapshot copy"),
            }
            let _ = fs::remove_file(&temp);
        }
        Ok(merged)
    }
}

/// Group a merged project view by the owning job's id prefix.
pub fn group_by_job(merged: &IndexMap<String, Project>) -> BTreeMap<String, Vec<Project>> {
    let mut grouped: BTreeMap<String, Vec<Project>> = BTreeMap::new();
    for (key, project) in merged {
        grouped
            .entry(job_prefix(key).to_string())
            .or_default()
            .push(project.clone());
    }
    grouped
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueSummary {
    pub expired: usize,
    pub today: usize,
    pub approaching: usize,
}

/// "Jobs at a glance": bucket each job's non-terminal projects by due-date
/// proximity. Due dates are parsed to calendar dates before comparing;
/// completed projects never count.
pub fn jobs_at_a_glance(
    grouped: &BTreeMap<String, Vec<Project>>,
    today: NaiveDate,
) -> BTreeMap<String, DueSummary> {
    let mut glance = BTreeMap::new();
    for (job_id, projects) in grouped {
        let mut summary = DueSummary::default();
        for project in projects {
            if project.status.is_terminal() {
                continue;
            }
            let due = match parse_date(&project.due_date) {
                Ok(due) => due,
                Err(error) => {
                    tracing::warn!(%job_id, %error, "skipping project with unreadable due date");
                    continue;
                }
            };
            let remaining = (due - today).num_days();
            if remaining < 0 {
                summary.expired += 1;
            } else if remaining == 0 {
                summary.today += 1;
            } else if remaining < 3 {
                summary.approaching += 1;
            }
        }
        glance.insert(job_id.clone(), summary);
    }
    glance
}

pub fn jobs_at_a_glance_now(grouped: &BTreeMap<String, Vec<Project>>) -> BTreeMap<String, DueSummary> {
    jobs_at_a_glance(grouped, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectStatus;

    fn temp_store() -> (tempfile::TempDir, JobStore) {
        let root = tempfile::tempdir().expect("temp store root");
        let store = JobStore::connect(root.path()).expect("connect");
        (root, store)
    }

    fn seeded_job(store: &JobStore, job_id: &str, keys: &[(&str, &str, ProjectStatus)]) {
        let mut job = store.create(job_id, None).expect("create");
        for (key, due, status) in keys {
            job.add_project(key, "work", "Brandon", due, *status)
                .expect("add project");
        }
        store.save(job_id, &job).expect("save");
    }

    #[test]
    fn merges_projects_across_active_jobs() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[("105000.177-43", "01/01/2020", ProjectStatus::Unassigned)],
        );
        seeded_job(
            &store,
            "105001",
            &[
                ("105001-01-02-03", "01/06/2020", ProjectStatus::InProcess),
                ("105001.20-1", "01/07/2020", ProjectStatus::OnHold),
            ],
        );

        let aggregator = SnapshotAggregator::new(&store, "brandon");
        let merged = aggregator.merged_projects().expect("merge");
        assert_eq!(merged.len(), 3);
        assert!(merged.contains_key("105000.177-43"));
        assert!(merged.contains_key("105001-01-02-03"));

        let grouped = group_by_job(&merged);
        assert_eq!(grouped.get("105000").map(Vec::len), Some(1));
        assert_eq!(grouped.get("105001").map(Vec::len), Some(2));

        // Temp slots are always removed after the merge.
        let leftovers = fs::read_dir(store.temp_dir()).expect("temp dir").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn a_vanished_record_is_skipped_without_raising() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[("105000.177-43", "01/01/2020", ProjectStatus::Unassigned)],
        );
        seeded_job(
            &store,
            "105001",
            &[("105001.20-1", "01/07/2020", ProjectStatus::InProcess)],
        );

        // Leave the lock marker behind so 105001 still enumerates as active,
        // then delete its record: the copy step loses the race.
        fs::remove_file(store.record_path("105001")).expect("drop record");

        let merged = SnapshotAggregator::new(&store, "brandon")
            .merged_projects()
            .expect("merge survives the race");
        assert_eq!(merged.len(), 1);
        assert!(merged.contains_key("105000.177-43"));
    }

    #[test]
    fn concurrent_callers_use_disjoint_temp_slots() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[("105000.177-43", "01/01/2020", ProjectStatus::Unassigned)],
        );

        let first = SnapshotAggregator::new(&store, "brandon");
        let second = SnapshotAggregator::new(&store, "alex");
        assert_eq!(first.merged_projects().expect("first merge").len(), 1);
        assert_eq!(second.merged_projects().expect("second merge").len(), 1);
    }

    #[test]
    fn glance_buckets_by_days_remaining() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[
                ("105000.1", "01/01/2020", ProjectStatus::Unassigned), // expired
                ("105000.2", "01/05/2020", ProjectStatus::InProcess),  // today
                ("105000.3", "01/06/2020", ProjectStatus::InProcess),  // approaching
                ("105000.4", "01/07/2020", ProjectStatus::AtReview),   // approaching
                ("105000.5", "01/08/2020", ProjectStatus::InProcess),  // outside window
                ("105000.6", "01/01/2020", ProjectStatus::Completed),  // excluded
            ],
        );

        let merged = SnapshotAggregator::new(&store, "brandon")
            .merged_projects()
            .expect("merge");
        let grouped = group_by_job(&merged);
        let today = parse_date("01/05/2020").expect("today");
        let glance = jobs_at_a_glance(&grouped, today);

        let summary = glance.get("105000").expect("summary");
        assert_eq!(
            *summary,
            DueSummary {
                expired: 1,
                today: 1,
                approaching: 2,
            }
        );
    }

    #[test]
    fn glance_against_the_current_date_covers_every_job() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[("105000.1", "01/01/2020", ProjectStatus::InProcess)],
        );

        let merged = SnapshotAggregator::new(&store, "brandon")
            .merged_projects()
            .expect("merge");
        let glance = jobs_at_a_glance_now(&group_by_job(&merged));
        assert!(glance.contains_key("105000"));
    }

    #[test]
    fn overdue_scenario_counts_one_expired_project() {
        let (_root, store) = temp_store();
        seeded_job(
            &store,
            "105000",
            &[("105000.177-43", "01/01/2020", ProjectStatus::Unassigned)],
        );

        let merged = SnapshotAggregator::new(&store, "brandon")
            .merged_projects()
            .expect("merge");
        let project = merged.get("105000.177-43").expect("project");
        assert_eq!(project.owner, "Brandon");

        let glance = jobs_at_a_glance(&group_by_job(&merged), parse_date("01/05/2020").expect("today"));
        assert_eq!(glance.get("105000").expect("summary").expired, 1);
    }
}
