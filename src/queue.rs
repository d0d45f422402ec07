use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// One source video plus its caption and processing state within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub source: PathBuf,
    pub display_name: String,
    pub caption: String,
    pub status: JobStatus,
    /// Percentage in [0,100]; meaningful only while `Processing`.
    /// Values are taken from the encoder as-is, without clamping.
    pub progress: f32,
    /// Present only when status is `Error`.
    pub error: Option<String>,
}

impl Job {
    fn new(source: PathBuf) -> Self {
        let display_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        Self {
            id: Uuid::new_v4(),
            source,
            display_name,
            caption: String::new(),
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
        }
    }

    /// A job not currently running and not already completed is a
    /// candidate for (re)processing.
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Error)
    }
}

/// Derived view over the queue, never stored as authoritative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

/// Ordered collection of jobs. Insertion order is the processing order.
/// The orchestrator is the only writer of status/progress during a run.
#[derive(Debug, Default)]
pub struct BatchQueue {
    jobs: Vec<Job>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one pending job per path, in input order. Duplicate paths
    /// are allowed; the user may intentionally add the same file twice.
    pub fn enqueue<I, P>(&mut self, paths: I) -> Vec<Job>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let created: Vec<Job> = paths.into_iter().map(|p| Job::new(p.into())).collect();
        self.jobs.extend(created.iter().cloned());
        created
    }

    /// Remove the job with the given id; no-op when absent.
    pub fn remove(&mut self, id: Uuid) {
        self.jobs.retain(|job| job.id != id);
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Replace a job's caption, allowed in any status.
    pub fn set_caption(&mut self, id: Uuid, text: &str) {
        if let Some(job) = self.job_mut(id) {
            job.caption = text.to_string();
        }
    }

    /// Set `text` as the caption of every job whose caption is empty or
    /// whitespace-only. No-op when `text` itself is blank.
    pub fn fill_empty_captions(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        for job in &mut self.jobs {
            if job.caption.trim().is_empty() {
                job.caption = text.to_string();
            }
        }
    }

    /// Jobs eligible for (re)processing, in queue order. Recomputed fresh
    /// on every call.
    pub fn eligible_for_processing(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|job| job.is_eligible())
    }

    /// Update a job's progress; missing ids are a silent no-op so that a
    /// job removed mid-run cannot crash the run loop.
    pub fn update_progress(&mut self, id: Uuid, value: f32) {
        if let Some(job) = self.job_mut(id) {
            job.progress = value;
        }
    }

    /// Commit a status transition. Progress is mutated together with the
    /// status: reset on (re)start, pinned to 100 on completion. Missing
    /// ids are a silent no-op.
    pub fn set_status(&mut self, id: Uuid, status: JobStatus, error: Option<String>) {
        if let Some(job) = self.job_mut(id) {
            match status {
                JobStatus::Processing => job.progress = 0.0,
                JobStatus::Completed => job.progress = 100.0,
                _ => {}
            }
            job.status = status;
            job.error = match status {
                JobStatus::Error => error,
                _ => None,
            };
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn find_by_source(&self, source: &Path) -> Option<&Job> {
        self.jobs.iter().find(|job| job.source == source)
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            total: self.jobs.len(),
            pending: self
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Pending)
                .count(),
            completed: self
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .count(),
        }
    }

    fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(paths: &[&str]) -> BatchQueue {
        let mut queue = BatchQueue::new();
        queue.enqueue(paths.iter().map(|p| PathBuf::from(*p)));
        queue
    }

    #[test]
    fn test_enqueue_preserves_order_and_unique_ids() {
        let mut queue = BatchQueue::new();
        queue.enqueue(["/videos/a.mp4", "/videos/b.mp4"].map(PathBuf::from));
        queue.enqueue(["/videos/c.mp4"].map(PathBuf::from));

        let names: Vec<&str> = queue.jobs().iter().map(|j| j.display_name.as_str()).collect();
        assert_eq!(names, ["a.mp4", "b.mp4", "c.mp4"]);

        let mut ids: Vec<Uuid> = queue.jobs().iter().map(|j| j.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_enqueue_allows_duplicate_paths() {
        let queue = queue_with(&["/videos/a.mp4", "/videos/a.mp4"]);
        assert_eq!(queue.counts().total, 2);
        assert_ne!(queue.jobs()[0].id, queue.jobs()[1].id);
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let mut queue = queue_with(&["/videos/a.mp4"]);
        queue.remove(Uuid::new_v4());
        assert_eq!(queue.counts().total, 1);
    }

    #[test]
    fn test_fill_empty_captions_only_touches_blank_captions() {
        let mut queue = queue_with(&["/a.mp4", "/b.mp4", "/c.mp4"]);
        let ids: Vec<Uuid> = queue.jobs().iter().map(|j| j.id).collect();

        queue.set_caption(ids[0], "keep me");
        queue.set_caption(ids[1], "   ");
        queue.fill_empty_captions("bulk");

        assert_eq!(queue.get(ids[0]).unwrap().caption, "keep me");
        assert_eq!(queue.get(ids[1]).unwrap().caption, "bulk");
        assert_eq!(queue.get(ids[2]).unwrap().caption, "bulk");
    }

    #[test]
    fn test_fill_empty_captions_with_blank_text_is_noop() {
        let mut queue = queue_with(&["/a.mp4"]);
        queue.fill_empty_captions("  ");
        assert_eq!(queue.jobs()[0].caption, "");
    }

    #[test]
    fn test_eligible_for_processing_is_ordered_and_idempotent() {
        let mut queue = queue_with(&["/a.mp4", "/b.mp4", "/c.mp4"]);
        let ids: Vec<Uuid> = queue.jobs().iter().map(|j| j.id).collect();

        queue.set_status(ids[1], JobStatus::Completed, None);
        queue.set_status(ids[2], JobStatus::Error, Some("bad codec".to_string()));

        let first: Vec<Uuid> = queue.eligible_for_processing().map(|j| j.id).collect();
        let second: Vec<Uuid> = queue.eligible_for_processing().map(|j| j.id).collect();
        assert_eq!(first, [ids[0], ids[2]]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_status_and_progress_move_together() {
        let mut queue = queue_with(&["/a.mp4"]);
        let id = queue.jobs()[0].id;

        queue.set_status(id, JobStatus::Processing, None);
        queue.update_progress(id, 42.5);
        assert_eq!(queue.get(id).unwrap().progress, 42.5);

        queue.set_status(id, JobStatus::Completed, None);
        let job = queue.get(id).unwrap();
        assert_eq!(job.progress, 100.0);
        assert!(job.error.is_none());

        // Retrying an errored job resets its progress.
        queue.set_status(id, JobStatus::Error, Some("boom".to_string()));
        queue.set_status(id, JobStatus::Processing, None);
        let job = queue.get(id).unwrap();
        assert_eq!(job.progress, 0.0);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_updates_for_removed_job_are_noops() {
        let mut queue = queue_with(&["/a.mp4", "/b.mp4"]);
        let removed = queue.jobs()[0].id;
        queue.remove(removed);

        queue.update_progress(removed, 50.0);
        queue.set_status(removed, JobStatus::Completed, None);
        assert_eq!(queue.counts().total, 1);
        assert!(!queue.contains(removed));
    }
}
