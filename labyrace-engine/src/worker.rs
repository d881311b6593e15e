//! Off-thread builds.
//!
//! A build runs on its own thread and talks to the caller only through a
//! [`BuildRequest`] and the matching [`BuildResponse`]. The caller keeps a
//! [`JobTracker`] so a response to a job that has since been superseded is
//! dropped instead of applied.
use std::sync::mpsc;
use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::builder::build_layout;
use crate::constants::LOG_WORKER;
use crate::layout::{BuildReport, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub job_id: u64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed(Box<BuildReport>),
    /// Build error, rendered for the caller.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResponse {
    pub job_id: u64,
    pub outcome: JobOutcome,
}

/// Run one request on the current thread.
#[must_use]
pub fn run_job(request: &BuildRequest) -> BuildResponse {
    let outcome = match build_layout(&request.snapshot) {
        Ok(report) => JobOutcome::Completed(Box::new(report)),
        Err(err) => JobOutcome::Failed(err.to_string()),
    };
    BuildResponse {
        job_id: request.job_id,
        outcome,
    }
}

/// Run a JSON-encoded [`BuildRequest`] and return the JSON response.
///
/// # Errors
///
/// Returns the decode error when `payload` is not a request.
pub fn run_job_json(payload: &str) -> Result<String, serde_json::Error> {
    let request: BuildRequest = serde_json::from_str(payload)?;
    serde_json::to_string(&run_job(&request))
}

/// Pending off-thread build.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: u64,
    rx: mpsc::Receiver<BuildResponse>,
}

impl JobHandle {
    /// Response if the build has finished.
    #[must_use]
    pub fn poll(&self) -> Option<BuildResponse> {
        self.rx.try_recv().ok()
    }

    /// Block until the build finishes; `None` if the worker died.
    #[must_use]
    pub fn wait(self) -> Option<BuildResponse> {
        self.rx.recv().ok()
    }
}

/// Start `request` on a new thread.
#[must_use]
pub fn spawn_job(request: BuildRequest) -> JobHandle {
    let job_id = request.job_id;
    let (tx, rx) = mpsc::channel::<BuildResponse>();
    thread::spawn(move || {
        let response = run_job(&request);
        if tx.send(response).is_err() {
            debug!(target: LOG_WORKER, "job {job_id}: caller went away");
        }
    });
    JobHandle { job_id, rx }
}

/// Latest issued job id on the caller side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTracker {
    latest: Option<u64>,
    next_id: u64,
}

impl JobTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: None,
            next_id: 1,
        }
    }

    /// Wrap `snapshot` in a request with a fresh id, superseding older jobs.
    pub fn issue(&mut self, snapshot: Snapshot) -> BuildRequest {
        let job_id = self.next_id;
        self.next_id += 1;
        self.latest = Some(job_id);
        BuildRequest { job_id, snapshot }
    }

    /// The report of the latest job, or `Ok(None)` for a stale response.
    ///
    /// # Errors
    ///
    /// Returns the worker's error string when the latest job failed.
    pub fn accept(&mut self, response: BuildResponse) -> Result<Option<BuildReport>, String> {
        if self.latest != Some(response.job_id) {
            debug!(
                target: LOG_WORKER,
                "dropping stale response for job {} (latest {:?})",
                response.job_id,
                self.latest
            );
            return Ok(None);
        }
        self.latest = None;
        match response.outcome {
            JobOutcome::Completed(report) => Ok(Some(*report)),
            JobOutcome::Failed(reason) => Err(reason),
        }
    }

    /// Job whose response is still awaited.
    #[must_use]
    pub const fn pending(&self) -> Option<u64> {
        self.latest
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::grid::{Cell, Grid, Pos};

    fn snapshot() -> Snapshot {
        Snapshot::new(Grid::empty())
            .with_budget(1, 1)
            .with_config(EngineConfig::greedy())
    }

    #[test]
    fn spawned_job_matches_inline_run() {
        let mut tracker = JobTracker::new();
        let request = tracker.issue(snapshot());
        let inline = run_job(&request);
        let response = spawn_job(request).wait().unwrap();
        assert_eq!(response.job_id, inline.job_id);
        match (&response.outcome, &inline.outcome) {
            (JobOutcome::Completed(threaded), JobOutcome::Completed(direct)) => {
                assert_eq!(threaded.layout, direct.layout);
            }
            other => panic!("unexpected outcomes {other:?}"),
        }
        let report = tracker.accept(response).unwrap().unwrap();
        assert_eq!(report.layout.placements.len(), 2);
        assert_eq!(tracker.pending(), None);
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut tracker = JobTracker::new();
        let old = tracker.issue(snapshot());
        let new = tracker.issue(snapshot());
        assert!(new.job_id > old.job_id);
        assert_eq!(tracker.accept(run_job(&old)), Ok(None));
        assert_eq!(tracker.pending(), Some(new.job_id));
        assert!(tracker.accept(run_job(&new)).unwrap().is_some());
    }

    #[test]
    fn json_jobs_answer_with_the_request_id() {
        let request = BuildRequest {
            job_id: 41,
            snapshot: snapshot(),
        };
        let payload = serde_json::to_string(&request).unwrap();
        let answer = run_job_json(&payload).unwrap();
        let response: BuildResponse = serde_json::from_str(&answer).unwrap();
        assert_eq!(response.job_id, 41);
        assert!(matches!(response.outcome, JobOutcome::Completed(_)));
        assert!(run_job_json("{\"job_id\": 1}").is_err());
    }

    #[test]
    fn oversized_budget_fails_on_the_worker_thread() {
        let mut tracker = JobTracker::new();
        let request = tracker.issue(Snapshot::new(Grid::empty()).with_budget(u32::MAX, 1));
        let response = spawn_job(request).wait().unwrap();
        match &response.outcome {
            JobOutcome::Failed(reason) => assert!(reason.contains("exceeds")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(tracker.accept(response).is_err());
    }

    #[test]
    fn failures_carry_the_error_text() {
        let mut blocked = Grid::empty();
        for x in 0..21 {
            blocked.set_cell(Pos::new(x, 6), Cell::Static);
        }
        let mut tracker = JobTracker::new();
        let request = tracker.issue(Snapshot::new(blocked));
        let response = run_job(&request);
        assert!(matches!(response.outcome, JobOutcome::Failed(_)));
        assert!(tracker.accept(response).is_err());
    }
}
