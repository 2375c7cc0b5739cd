//! Project store: the list of projects plus its load status.
//!
//! State only changes through [`ProjectStore::apply`], which replaces values
//! wholesale. The network halves of each operation ([`fetch_projects`],
//! [`update_project`]) are plain async functions so the TUI can run them on the
//! API worker and hand the outcome back to the UI task; [`ProjectStore::fetch_all`]
//! and [`ProjectStore::update_one`] compose both halves for callers that own the
//! store directly.

use std::cmp::Ordering;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::ProjectsApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{HoursUpdate, Project, ProjectId};

/// Load status of the project list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    /// Nothing requested yet
    #[default]
    Idle,
    Loading,
    Ready,
    /// Last fetch failed; the previous list (if any) is kept
    Failed(String),
}

impl LoadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LoadStatus::Idle => "Idle",
            LoadStatus::Loading => "Loading",
            LoadStatus::Ready => "Ready",
            LoadStatus::Failed(_) => "Failed",
        }
    }
}

/// State transitions of the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    FetchStarted,
    ProjectsReceived(Vec<Project>),
    FetchFailed(String),
    ProjectUpdated(Project),
}

#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    projects: Vec<Project>,
    status: LoadStatus,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reducer
    pub fn apply(&mut self, action: StoreAction) {
        match action {
            StoreAction::FetchStarted => {
                self.status = LoadStatus::Loading;
            }
            StoreAction::ProjectsReceived(projects) => {
                self.projects = projects;
                self.status = LoadStatus::Ready;
            }
            StoreAction::FetchFailed(message) => {
                self.status = LoadStatus::Failed(message);
            }
            StoreAction::ProjectUpdated(project) => {
                self.projects = self
                    .projects
                    .iter()
                    .map(|existing| {
                        if existing.id == project.id {
                            project.clone()
                        } else {
                            existing.clone()
                        }
                    })
                    .collect();
            }
        }
        debug!(event = "store.status", status = self.status.label(), count = self.projects.len());
    }

    // Selectors

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Fetch the project list and replace the stored one
    ///
    /// A cancelled fetch leaves the list untouched and the status at Loading;
    /// the caller that cancelled owns the next transition.
    pub async fn fetch_all(
        &mut self,
        api: &dyn ProjectsApi,
        cancel: &CancellationToken,
    ) -> ApiResult<Vec<Project>> {
        self.apply(StoreAction::FetchStarted);

        match fetch_projects(api, cancel).await {
            Ok(projects) => {
                self.apply(StoreAction::ProjectsReceived(projects.clone()));
                Ok(projects)
            }
            Err(ApiError::Cancelled) => Err(ApiError::Cancelled),
            Err(e) => {
                self.apply(StoreAction::FetchFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Add `hours` to a project's counters and store the server's answer
    pub async fn update_one(
        &mut self,
        api: &dyn ProjectsApi,
        id: ProjectId,
        hours: HoursUpdate,
        cancel: &CancellationToken,
    ) -> ApiResult<Project> {
        let project = update_project(api, id, hours, cancel).await?;
        self.apply(StoreAction::ProjectUpdated(project.clone()));
        Ok(project)
    }
}

/// Active projects first, ended ones last; each group by descending end date
///
/// Projects without an end date sort last within their group. The sort is
/// stable, so ties keep the server's order.
pub fn sort_projects(mut projects: Vec<Project>) -> Vec<Project> {
    projects.sort_by(compare_projects);
    projects
}

fn compare_projects(a: &Project, b: &Project) -> Ordering {
    a.has_ended
        .cmp(&b.has_ended)
        .then_with(|| b.end_date.cmp(&a.end_date))
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = request => result,
    }
}

/// Request the project list and sort it
pub async fn fetch_projects(
    api: &dyn ProjectsApi,
    cancel: &CancellationToken,
) -> ApiResult<Vec<Project>> {
    match cancellable(cancel, api.list_projects()).await {
        Ok(projects) => {
            let projects = sort_projects(projects);
            info!(event = "store.fetch.completed", count = projects.len());
            Ok(projects)
        }
        Err(ApiError::Cancelled) => {
            info!(event = "store.fetch.cancelled");
            Err(ApiError::Cancelled)
        }
        Err(e) => {
            error!(event = "store.fetch.failed", error_code = e.error_code(), error = %e);
            Err(e)
        }
    }
}

/// Read the current record, add `delta` to its counters and send the result
///
/// A project the server does not know gets `delta` sent as-is. A 400 answer
/// comes back as [`ApiError::Validation`] with the server's body.
pub async fn update_project(
    api: &dyn ProjectsApi,
    id: ProjectId,
    delta: HoursUpdate,
    cancel: &CancellationToken,
) -> ApiResult<Project> {
    let payload = match cancellable(cancel, api.get_project(id)).await {
        Ok(current) => delta.accumulate_onto(&current.actual_hours()),
        Err(ApiError::NotFound { .. }) => {
            warn!(event = "store.update.no_prior_values", project_id = id);
            delta
        }
        Err(e) => {
            log_update_failure(id, &e);
            return Err(e);
        }
    };

    match cancellable(cancel, api.put_project(id, &payload)).await {
        Ok(project) => {
            info!(
                event = "store.update.completed",
                project_id = id,
                total_actual_hours = project.total_actual_hours
            );
            Ok(project)
        }
        Err(e) => {
            log_update_failure(id, &e);
            Err(e)
        }
    }
}

fn log_update_failure(id: ProjectId, e: &ApiError) {
    if e.is_user_error() {
        warn!(event = "store.update.rejected", project_id = id, error = %e);
    } else {
        error!(event = "store.update.failed", project_id = id, error_code = e.error_code(), error = %e);
    }
}
