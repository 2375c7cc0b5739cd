//! API client for the Projement REST API.
//!
//! This module provides an async HTTP client for communicating with the backend.
//! All methods are non-blocking and designed to run in a separate Tokio task.
//! The [`ProjectsApi`] trait is the seam the store talks to, so the store can be
//! driven by an in-memory fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{HoursUpdate, Project, ProjectId, ValidationErrors};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Header carrying the anti-forgery token on writes
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Operations the project store needs from the backend
#[async_trait]
pub trait ProjectsApi: Send + Sync {
    /// `GET /api/projects`
    async fn list_projects(&self) -> ApiResult<Vec<Project>>;

    /// `GET /api/projects/{id}`
    async fn get_project(&self, id: ProjectId) -> ApiResult<Project>;

    /// `PUT /api/projects/{id}/`
    async fn put_project(&self, id: ProjectId, payload: &HoursUpdate) -> ApiResult<Project>;
}

/// API client for the Projement backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    csrf_token: String,
}

impl ApiClient {
    /// Create a new API client with the specified base URL and CSRF token
    pub fn new(base_url: impl Into<String>, csrf_token: impl Into<String>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: csrf_token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn projects_url(&self) -> String {
        format!("{}/api/projects", self.base_url)
    }

    fn project_url(&self, id: ProjectId) -> String {
        format!("{}/api/projects/{}", self.base_url, id)
    }

    fn write_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let token = HeaderValue::from_str(&self.csrf_token).map_err(|e| ApiError::Decode {
            endpoint: CSRF_HEADER.to_string(),
            message: format!("CSRF token is not a valid header value: {}", e),
        })?;
        headers.insert(CSRF_HEADER, token);
        Ok(headers)
    }

    async fn send(&self, request: reqwest::RequestBuilder, endpoint: &str) -> ApiResult<Response> {
        request.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

/// Parse a JSON body, mapping failures to [`ApiError::Decode`]
async fn read_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> ApiResult<T> {
    let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

async fn status_error(response: Response) -> ApiError {
    let status = response.status();
    ApiError::Status {
        status,
        body: response.text().await.unwrap_or_default(),
    }
}

/// Map an update response body to the store's outcome
///
/// 400 carries a validation-error object that is handed back untouched.
pub fn classify_update_response(status: StatusCode, body: &[u8]) -> ApiResult<Project> {
    if status == StatusCode::BAD_REQUEST {
        let errors: Value = serde_json::from_slice(body).map_err(|e| ApiError::Decode {
            endpoint: "update project".to_string(),
            message: e.to_string(),
        })?;
        return Err(ApiError::Validation(ValidationErrors(errors)));
    }

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        endpoint: "update project".to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ProjectsApi for ApiClient {
    async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        let url = self.projects_url();
        debug!(event = "api.list_projects.started", url = %url);

        let response = self.send(self.client.get(&url), &url).await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        read_json(response, &url).await
    }

    async fn get_project(&self, id: ProjectId) -> ApiResult<Project> {
        let url = self.project_url(id);
        debug!(event = "api.get_project.started", url = %url);

        let response = self.send(self.client.get(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { id });
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        read_json(response, &url).await
    }

    async fn put_project(&self, id: ProjectId, payload: &HoursUpdate) -> ApiResult<Project> {
        // Trailing slash is required by the backend's router for writes
        let url = format!("{}/", self.project_url(id));
        debug!(event = "api.put_project.started", url = %url);

        if self.csrf_token.is_empty() {
            warn!(event = "api.put_project.no_csrf_token", project_id = id);
        }

        let request = self
            .client
            .put(&url)
            .headers(self.write_headers()?)
            .json(payload);
        let response = self.send(request, &url).await?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ApiError::Transport {
            endpoint: url.clone(),
            source,
        })?;

        classify_update_response(status, &body)
    }
}

/// Messages sent from API worker to the main TUI thread
#[derive(Debug)]
pub enum ApiMessage {
    /// Project list has been fetched and sorted
    ProjectsLoaded {
        projects: Vec<Project>,
        token: CancellationToken,
    },
    /// Project list fetch failed
    ProjectsFailed {
        error: ApiError,
        token: CancellationToken,
    },
    /// A project was updated; carries the server's record
    ProjectUpdated {
        project: Project,
        token: CancellationToken,
    },
    /// A project update failed (validation errors included)
    UpdateFailed {
        id: ProjectId,
        error: ApiError,
        token: CancellationToken,
    },
}

/// Commands sent from TUI to the API worker
#[derive(Debug, Clone)]
pub enum ApiCommand {
    /// Fetch the project list; cancelled when a newer fetch starts or on quit
    FetchProjects(CancellationToken),
    /// Add the given hours to a project's counters
    UpdateProject {
        id: ProjectId,
        hours: HoursUpdate,
        token: CancellationToken,
    },
    /// Shutdown the API worker
    Shutdown,
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ApiClient::new("http://example.test/", "token").unwrap();
        assert_eq!(client.base_url(), "http://example.test");
        assert_eq!(client.projects_url(), "http://example.test/api/projects");
        assert_eq!(client.project_url(3), "http://example.test/api/projects/3");
    }

    #[test]
    fn test_write_headers_carry_csrf_token() {
        let client = ApiClient::new(DEFAULT_BASE_URL, "abc123").unwrap();
        let headers = client.write_headers().unwrap();
        assert_eq!(headers.get(CSRF_HEADER).unwrap(), "abc123");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_write_headers_reject_invalid_token() {
        let client = ApiClient::new(DEFAULT_BASE_URL, "bad\ntoken").unwrap();
        assert!(matches!(client.write_headers(), Err(ApiError::Decode { .. })));
    }

    #[test]
    fn test_classify_bad_request_returns_exact_body() {
        let body = json!({ "title": ["required"] });
        let result = classify_update_response(
            StatusCode::BAD_REQUEST,
            serde_json::to_string(&body).unwrap().as_bytes(),
        );

        match result {
            Err(ApiError::Validation(errors)) => assert_eq!(errors.body(), &body),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_success_parses_project() {
        let project = crate::models::fixtures::project(9);
        let body = serde_json::to_vec(&project).unwrap();
        let parsed = classify_update_response(StatusCode::OK, &body).unwrap();
        assert_eq!(parsed, project);
    }

    #[test]
    fn test_classify_other_status_is_status_error() {
        let result = classify_update_response(StatusCode::FORBIDDEN, b"CSRF verification failed");
        match result {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "CSRF verification failed");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_garbage_success_body_is_decode_error() {
        let result = classify_update_response(StatusCode::OK, b"<html>");
        assert!(matches!(result, Err(ApiError::Decode { .. })));
    }

    mod http {
        //! `ApiClient` against a local listener that answers with canned
        //! responses and hands back the raw requests it received.

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};
        use tokio::task::JoinHandle;

        use super::*;
        use crate::models::fixtures;

        async fn read_request(stream: &mut TcpStream) -> String {
            let mut data = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&data);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            String::from_utf8_lossy(&data).into_owned()
        }

        /// Answer one connection per response, in order
        async fn serve(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<String>>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                let mut requests = Vec::new();
                for (status, body) in responses {
                    let (mut stream, _) = listener.accept().await.unwrap();
                    requests.push(read_request(&mut stream).await);
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.ok();
                }
                requests
            });

            (base_url, handle)
        }

        fn request_line(request: &str) -> &str {
            request.lines().next().unwrap_or_default()
        }

        #[tokio::test]
        async fn test_list_projects_parses_body() {
            let body = serde_json::to_string(&fixtures::projects(2)).unwrap();
            let (base_url, server) = serve(vec![("200 OK", body)]).await;
            let client = ApiClient::new(base_url, "").unwrap();

            let projects = client.list_projects().await.unwrap();

            assert_eq!(projects, fixtures::projects(2));
            let requests = server.await.unwrap();
            assert_eq!(request_line(&requests[0]), "GET /api/projects HTTP/1.1");
        }

        #[tokio::test]
        async fn test_list_projects_non_success_is_status_error() {
            let (base_url, server) =
                serve(vec![("502 Bad Gateway", "upstream down".to_string())]).await;
            let client = ApiClient::new(base_url, "").unwrap();

            match client.list_projects().await {
                Err(ApiError::Status { status, body }) => {
                    assert_eq!(status, StatusCode::BAD_GATEWAY);
                    assert_eq!(body, "upstream down");
                }
                other => panic!("expected status error, got {:?}", other),
            }
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_get_project_not_found() {
            let (base_url, server) =
                serve(vec![("404 Not Found", r#"{"detail":"Not found."}"#.to_string())]).await;
            let client = ApiClient::new(base_url, "").unwrap();

            let result = client.get_project(7).await;

            assert!(matches!(result, Err(ApiError::NotFound { id: 7 })));
            let requests = server.await.unwrap();
            assert_eq!(request_line(&requests[0]), "GET /api/projects/7 HTTP/1.1");
        }

        #[tokio::test]
        async fn test_put_project_sends_csrf_token_to_trailing_slash_url() {
            let body = serde_json::to_string(&fixtures::project(3)).unwrap();
            let (base_url, server) = serve(vec![("200 OK", body)]).await;
            let client = ApiClient::new(base_url, "secret-token").unwrap();

            let project = client
                .put_project(3, &HoursUpdate::new(1.5, 2.0, 0.25))
                .await
                .unwrap();
            assert_eq!(project, fixtures::project(3));

            let requests = server.await.unwrap();
            let request = &requests[0];
            assert_eq!(request_line(request), "PUT /api/projects/3/ HTTP/1.1");

            let lowered = request.to_ascii_lowercase();
            assert!(lowered.contains("\r\nx-csrftoken: secret-token\r\n"));
            assert!(lowered.contains("\r\ncontent-type: application/json\r\n"));

            let (_, payload) = request.split_once("\r\n\r\n").unwrap();
            let payload: Value = serde_json::from_str(payload).unwrap();
            assert_eq!(
                payload,
                json!({
                    "actual_design": "1.50",
                    "actual_development": "2.00",
                    "actual_testing": "0.25"
                })
            );
        }

        #[tokio::test]
        async fn test_put_project_bad_request_is_validation_error() {
            let body = json!({ "actual_design": ["A valid number is required."] });
            let (base_url, server) =
                serve(vec![("400 Bad Request", body.to_string())]).await;
            let client = ApiClient::new(base_url, "secret-token").unwrap();

            match client.put_project(3, &HoursUpdate::new(1.0, 0.0, 0.0)).await {
                Err(ApiError::Validation(errors)) => assert_eq!(errors.body(), &body),
                other => panic!("expected validation error, got {:?}", other),
            }
            server.await.unwrap();
        }

        #[tokio::test]
        async fn test_update_of_unknown_project_sends_delta_as_is() {
            let (base_url, server) = serve(vec![
                ("404 Not Found", r#"{"detail":"Not found."}"#.to_string()),
                ("200 OK", serde_json::to_string(&fixtures::project(5)).unwrap()),
            ])
            .await;
            let client = ApiClient::new(base_url, "secret-token").unwrap();

            crate::store::update_project(
                &client,
                5,
                HoursUpdate::new(0.5, 0.0, 1.0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

            let requests = server.await.unwrap();
            assert_eq!(request_line(&requests[0]), "GET /api/projects/5 HTTP/1.1");
            assert_eq!(request_line(&requests[1]), "PUT /api/projects/5/ HTTP/1.1");
            let (_, payload) = requests[1].split_once("\r\n\r\n").unwrap();
            let payload: Value = serde_json::from_str(payload).unwrap();
            assert_eq!(
                payload,
                json!({
                    "actual_design": "0.50",
                    "actual_development": "0.00",
                    "actual_testing": "1.00"
                })
            );
        }
    }
}
