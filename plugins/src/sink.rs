//! Backend submission over JSON/HTTP with a bearer token.

use anyhow::Result;
use async_trait::async_trait;
use gator_core::api::{
    submittable, BackendConfig, ExtractionTask, ResultSink, SubmitReceipt, TaskPayload,
};
use serde_json::{json, Value};

use crate::http_client::{parse_json_response, HttpError};

/// Endpoint path and body for a completed task.
pub fn submission_body(cfg: &BackendConfig, task: &ExtractionTask) -> Option<(String, Value)> {
    let payload = submittable(task)?;
    let batch_id = task.id.clone();

    let out = match payload {
        TaskPayload::Assignments(items) => (
            cfg.assignments_path.clone(),
            json!({
                "assignments": items,
                "upload_batch_id": batch_id,
            }),
        ),
        TaskPayload::Recordings(items) => {
            let course_id = items.iter().find_map(|r| r.course_id.clone());
            (
                cfg.recordings_path.clone(),
                json!({
                    "courseId": course_id,
                    "recordings": items,
                    "upload_batch_id": batch_id,
                }),
            )
        }
        TaskPayload::Transcript(record) => (
            cfg.transcript_path.clone(),
            json!({
                "recording_id": record.recording_id,
                "transcript_data": record.transcript_segments,
                "formatted_text": record.formatted_text,
                "segment_count": record.segment_count,
            }),
        ),
    };
    Some(out)
}

pub struct HttpResultSink {
    cfg: BackendConfig,
    http: reqwest::Client,
    base_url: String,
}

impl HttpResultSink {
    pub fn new(cfg: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()?;
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            cfg,
            http,
            base_url,
        })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.cfg.api_token.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.cfg.api_token)
        }
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    fn name(&self) -> &str {
        "http_backend"
    }

    async fn submit(&self, task: &ExtractionTask) -> Result<SubmitReceipt> {
        let Some((path, body)) = submission_body(&self.cfg, task) else {
            anyhow::bail!("task {} has no completed result to submit", task.id);
        };
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!(task_id = %task.id, kind = %task.kind, url = %url, "submitting result");
        let resp = self
            .auth(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        let (status, answer) = parse_json_response(resp).await?;
        tracing::info!(task_id = %task.id, status, "result submitted");
        tracing::debug!(answer = %answer, "backend answer");

        Ok(SubmitReceipt {
            endpoint: url,
            status,
        })
    }
}
