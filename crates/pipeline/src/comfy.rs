use crate::config::RemoteConfig;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Retrying HTTP client for the remote generation server. Generator
/// implementations submit a workflow, wait for the job id to appear in the
/// history, and download the produced files; backoff and the
/// cleanup-between-jobs policy live here so every back-end behaves the
/// same from the reconciliation managers' point of view.
pub struct RemoteClient {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Self {
        RemoteClient {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;
        for attempt in 1..=self.config.retries {
            match self
                .client
                .get(url)
                .timeout(self.config.request_timeout)
                .send()
                .await
                .and_then(|response| response.error_for_status())
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "GET {url} failed on attempt {attempt}/{}: {err}",
                        self.config.retries
                    );
                    last_error = Some(err);
                    if attempt < self.config.retries {
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error.unwrap().into())
    }

    async fn post_json_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let mut last_error = None;
        for attempt in 1..=self.config.retries {
            match self
                .client
                .post(url)
                .timeout(self.config.request_timeout)
                .json(body)
                .send()
                .await
                .and_then(|response| response.error_for_status())
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "POST {url} failed on attempt {attempt}/{}: {err}",
                        self.config.retries
                    );
                    last_error = Some(err);
                    if attempt < self.config.retries {
                        sleep(self.config.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error.unwrap().into())
    }

    /// Submit a workflow and return its job id.
    pub async fn submit(&self, workflow: &serde_json::Value) -> Result<String> {
        let url = format!("{}/prompt", self.config.base_url);
        let body = serde_json::json!({ "prompt": workflow });
        let response = self.post_json_with_retry(&url, &body).await?;
        let result: serde_json::Value = response.json().await?;
        result
            .get("prompt_id")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .context("job submission response is missing prompt_id")
    }

    /// Poll the history endpoint until the job id appears, then verify it
    /// completed successfully and return its history entry.
    pub async fn await_completion(&self, prompt_id: &str) -> Result<serde_json::Value> {
        loop {
            let url = format!("{}/history", self.config.base_url);
            let history: serde_json::Value = self.get_with_retry(&url).await?.json().await?;
            if let Some(entry) = history.get(prompt_id) {
                let status = entry
                    .pointer("/status/status_str")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let completed = entry
                    .pointer("/status/completed")
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                if status != "success" || !completed {
                    bail!("remote job {prompt_id} failed with status {status}");
                }
                return Ok(entry.clone());
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// File names produced by a completed job.
    pub fn output_names(history_entry: &serde_json::Value) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(outputs) = history_entry.get("outputs").and_then(|v| v.as_object()) {
            for node_output in outputs.values() {
                if let Some(kinds) = node_output.as_object() {
                    for values in kinds.values() {
                        if let Some(items) = values.as_array() {
                            for item in items {
                                if let Some(name) =
                                    item.get("filename").and_then(|v| v.as_str())
                                {
                                    names.push(name.to_string());
                                }
                            }
                        }
                    }
                }
            }
        }
        names
    }

    /// Download the named outputs into `output_folder`.
    pub async fn fetch_outputs(
        &self,
        names: &[String],
        output_folder: &Path,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_folder)?;
        let mut downloaded = Vec::new();
        for name in names {
            let url = format!(
                "{}/view?filename={}&type=output",
                self.config.base_url, name
            );
            let bytes = self.get_with_retry(&url).await?.bytes().await?;
            let target = output_folder.join(name);
            std::fs::write(&target, &bytes)
                .with_context(|| format!("failed to write output {}", target.display()))?;
            downloaded.push(target);
        }
        Ok(downloaded)
    }

    /// Release remote resources between jobs, then settle. Failures are
    /// logged only; cleanup is best effort.
    pub async fn free_remote_memory(&self) {
        let url = format!("{}/free", self.config.base_url);
        let body = serde_json::json!({ "unload_models": true, "free_memory": true });
        match self.post_json_with_retry(&url, &body).await {
            Ok(_) => sleep(self.config.cleanup_delay).await,
            Err(err) => error!("failed to free remote memory: {err}"),
        }
    }

    /// Submit, wait and download one workflow. The cleanup hook runs after
    /// every attempt, success or failure.
    pub async fn run_workflow(
        &self,
        workflow: &serde_json::Value,
        output_folder: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut last_error = None;
        for attempt in 1..=self.config.retries {
            let result = self.run_workflow_once(workflow, output_folder).await;
            self.free_remote_memory().await;
            match result {
                Ok(outputs) => return Ok(outputs),
                Err(err) => {
                    warn!(
                        "workflow attempt {attempt}/{} failed: {err}",
                        self.config.retries
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap())
    }

    async fn run_workflow_once(
        &self,
        workflow: &serde_json::Value,
        output_folder: &Path,
    ) -> Result<Vec<PathBuf>> {
        let prompt_id = self.submit(workflow).await?;
        debug!("submitted remote job {prompt_id}");
        let entry = self.await_completion(&prompt_id).await?;
        let names = Self::output_names(&entry);
        if names.is_empty() {
            bail!("remote job {prompt_id} completed without outputs");
        }
        let outputs = self.fetch_outputs(&names, output_folder).await?;
        info!("remote job {prompt_id} produced {} file(s)", outputs.len());
        Ok(outputs)
    }
}
