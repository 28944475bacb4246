//! Drives the external documentation generator for a workspace.
//!
//! The run is a fixed sequence of shell steps executed in the workspace root: create the
//! virtual environment if missing, install the project, check that the generator has
//! credentials (asking for an API key through a [`CredentialPrompt`] otherwise), then
//! generate into the wiki directory. Progress and generator output are reported as
//! [`ViewerEvent`]s. A [`GenerationHandle`] cancels the run and kills the in-flight process.
use std::{
    fmt::{Display, Formatter},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::{mpsc::UnboundedSender, watch},
};

use crate::{
    config::{GeneratorSettings, WikiLayout},
    error::ViewerError,
    event::ViewerEvent,
    tree::WikiTree,
};

pub const CANCELLED_MESSAGE: &str = "CodeWiki generation cancelled.";
pub const KEY_REQUIRED_MESSAGE: &str = "CodeWiki generation cancelled: API key required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationStep {
    CreateEnvironment,
    InstallDependencies,
    CheckConfiguration,
    ProvisionCredentials,
    Generate,
}

impl GenerationStep {
    pub fn progress_message(&self) -> &'static str {
        match self {
            GenerationStep::CreateEnvironment => "Creating virtual environment...",
            GenerationStep::InstallDependencies => "Installing dependencies...",
            GenerationStep::CheckConfiguration => "Checking configuration...",
            GenerationStep::ProvisionCredentials => "Configuring API key...",
            GenerationStep::Generate => "Generating documentation...",
        }
    }
}

impl Display for GenerationStep {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GenerationStep::CreateEnvironment => write!(f, "uv venv"),
            GenerationStep::InstallDependencies => write!(f, "uv pip install"),
            GenerationStep::CheckConfiguration => write!(f, "config show"),
            GenerationStep::ProvisionCredentials => write!(f, "config set"),
            GenerationStep::Generate => write!(f, "codewiki generate"),
        }
    }
}

/// Asks the user for an API key. Blocking; called off the async runtime.
pub trait CredentialPrompt: Send + Sync {
    /// `None` when the user dismissed the prompt.
    fn request_api_key(&self) -> Option<String>;
}

/// Whether `config show` output reports a configured key.
pub fn has_credentials(config_output: &str) -> bool {
    config_output.contains("(in system keychain)")
        || (config_output.contains("API Key:") && !config_output.contains("Not set"))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    /// Carries the message shown to the user.
    Cancelled(String),
}

#[derive(Debug, Clone)]
pub struct GenerationHandle {
    cancel_tx: Arc<watch::Sender<bool>>,
}

impl GenerationHandle {
    pub fn cancel(&self) {
        tracing::info!("Generation cancellation requested");
        self.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn read_lines<R>(
    reader: R,
    stderr: bool,
    events: Option<UnboundedSender<ViewerEvent>>,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("generator output closed: {}", e);
                break;
            }
        }
        // Output is not guaranteed to be UTF-8.
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw).into_owned();
        tracing::trace!("generator {}: {}", if stderr { "stderr" } else { "stdout" }, line);
        if let Some(tx) = &events {
            let _ = tx.send(ViewerEvent::GenerationOutput {
                line: line.clone(),
                stderr,
            });
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

pub struct GenerationWorkflow {
    layout: WikiLayout,
    settings: GeneratorSettings,
    prompt: Arc<dyn CredentialPrompt>,
    events: UnboundedSender<ViewerEvent>,
    cancel_rx: watch::Receiver<bool>,
    handle: GenerationHandle,
}

impl GenerationWorkflow {
    pub fn new(
        layout: WikiLayout,
        settings: GeneratorSettings,
        prompt: Arc<dyn CredentialPrompt>,
        events: UnboundedSender<ViewerEvent>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        GenerationWorkflow {
            layout,
            settings,
            prompt,
            events,
            cancel_rx,
            handle: GenerationHandle {
                cancel_tx: Arc::new(cancel_tx),
            },
        }
    }

    pub fn handle(&self) -> GenerationHandle {
        self.handle.clone()
    }

    fn emit(&self, event: ViewerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Generation event receiver dropped");
        }
    }

    /// Run every step. The final event (`GenerationFinished`, `GenerationCancelled` or
    /// `GenerationFailed`) mirrors the returned value.
    pub async fn run(mut self, tree: &WikiTree) -> Result<GenerationOutcome, ViewerError> {
        tracing::info!(
            "Generating wiki for {}",
            self.layout.workspace_root.display()
        );
        let result = match self.execute(tree).await {
            Err(ViewerError::OperationCancelled) => {
                Ok(GenerationOutcome::Cancelled(CANCELLED_MESSAGE.to_string()))
            }
            other => other,
        };
        match &result {
            Ok(GenerationOutcome::Completed) => {
                tracing::info!("Wiki generation finished");
                self.emit(ViewerEvent::GenerationFinished);
            }
            Ok(GenerationOutcome::Cancelled(reason)) => {
                tracing::warn!("{}", reason);
                self.emit(ViewerEvent::GenerationCancelled(reason.clone()));
            }
            Err(e) => {
                tracing::error!("Wiki generation failed: {}", e);
                self.emit(ViewerEvent::GenerationFailed(e.to_string()));
            }
        }
        result
    }

    async fn execute(&mut self, tree: &WikiTree) -> Result<GenerationOutcome, ViewerError> {
        self.check_cancelled()?;
        let activate = format!(
            ". {}/bin/activate",
            shell_quote(&self.settings.venv_dir)
        );
        let program = shell_quote(&self.settings.program);

        if !self
            .layout
            .workspace_root
            .join(&self.settings.venv_dir)
            .exists()
        {
            self.run_step(GenerationStep::CreateEnvironment, "uv venv", &[], false)
                .await?;
        }

        self.run_step(
            GenerationStep::InstallDependencies,
            &format!("{activate} && uv pip install -e ."),
            &[],
            false,
        )
        .await?;

        let config_output = self
            .run_step(
                GenerationStep::CheckConfiguration,
                &format!("{activate} && {program} config show"),
                &[],
                false,
            )
            .await?;

        if !has_credentials(&config_output) {
            let Some(api_key) = self.ask_for_key().await? else {
                return Ok(GenerationOutcome::Cancelled(KEY_REQUIRED_MESSAGE.to_string()));
            };
            self.run_step(
                GenerationStep::ProvisionCredentials,
                &format!("{activate} && {program} config set --api-key \"$1\""),
                &[api_key.as_str()],
                false,
            )
            .await?;
            self.emit(ViewerEvent::info("API key configured successfully!"));
        }

        let output_dir = self.layout.wiki_root.to_string_lossy().into_owned();
        self.run_step(
            GenerationStep::Generate,
            &format!("{activate} && {program} generate --output \"$1\""),
            &[output_dir.as_str()],
            true,
        )
        .await?;

        // Let the generator's last writes land before the tree is re-read.
        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;
        self.check_cancelled()?;
        tree.invalidate();
        self.emit(ViewerEvent::TreeChanged);
        self.emit(ViewerEvent::info(
            "CodeWiki documentation generated successfully!",
        ));
        Ok(GenerationOutcome::Completed)
    }

    fn check_cancelled(&self) -> Result<(), ViewerError> {
        if *self.cancel_rx.borrow() {
            Err(ViewerError::OperationCancelled)
        } else {
            Ok(())
        }
    }

    async fn ask_for_key(&mut self) -> Result<Option<String>, ViewerError> {
        self.check_cancelled()?;
        let prompt = self.prompt.clone();
        let answer = tokio::task::spawn_blocking(move || prompt.request_api_key())
            .await
            .map_err(|e| ViewerError::Custom(format!("Credential prompt failed: {e}")))?;
        self.check_cancelled()?;
        let Some(key) = answer
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
        else {
            return Ok(None);
        };
        if key.chars().count() < self.settings.min_api_key_len {
            return Err(ViewerError::Custom(format!(
                "API key must be at least {} characters",
                self.settings.min_api_key_len
            )));
        }
        Ok(Some(key))
    }

    /// Run one `sh -c` step, returning its stdout.
    async fn run_step(
        &mut self,
        step: GenerationStep,
        script: &str,
        args: &[&str],
        stream_output: bool,
    ) -> Result<String, ViewerError> {
        self.check_cancelled()?;
        tracing::info!("[{}] {}", step, step.progress_message());
        self.emit(ViewerEvent::GenerationProgress(
            step.progress_message().to_string(),
        ));

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .arg("codewiki-step")
            .args(args)
            .current_dir(&self.layout.workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        tracing::debug!("[{}] started with PID {:?}", step, child.id());

        let stream_to = stream_output.then(|| self.events.clone());
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(read_lines(out, false, stream_to.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(read_lines(err, true, stream_to)));

        let status: ExitStatus = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut self.cancel_rx) => {
                tracing::warn!("[{}] cancelled, killing process", step);
                if let Err(e) = child.kill().await {
                    tracing::warn!("[{}] failed to kill process: {}", step, e);
                }
                return Err(ViewerError::OperationCancelled);
            }
        };

        let stdout = match stdout {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(stdout)
        } else {
            if !stderr.trim().is_empty() {
                tracing::warn!("[{}] stderr:\n{}", step, stderr.trim_end());
            }
            Err(ViewerError::Workflow {
                step: step.to_string(),
                code: status.code(),
            })
        }
    }
}
