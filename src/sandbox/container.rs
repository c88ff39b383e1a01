//! Local-development container backend, adapted from the reference
//! daemon's `modules::container::{docker,podman}` split behind a single
//! `ContainerRuntime` trait, auto-detected via `which` in preference order
//! docker, then podman.

use async_trait::async_trait;
use std::process::Stdio;

use super::traits::{Backend, ContainerRuntime, SandboxExecutor};
use super::types::{ExecOutcome, ExecRequest, ExitOutcome, NetworkPolicy, SessionId};
use crate::error::SandboxError;

pub struct DockerRuntime;
pub struct PodmanRuntime;

fn binary_available(name: &str) -> bool {
    which::which(name).is_ok()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn binary_name(&self) -> &'static str {
        "docker"
    }

    async fn run(
        &self,
        image: &str,
        program: &str,
        session_id: &SessionId,
        memory_limit_mb: u64,
        network: NetworkPolicy,
    ) -> Result<std::process::Output, std::io::Error> {
        run_with_binary("docker", image, program, session_id, memory_limit_mb, network).await
    }

    async fn kill_session(&self, session_id: &SessionId) {
        kill_with_binary("docker", session_id).await;
    }
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    fn binary_name(&self) -> &'static str {
        "podman"
    }

    async fn run(
        &self,
        image: &str,
        program: &str,
        session_id: &SessionId,
        memory_limit_mb: u64,
        network: NetworkPolicy,
    ) -> Result<std::process::Output, std::io::Error> {
        run_with_binary("podman", image, program, session_id, memory_limit_mb, network).await
    }

    async fn kill_session(&self, session_id: &SessionId) {
        kill_with_binary("podman", session_id).await;
    }
}

async fn run_with_binary(
    binary: &str,
    image: &str,
    program: &str,
    session_id: &SessionId,
    memory_limit_mb: u64,
    network: NetworkPolicy,
) -> Result<std::process::Output, std::io::Error> {
    let mut cmd = tokio::process::Command::new(binary);
    cmd.arg("run")
        .arg("--rm")
        .arg("--name")
        .arg(format!("swarmkeep-{session_id}"))
        .arg("--memory")
        .arg(format!("{memory_limit_mb}m"));
    if matches!(network, NetworkPolicy::Denied) {
        cmd.arg("--network").arg("none");
    }
    cmd.arg(image).arg("sh").arg("-c").arg(program);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    cmd.output().await
}

async fn kill_with_binary(binary: &str, session_id: &SessionId) {
    let _ = tokio::process::Command::new(binary)
        .arg("rm")
        .arg("-f")
        .arg(format!("swarmkeep-{session_id}"))
        .output()
        .await;
}

/// Picks the first available runtime in docker-then-podman order.
pub fn detect_runtime() -> Option<Box<dyn ContainerRuntime>> {
    if binary_available("docker") {
        Some(Box::new(DockerRuntime))
    } else if binary_available("podman") {
        Some(Box::new(PodmanRuntime))
    } else {
        None
    }
}

pub struct ContainerExecutor {
    runtime: Option<Box<dyn ContainerRuntime>>,
    image: String,
}

impl ContainerExecutor {
    pub fn new(image: impl Into<String>) -> Self {
        ContainerExecutor {
            runtime: detect_runtime(),
            image: image.into(),
        }
    }
}

#[async_trait]
impl SandboxExecutor for ContainerExecutor {
    fn backend(&self) -> Backend {
        Backend::Container
    }

    async fn is_available(&self) -> bool {
        self.runtime.is_some()
    }

    async fn execute(&self, req: ExecRequest) -> Result<ExecOutcome, SandboxError> {
        let runtime = self.runtime.as_ref().ok_or(SandboxError::NoBackend)?;
        let result = tokio::time::timeout(
            req.timeout,
            runtime.run(&self.image, &req.program, &req.session_id, req.memory_limit_mb, req.network),
        )
        .await;

        match result {
            Err(_) => {
                runtime.kill_session(&req.session_id).await;
                Ok(ExecOutcome {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit: ExitOutcome::Timeout,
                    artifacts: Vec::new(),
                })
            }
            Ok(Err(_)) => Err(SandboxError::Down),
            Ok(Ok(output)) => Ok(ExecOutcome {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit: ExitOutcome::Code(output.status.code().unwrap_or(-1)),
                artifacts: Vec::new(),
            }),
        }
    }

    async fn teardown_session(&self, session_id: &SessionId) {
        if let Some(runtime) = &self.runtime {
            runtime.kill_session(session_id).await;
        }
    }
}
