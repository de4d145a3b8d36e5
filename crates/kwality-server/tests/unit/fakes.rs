//! Scripted container runtime for endpoint tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use kwality_domain::error::{Error, Result};
use kwality_domain::ports::{ContainerRuntime, ContainerSpec, ContainerStats, ExecOutput};

/// Feeds build/entry execs from a script; sampler traffic gets empty
/// success. An optional delay simulates long-running entry processes.
pub struct ScriptedRuntime {
    script: Mutex<VecDeque<ExecOutput>>,
    exec_delay: Duration,
}

impl ScriptedRuntime {
    pub fn new(outputs: Vec<ExecOutput>, exec_delay: Duration) -> Self {
        Self {
            script: Mutex::new(outputs.into()),
            exec_delay,
        }
    }

    pub fn ok_exec() -> ExecOutput {
        ExecOutput {
            exit_code: 0,
            stdout: "ok\n".to_owned(),
            stderr: String::new(),
        }
    }

    pub fn failed_exec(stderr: &str) -> ExecOutput {
        ExecOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: stderr.to_owned(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn create_and_start(&self, _spec: &ContainerSpec) -> Result<String> {
        Ok("scripted-container".to_owned())
    }

    async fn wait(&self, _id: &str) -> Result<i64> {
        Ok(0)
    }

    async fn stats(&self, _id: &str) -> Result<ContainerStats> {
        Ok(ContainerStats::default())
    }

    async fn exec(&self, _id: &str, command: &[String]) -> Result<ExecOutput> {
        if command.first().is_some_and(|c| c == "cat")
            || command.iter().any(|c| c.contains("readlink"))
        {
            return Ok(ExecOutput::default());
        }
        tokio::time::sleep(self.exec_delay).await;
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| Error::internal("scripted runtime exhausted"))
    }

    async fn logs(&self, _id: &str) -> Result<String> {
        Ok(String::new())
    }

    async fn stop(&self, _id: &str, _grace: Duration) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
