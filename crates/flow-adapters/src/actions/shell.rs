//! ShellAction: comando externo a partir de una plantilla.
//!
//! La plantilla se renderiza con `ExecutionContext::render` y se ejecuta con
//! `sh -c`. El proceso hereda `ENVIRONMENT`, `NAMESPACE`, `REPLICAS` y
//! `RESOURCE_TIER`, de modo que herramientas como `envsubst` funcionan igual
//! que en los scripts de despliegue.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use flow_core::{ActionError, ExecutionContext, StepAction};
use log::debug;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ShellAction {
    template: String,
    shell: String,
    workdir: Option<PathBuf>,
    extra_env: Vec<(String, String)>,
}

impl ShellAction {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into(),
               shell: "sh".to_string(),
               workdir: None,
               extra_env: Vec::new() }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Variable adicional; se renderiza igual que la plantilla.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

#[async_trait]
impl StepAction for ShellAction {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        ctx.render(&self.template)
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, ActionError> {
        let script = ctx.render(&self.template);
        debug!("[{}] attempt {}: {} -c {script:?}", ctx.step_id, ctx.attempt, self.shell);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
           .arg(&script)
           .envs(ctx.env_vars())
           .envs(self.extra_env.iter().map(|(k, v)| (k.clone(), ctx.render(v))))
           .stdin(Stdio::null())
           .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let out = cmd.output()
                     .await
                     .map_err(|e| ActionError::new(format!("failed to spawn '{}': {e}", self.shell)))?;

        let mut combined = String::from_utf8_lossy(&out.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let combined = combined.trim_end().to_string();

        if out.status.success() {
            return Ok(combined);
        }
        let message = match out.status.code() {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by signal".to_string(),
        };
        Err(ActionError::new(message).with_output(combined))
    }
}
