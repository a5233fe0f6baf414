//! External programs as renderer and policy.
//!
//! Each call spawns the configured command line, writes one JSON request to
//! its stdin and reads the JSON response from its stdout.

use protocol::Pose;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::{InferenceRequest, Policy, Renderer, ServiceError};

/// A program plus its leading arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// # Errors
    ///
    /// Returns [`ServiceError::EmptyCommand`] when `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self, ServiceError> {
        let (program, args) = argv.split_first().ok_or(ServiceError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the command with `request` on stdin and returns its stdout.
    fn call<T: Serialize>(&self, request: &T) -> Result<Vec<u8>, ServiceError> {
        let payload = serde_json::to_vec(request).map_err(|source| ServiceError::Response {
            program: self.program.clone(),
            source,
        })?;
        let spawn_error = |source| ServiceError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;
        if !output.status.success() {
            return Err(ServiceError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(program = %self.program, bytes = output.stdout.len(), "command finished");
        Ok(output.stdout)
    }
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    glb_path: &'a Path,
    coordinates: Pose,
    image_path: &'a Path,
}

/// Renders by invoking an external program once per frame.
#[derive(Debug)]
pub struct CommandRenderer {
    command: CommandLine,
    scene: Option<PathBuf>,
}

impl CommandRenderer {
    #[must_use]
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            scene: None,
        }
    }
}

impl Renderer for CommandRenderer {
    fn load_scene(&mut self, glb_path: &Path) -> Result<(), ServiceError> {
        if !glb_path.is_file() {
            return Err(ServiceError::MissingScene(glb_path.to_path_buf()));
        }
        self.scene = Some(glb_path.to_path_buf());
        Ok(())
    }

    fn render(&mut self, pose: &Pose, image_path: &Path) -> Result<(), ServiceError> {
        let glb_path = self.scene.as_deref().ok_or(ServiceError::NoScene)?;
        self.command.call(&RenderRequest {
            glb_path,
            coordinates: *pose,
            image_path,
        })?;
        if image_path.is_file() {
            Ok(())
        } else {
            Err(ServiceError::MissingImage(image_path.to_path_buf()))
        }
    }

    fn release(&mut self) {
        self.scene = None;
    }
}

#[derive(Deserialize)]
struct PolicyResponse {
    coordinates: Pose,
}

/// Infers by invoking an external program once per step.
#[derive(Debug)]
pub struct CommandPolicy {
    command: CommandLine,
}

impl CommandPolicy {
    #[must_use]
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl Policy for CommandPolicy {
    fn infer(&mut self, request: &InferenceRequest) -> Result<Pose, ServiceError> {
        let stdout = self.command.call(request)?;
        let response: PolicyResponse =
            serde_json::from_slice(&stdout).map_err(|source| ServiceError::Response {
                program: self.command.program.clone(),
                source,
            })?;
        Ok(response.coordinates)
    }
}
