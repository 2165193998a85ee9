use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ResolverError;
use crate::models::{FoundDependency, ResolutionErrorKind};
use crate::subproject::DependencySource;

/// What the external resolver reports for one dependency source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionResult {
    /// Dependencies were produced, possibly with partial errors.
    Ok {
        dependencies: Vec<FoundDependency>,
        #[serde(default)]
        errors: Vec<ResolutionErrorKind>,
    },
    Error(Vec<ResolutionErrorKind>),
}

/// Anything able to resolve dependency sources by talking to package
/// managers. `None` means no usable response at all.
pub trait DynamicResolver {
    fn resolve_dependencies(
        &self,
        sources: &[DependencySource],
    ) -> Option<Vec<(DependencySource, ResolutionResult)>>;
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    sources: &'a [DependencySource],
}

/// Runs an external command per request: the request goes to stdin as JSON,
/// a JSON array of `[source, result]` pairs is expected on stdout.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    args: Vec<String>,
}

impl CommandResolver {
    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self, ResolverError> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(ResolverError::NotConfigured)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(
        &self,
        sources: &[DependencySource],
    ) -> Result<Vec<(DependencySource, ResolutionResult)>, ResolverError> {
        let request = serde_json::to_vec(&ResolveRequest { sources })?;
        let spawn_error = |source| ResolverError::Spawn {
            command: self.command_line(),
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
            // Exit status is checked below.
            if let Err(e) = stdin.write_all(&request) {
                debug!("Could not write request to resolver: {}", e);
            }
        }

        let output = child.wait_with_output().map_err(spawn_error)?;
        if !output.status.success() {
            return Err(ResolverError::Failed {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl DynamicResolver for CommandResolver {
    fn resolve_dependencies(
        &self,
        sources: &[DependencySource],
    ) -> Option<Vec<(DependencySource, ResolutionResult)>> {
        debug!("Running `{}` for {} source(s)", self.command_line(), sources.len());
        match self.run(sources) {
            Ok(responses) => Some(responses),
            Err(e) => {
                warn!("Dynamic resolution unavailable: {}", e);
                None
            }
        }
    }
}
