//! Process table sources.
//!
//! The sampler only needs a synchronous call that returns the whole table as
//! text at one instant. `PsSource` gets it from `ps`.

use chrono::{DateTime, Utc};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

use crate::process::parser::ParseError;
use crate::process::record::ColumnLayout;

/// Unparsed process table output.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub text: String,
    pub captured_at: DateTime<Utc>,
    /// Pid of the helper that listed the table, which appears in its own output.
    pub lister_pid: Option<u32>,
}

/// Anything that can produce the process table on demand.
pub trait ProcessTableSource {
    /// Column layout the produced text uses.
    fn layout(&self) -> &ColumnLayout;

    /// Captures the full table. Blocks until the table is available.
    fn capture(&mut self) -> Result<RawTable, CaptureError>;
}

/// Lists processes with `ps -axwwo <columns>`.
#[derive(Debug, Clone)]
pub struct PsSource {
    program: String,
    layout: ColumnLayout,
}

impl PsSource {
    pub fn new(program: impl Into<String>, layout: ColumnLayout) -> Self {
        Self {
            program: program.into(),
            layout,
        }
    }

    /// Full argument list passed to the program.
    pub fn args(&self) -> Vec<String> {
        vec!["-axwwo".to_string(), self.layout.ps_format()]
    }
}

impl Default for PsSource {
    fn default() -> Self {
        Self::new("ps", ColumnLayout::default())
    }
}

impl ProcessTableSource for PsSource {
    fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    fn capture(&mut self) -> Result<RawTable, CaptureError> {
        let child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let lister_pid = child.id();
        let output = child
            .wait_with_output()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let captured_at = Utc::now();

        if !output.status.success() {
            return Err(CaptureError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8(output.stdout).map_err(|_| CaptureError::NotUtf8 {
            program: self.program.clone(),
        })?;
        debug!(
            "{} listed {} bytes (lister pid {})",
            self.program,
            text.len(),
            lister_pid
        );
        trace!("raw process table:\n{}", text);

        Ok(RawTable {
            text,
            captured_at,
            lister_pid: Some(lister_pid),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("could not start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` produced output that is not valid UTF-8")]
    NotUtf8 { program: String },

    #[error("malformed process table")]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_args_follow_layout() {
        let source = PsSource::new("ps", ColumnLayout::default().with_elapsed_seconds());
        assert_eq!(
            source.args(),
            vec!["-axwwo".to_string(), "user,pid,ppid,pgid,etimes,command".to_string()]
        );
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut source = PsSource::new("/nonexistent/pstree-prof-ps", ColumnLayout::default());
        let err = source.capture().unwrap_err();
        assert!(matches!(err, CaptureError::Spawn { .. }));

        // The io error is the source, not part of the message
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("os error").count(), 1);
        assert!(chain.starts_with("could not start `/nonexistent/pstree-prof-ps`: "));
    }

    #[test]
    fn test_parse_error_is_reported_once() {
        let err = CaptureError::from(ParseError::MissingHeader);
        assert_eq!(err.to_string(), "malformed process table");
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(
            chain,
            format!("malformed process table: {}", ParseError::MissingHeader)
        );
    }

    #[test]
    fn test_failing_program_is_reported() {
        // `false` accepts and ignores arguments, then exits 1
        let mut source = PsSource::new("false", ColumnLayout::default());
        assert!(matches!(source.capture(), Err(CaptureError::Failed { .. })));
    }
}
