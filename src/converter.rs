use std::io;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::warn;

pub const DEFAULT_PROGRAM: &str = "pandoc";
pub const DEFAULT_ARGS: [&str; 2] = ["--from=mediawiki", "--to=plain"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` timed out after {} seconds", .after.as_secs_f64())]
    Timeout { program: String, after: Duration },

    #[error("`{program}` produced invalid UTF-8: {source}")]
    Utf8 {
        program: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Turns MediaWiki markup into plain text.
pub trait TextConverter {
    fn convert(&self, markup: &str) -> Result<String, ConversionError>;
}

/// Runs an external converter once per page, feeding markup on stdin.
pub struct PandocConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    rt: Runtime,
}

impl PandocConverter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> io::Result<Self> {
        Self::with_args(program, DEFAULT_ARGS, timeout)
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
            rt,
        })
    }

    async fn run(&self, markup: &str) -> Result<String, ConversionError> {
        let io_err = |source: io::Error| ConversionError::Io {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io_err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured")))?;
        let input = markup.as_bytes();

        // Feed stdin while draining stdout so large pages cannot fill both pipes.
        let feed = async move {
            match stdin.write_all(input).await {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        let exchange = async { tokio::try_join!(feed, child.wait_with_output()) };
        let (_, output) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ConversionError::Timeout {
                program: self.program.clone(),
                after: self.timeout,
            })?
            .map_err(io_err)?;

        if !output.status.success() {
            warn!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).map_err(|source| ConversionError::Utf8 {
            program: self.program.clone(),
            source,
        })
    }
}

impl TextConverter for PandocConverter {
    fn convert(&self, markup: &str) -> Result<String, ConversionError> {
        self.rt.block_on(self.run(markup))
    }
}

// ── Tests ──
