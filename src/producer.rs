use crate::error::{ConvertError, Result};
use std::borrow::Cow;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub type Lines = Box<dyn Iterator<Item = Result<String>>>;

/// Source of dump lines for one Perl file.
pub trait Producer {
    fn produce(&self, source: &Path) -> Result<Lines>;
}

const DUMP_SCRIPT: &str = "PpiDumper->new(PPI::Document->new($ARGV[0]))->print;";

/// Runs the PPI dumper under `perl` and streams its stdout.
#[derive(Debug, Clone)]
pub struct PerlProducer {
    pub perl: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Default for PerlProducer {
    fn default() -> Self {
        Self {
            perl: PathBuf::from("perl"),
            include_dirs: Vec::new(),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl PerlProducer {
    fn command(&self, source: &Path) -> Command {
        let mut cmd = Command::new(&self.perl);
        for dir in &self.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.args(["-MPPI", "-MPpiDumper", "-e", DUMP_SCRIPT])
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl Producer for PerlProducer {
    fn produce(&self, source: &Path) -> Result<Lines> {
        debug!(source = %source.display(), "starting dump producer");
        spawn_lines(self.command(source), self.timeout)
    }
}

/// Spawns `cmd` and yields its stdout line by line. Reading happens on a
/// helper thread so the consumer can give up once `timeout` has passed.
fn spawn_lines(mut cmd: Command, timeout: Option<Duration>) -> Result<Lines> {
    let mut child = cmd.spawn().map_err(|source| ConvertError::ProducerSpawn {
        program: PathBuf::from(cmd.get_program()),
        source,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        ConvertError::Io(std::io::Error::other("dump producer has no stdout"))
    })?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let line = match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => Ok(decode_line(&buf)),
                Err(e) => Err(e),
            };
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });

    Ok(Box::new(ChildLines {
        child: Some(child),
        rx,
        deadline: timeout.map(|t| (Instant::now() + t, t)),
    }))
}

/// Turns one raw stdout line into text. Bytes that are not UTF-8 (legacy
/// Latin-1 sources) become U+FFFD instead of failing the read.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match String::from_utf8_lossy(raw) {
        Cow::Borrowed(line) => line.to_string(),
        Cow::Owned(line) => {
            warn!(line = %line, "dump line is not valid UTF-8, invalid bytes replaced");
            line
        }
    }
}

struct ChildLines {
    child: Option<Child>,
    rx: Receiver<std::io::Result<String>>,
    deadline: Option<(Instant, Duration)>,
}

impl ChildLines {
    fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(status) if !status.success() => warn!(%status, "dump producer failed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not wait for dump producer"),
            }
        }
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Iterator for ChildLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;
        let received = match self.deadline {
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some((at, _)) => self
                .rx
                .recv_timeout(at.saturating_duration_since(Instant::now())),
        };
        match received {
            Ok(Ok(line)) => Some(Ok(line)),
            Ok(Err(e)) => {
                self.kill();
                Some(Err(e.into()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.reap();
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                self.kill();
                let secs = self.deadline.map(|(_, t)| t.as_secs()).unwrap_or_default();
                Some(Err(ConvertError::ProducerTimeout { secs }))
            }
        }
    }
}

impl Drop for ChildLines {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Serves a fixed dump, ignoring the source path.
#[derive(Debug, Clone, Default)]
pub struct StaticProducer {
    lines: Vec<String>,
}

impl StaticProducer {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_dump(text: &str) -> Self {
        Self::new(text.lines())
    }
}

impl Producer for StaticProducer {
    fn produce(&self, _source: &Path) -> Result<Lines> {
        Ok(Box::new(self.lines.clone().into_iter().map(Ok)))
    }
}
