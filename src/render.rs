//! Running the external renderer.
//!
//! A render takes minutes, so it runs on a worker thread of its own. The
//! worker only touches the filesystem: a private copy of the world, and the
//! map's output directory. The finished [`RenderOutcome`] is handed back over
//! a channel, and the event loop is woken to apply it.
use crate::prelude::*;
use crate::metadata::DetailLevel;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc};
use std::thread;

/// Something that turns a world into a map.
pub trait Renderer: Send + Sync {
    /// Renders the world at `db` into `out`, blocking until done. Returns the
    /// exit code, `None` when the renderer was killed by a signal.
    fn run(&self, db: &Path, out: &Path, detail: DetailLevel) -> io::Result<Option<i32>>;
}

/// The `bedrock-viz` command line tool.
#[derive(Debug, Clone)]
pub struct BedrockViz {
    program: PathBuf,
}
impl BedrockViz {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

fn forward(stream: impl Read, level: log::Level, name: &str) {
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) => log::log!(level, "{name}: {line}"),
            Err(_) => break,
        }
    }
}

impl Renderer for BedrockViz {
    fn run(&self, db: &Path, out: &Path, detail: DetailLevel) -> io::Result<Option<i32>> {
        let mut child = Command::new(&self.program)
            .arg("--db")
            .arg(db)
            .arg("--out")
            .arg(out)
            .arg(detail.flag())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stderr = child
            .stderr
            .take()
            .map(|err| thread::spawn(move || forward(err, log::Level::Warn, "stderr")));
        if let Some(out) = child.stdout.take() {
            forward(out, log::Level::Info, "stdout");
        }
        if let Some(stderr) = stderr {
            let _ = stderr.join();
        }
        let status = child.wait()?;
        log::info!("{} exited with {status}", self.program.display());
        Ok(status.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub map_id: MapId,
    /// Title to record for the map once it exists.
    pub display_name: String,
    pub detail: DetailLevel,
    pub public: bool,
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub map_id: MapId,
    pub success: bool,
    pub exit_status: Option<i32>,
}
impl RenderOutcome {
    fn failed(job: &RenderJob) -> Self {
        Self { map_id: job.map_id.clone(), success: false, exit_status: None }
    }
}

/// Copies a directory tree. Anything that is neither file nor directory is
/// left behind.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<u64> {
    let mut copied = 0;
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// One whole render: the game may write to the world at any moment, so the
/// renderer only ever sees a private copy, which is gone again on every way
/// out of this function.
pub fn execute(renderer: &dyn Renderer, job: &RenderJob) -> RenderOutcome {
    let workdir = match tempfile::Builder::new().prefix("mapserv-").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            log::error!("unable to create a working directory: {e}");
            return RenderOutcome::failed(job);
        }
    };
    log::info!("working directory: {}", workdir.path().display());
    match copy_tree(&job.source, workdir.path()) {
        Ok(n) => log::info!(
            "copied {n} files from {} to {}",
            job.source.display(),
            workdir.path().display()
        ),
        Err(e) => {
            log::error!("unable to copy {}: {e}", job.source.display());
            return RenderOutcome::failed(job);
        }
    }
    // a failed render must not leave the previous map behind looking current
    match fs::remove_dir_all(&job.output) {
        Ok(()) => log::info!("deleted {}", job.output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            log::error!("unable to remove previous map {}: {e}", job.output.display());
            return RenderOutcome::failed(job);
        }
    }

    let outcome = match renderer.run(workdir.path(), &job.output, job.detail) {
        Ok(code) => RenderOutcome {
            map_id: job.map_id.clone(),
            success: code == Some(0),
            exit_status: code,
        },
        Err(e) => {
            log::error!("unable to run renderer for {}: {e}", job.map_id);
            RenderOutcome::failed(job)
        }
    };
    let path = workdir.path().to_owned();
    match workdir.close() {
        Ok(()) => log::info!("deleted {}", path.display()),
        Err(e) => log::warn!("unable to remove {}: {e}", path.display()),
    }
    outcome
}

/// Called from a worker once its outcome is ready to be picked up.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug)]
pub struct Finished<T> {
    pub tag: T,
    pub job: RenderJob,
    pub outcome: RenderOutcome,
}

/// Hands jobs to worker threads and collects what they produce. `T` travels
/// with each job untouched, so the caller can tell whom to answer.
pub struct RenderQueue<T> {
    renderer: Arc<dyn Renderer>,
    done_tx: mpsc::Sender<Finished<T>>,
    done_rx: mpsc::Receiver<Finished<T>>,
    waker: Option<Waker>,
}

impl<T: Send + 'static> RenderQueue<T> {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self { renderer, done_tx, done_rx, waker: None }
    }
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    /// Starts `job` on a worker of its own.
    pub fn submit(&self, job: RenderJob, tag: T) -> io::Result<()> {
        let renderer = Arc::clone(&self.renderer);
        let done = self.done_tx.clone();
        let waker = self.waker.clone();
        thread::Builder::new().name(format!("render-{}", job.map_id)).spawn(move || {
            let outcome = execute(&*renderer, &job);
            if done.send(Finished { tag, job, outcome }).is_ok() {
                if let Some(wake) = waker {
                    wake();
                }
            }
        })?;
        Ok(())
    }

    /// Renders that have finished since the last call.
    pub fn completed(&self) -> impl Iterator<Item = Finished<T>> + '_ {
        self.done_rx.try_iter()
    }
}

impl<T> std::fmt::Debug for RenderQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderQueue").field("waker", &self.waker.is_some()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records what it was asked to render, and where it found the world.
    #[derive(Default)]
    struct Recorder {
        exit: Option<i32>,
        seen: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }
    impl Renderer for Recorder {
        fn run(&self, db: &Path, out: &Path, _detail: DetailLevel) -> io::Result<Option<i32>> {
            let mut files: Vec<String> = walkdir::WalkDir::new(db)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().strip_prefix(db).unwrap().to_string_lossy().into_owned())
                .collect();
            files.sort();
            self.seen.lock().unwrap().push((db.to_owned(), files));
            fs::create_dir_all(out)?;
            fs::write(out.join("index.html"), "<html>")?;
            Ok(self.exit)
        }
    }

    #[derive(Default)]
    struct Unspawnable {
        db: Mutex<Option<PathBuf>>,
    }
    impl Renderer for Unspawnable {
        fn run(&self, db: &Path, _: &Path, _: DetailLevel) -> io::Result<Option<i32>> {
            *self.db.lock().unwrap() = Some(db.to_owned());
            Err(io::Error::new(io::ErrorKind::NotFound, "no such program"))
        }
    }

    fn job(tmp: &Path) -> RenderJob {
        let source = tmp.join("worlds").join("w1");
        fs::create_dir_all(source.join("db")).unwrap();
        fs::write(source.join("levelname.txt"), "Survival").unwrap();
        fs::write(source.join("db").join("CURRENT"), "MANIFEST-000001").unwrap();
        RenderJob {
            map_id: MapId::parse("w1").unwrap(),
            display_name: "Survival".into(),
            detail: DetailLevel::AllDetails,
            public: true,
            source,
            output: tmp.join("maps").join("w1"),
        }
    }

    #[test]
    fn renders_a_private_copy_and_cleans_it_up() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());
        let renderer = Recorder { exit: Some(0), ..Default::default() };

        let outcome = execute(&renderer, &job);
        assert!(outcome.success);
        assert_eq!((outcome.map_id, outcome.exit_status), (job.map_id.clone(), Some(0)));

        let seen = renderer.seen.lock().unwrap();
        let (db, files) = &seen[0];
        assert_ne!(db, &job.source);
        assert_eq!(files, &["db/CURRENT", "levelname.txt"]);
        assert!(!db.exists());
        assert!(job.output.join("index.html").exists());
    }

    #[test]
    fn previous_map_is_removed_first() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());
        fs::create_dir_all(&job.output).unwrap();
        fs::write(job.output.join("stale.png"), "old").unwrap();

        let outcome = execute(&Recorder { exit: Some(3), ..Default::default() }, &job);
        assert!(!outcome.success);
        assert_eq!(outcome.exit_status, Some(3));
        assert!(!job.output.join("stale.png").exists());
    }

    #[test]
    fn spawn_failure_still_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());
        let renderer = Unspawnable::default();
        let outcome = execute(&renderer, &job);
        assert_eq!(outcome, RenderOutcome::failed(&job));
        let db = renderer.db.lock().unwrap().clone().unwrap();
        assert!(!db.exists());
    }

    #[test]
    fn missing_world_fails_without_running() {
        let tmp = tempfile::tempdir().unwrap();
        let mut job = job(tmp.path());
        job.source = tmp.path().join("worlds").join("gone");
        let renderer = Recorder::default();
        assert!(!execute(&renderer, &job).success);
        assert!(renderer.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn queue_reports_back_and_wakes() {
        let tmp = tempfile::tempdir().unwrap();
        let woken = Arc::new(AtomicUsize::new(0));
        let renderer = Recorder { exit: Some(0), ..Default::default() };
        let mut queue = RenderQueue::new(Arc::new(renderer));
        let counter = Arc::clone(&woken);
        queue.set_waker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        queue.submit(job(tmp.path()), 7u32).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(20);
        let finished = loop {
            if let Some(done) = queue.completed().next() {
                break done;
            }
            assert!(std::time::Instant::now() < deadline, "render never finished");
            thread::sleep(std::time::Duration::from_millis(10));
        };
        assert_eq!(finished.tag, 7);
        assert!(finished.outcome.success);
        assert_eq!(woken.load(Ordering::SeqCst), 1);
        assert_eq!(queue.completed().count(), 0);
    }
}
