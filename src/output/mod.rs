//! Serialization of a selection into a single Markdown document.
//!
//! Three strategies trade metadata for size: `Minimal` (paths and code),
//! `Compact` (grouped by directory with sizes) and `Full` (index, metadata,
//! warnings and statistics). All of them read files one at a time in path
//! order, report progress after every file and hand control back to the host
//! through a [`Yielder`] every few files.

pub mod compact;
pub mod format;
pub mod full;
pub mod minimal;

use std::future::Future;
use std::io;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::{AppError, Result};
use crate::event::ProgressUpdate;
use crate::fs::host::{FileContent, FileSystem};
use crate::fs::ignore::is_binary_name;
use crate::fs::tree::SelectedFile;

/// Default number of processed files between cooperative yields.
pub const DEFAULT_YIELD_EVERY: usize = 5;
/// Default line count above which Full mode flags a file.
pub const DEFAULT_LARGE_FILE_LINES: usize = 1000;
/// Default byte size above which Full mode flags a file (100 KiB).
pub const DEFAULT_LARGE_FILE_BYTES: u64 = 100 * 1024;

/// Output strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    Minimal,
    Compact,
    #[default]
    Full,
}

impl OutputMode {
    pub fn label(&self) -> &'static str {
        match self {
            OutputMode::Minimal => "minimal",
            OutputMode::Compact => "compact",
            OutputMode::Full => "full",
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(OutputMode::Minimal),
            "compact" => Ok(OutputMode::Compact),
            "full" => Ok(OutputMode::Full),
            other => Err(format!(
                "unknown output mode '{}' (expected minimal, compact or full)",
                other
            )),
        }
    }
}

/// Hands control back to the host between batches of files.
pub trait Yielder {
    fn yield_now(&mut self) -> impl Future<Output = ()>;
}

/// Yields to the tokio scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioYield;

impl Yielder for TokioYield {
    fn yield_now(&mut self) -> impl Future<Output = ()> {
        tokio::task::yield_now()
    }
}

/// Never suspends; for batch callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoYield;

impl Yielder for NoYield {
    fn yield_now(&mut self) -> impl Future<Output = ()> {
        std::future::ready(())
    }
}

/// Tunables shared by the strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    /// Files between yields; `0` is treated as `1`. Pass `NoYield` to never
    /// suspend.
    pub yield_every: usize,
    pub large_file_lines: usize,
    pub large_file_bytes: u64,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            yield_every: DEFAULT_YIELD_EVERY,
            large_file_lines: DEFAULT_LARGE_FILE_LINES,
            large_file_bytes: DEFAULT_LARGE_FILE_BYTES,
        }
    }
}

/// Renders a selection with one of the strategies.
pub struct Generator<'a, F: FileSystem> {
    pub(crate) fs: &'a F,
    pub(crate) root_name: String,
    pub(crate) options: OutputOptions,
    pub(crate) generated_at: String,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, F: FileSystem> Generator<'a, F> {
    pub fn new(fs: &'a F, root_name: impl Into<String>) -> Self {
        Self {
            fs,
            root_name: root_name.into(),
            options: OutputOptions::default(),
            generated_at: format_timestamp(Local::now()),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: OutputOptions) -> Self {
        self.options = options;
        self
    }

    /// Pin the timestamp embedded in Compact and Full output.
    pub fn with_timestamp(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = format_timestamp(at);
        self
    }

    /// Abort at the next yield point once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub async fn generate<Y, P>(
        &self,
        mode: OutputMode,
        files: Vec<SelectedFile>,
        progress: P,
        yielder: &mut Y,
    ) -> Result<String>
    where
        Y: Yielder,
        P: FnMut(&ProgressUpdate),
    {
        match mode {
            OutputMode::Minimal => self.minimal(files, progress, yielder).await,
            OutputMode::Compact => self.compact(files, progress, yielder).await,
            OutputMode::Full => self.full(files, progress, yielder).await,
        }
    }

    pub async fn minimal<Y, P>(
        &self,
        files: Vec<SelectedFile>,
        progress: P,
        yielder: &mut Y,
    ) -> Result<String>
    where
        Y: Yielder,
        P: FnMut(&ProgressUpdate),
    {
        let files = sorted(files);
        let mut pass = self.pass(files.len(), progress, yielder);
        let out = minimal::render(self, &files, &mut pass).await?;
        pass.log_summary(OutputMode::Minimal);
        Ok(out)
    }

    pub async fn compact<Y, P>(
        &self,
        files: Vec<SelectedFile>,
        progress: P,
        yielder: &mut Y,
    ) -> Result<String>
    where
        Y: Yielder,
        P: FnMut(&ProgressUpdate),
    {
        let files = sorted(files);
        let mut pass = self.pass(files.len(), progress, yielder);
        let out = compact::render(self, &files, &mut pass).await?;
        pass.log_summary(OutputMode::Compact);
        Ok(out)
    }

    pub async fn full<Y, P>(
        &self,
        files: Vec<SelectedFile>,
        progress: P,
        yielder: &mut Y,
    ) -> Result<String>
    where
        Y: Yielder,
        P: FnMut(&ProgressUpdate),
    {
        let files = sorted(files);
        let mut pass = self.pass(files.len(), progress, yielder);
        let out = full::render(self, &files, &mut pass).await?;
        pass.log_summary(OutputMode::Full);
        Ok(out)
    }

    /// Fetch a file for Compact/Full. Binary names only need their size, so
    /// their content is never read.
    pub(crate) fn fetch<Y, P>(
        &self,
        file: &SelectedFile,
        pass: &mut Pass<'_, Y, P>,
    ) -> io::Result<FileContent> {
        let started = Instant::now();
        let fetched = if is_binary_name(&file.name) {
            self.fs.size(&file.handle).map(FileContent::binary)
        } else {
            self.fs.read(&file.handle)
        };
        pass.io_time += started.elapsed();
        fetched
    }

    fn pass<'p, Y, P>(&'p self, total: usize, progress: P, yielder: &'p mut Y) -> Pass<'p, Y, P>
    where
        Y: Yielder,
        P: FnMut(&ProgressUpdate),
    {
        Pass {
            yielder,
            progress,
            cancel: self.cancel.as_deref(),
            yield_every: self.options.yield_every.max(1),
            processed: 0,
            total,
            binaries: 0,
            errors: 0,
            started: Instant::now(),
            io_time: Duration::ZERO,
        }
    }
}

/// Per-run bookkeeping: progress, yields, cancellation and counters.
pub(crate) struct Pass<'p, Y, P> {
    yielder: &'p mut Y,
    progress: P,
    cancel: Option<&'p AtomicBool>,
    yield_every: usize,
    processed: usize,
    total: usize,
    pub(crate) binaries: usize,
    pub(crate) errors: usize,
    started: Instant,
    pub(crate) io_time: Duration,
}

impl<Y, P> Pass<'_, Y, P>
where
    Y: Yielder,
    P: FnMut(&ProgressUpdate),
{
    /// Report a finished file and yield on the configured cadence.
    pub(crate) async fn file_done(&mut self, name: &str) -> Result<()> {
        self.processed += 1;
        (self.progress)(&ProgressUpdate {
            current_file: name.to_string(),
            current: self.processed,
            total: self.total,
        });

        if self.processed % self.yield_every == 0 {
            self.check_cancelled()?;
            self.yielder.yield_now().await;
            self.check_cancelled()?;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(AppError::Cancelled),
            _ => Ok(()),
        }
    }

    fn log_summary(&self, mode: OutputMode) {
        info!(
            mode = mode.label(),
            files = self.total,
            binaries = self.binaries,
            errors = self.errors,
            io_ms = self.io_time.as_millis() as u64,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "generation finished"
        );
    }
}

fn sorted(mut files: Vec<SelectedFile>) -> Vec<SelectedFile> {
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fs::memory::MemoryFs;
    use crate::fs::tree::{BuildOptions, Tree};
    use chrono::TimeZone;

    /// Counts how often the generator suspended.
    #[derive(Default)]
    pub(crate) struct CountingYield {
        pub(crate) count: usize,
    }

    impl Yielder for CountingYield {
        fn yield_now(&mut self) -> impl Future<Output = ()> {
            self.count += 1;
            std::future::ready(())
        }
    }

    pub(crate) fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    pub(crate) fn selected(fs: &MemoryFs) -> Vec<SelectedFile> {
        Tree::build(fs, fs.handle(""), &[], BuildOptions::default()).collect_selected_files()
    }

    fn many_files(n: usize) -> MemoryFs {
        let mut fs = MemoryFs::new("proj");
        for i in 0..n {
            fs.add_file(&format!("f{:02}.txt", i), "x");
        }
        fs
    }

    #[test]
    fn parses_modes() {
        assert_eq!("minimal".parse::<OutputMode>().unwrap(), OutputMode::Minimal);
        assert_eq!("Compact".parse::<OutputMode>().unwrap(), OutputMode::Compact);
        assert_eq!("FULL".parse::<OutputMode>().unwrap(), OutputMode::Full);
        assert!("verbose".parse::<OutputMode>().is_err());
        assert_eq!(OutputMode::default(), OutputMode::Full);
    }

    #[tokio::test]
    async fn progress_reported_after_every_file() {
        let fs = many_files(3);
        let gen = Generator::new(&fs, "proj");
        let mut updates = Vec::new();
        gen.minimal(selected(&fs), |u| updates.push(u.clone()), &mut NoYield)
            .await
            .unwrap();

        let seen: Vec<(usize, usize, &str)> = updates
            .iter()
            .map(|u| (u.current, u.total, u.current_file.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![(1, 3, "f00.txt"), (2, 3, "f01.txt"), (3, 3, "f02.txt")]
        );
    }

    #[tokio::test]
    async fn yields_every_five_files() {
        let fs = many_files(12);
        let gen = Generator::new(&fs, "proj");
        for mode in [OutputMode::Minimal, OutputMode::Compact, OutputMode::Full] {
            let mut yielder = CountingYield::default();
            gen.generate(mode, selected(&fs), |_| {}, &mut yielder)
                .await
                .unwrap();
            assert_eq!(yielder.count, 2, "{:?}", mode);
        }
    }

    #[tokio::test]
    async fn yield_cadence_is_configurable() {
        let fs = many_files(12);
        let gen = Generator::new(&fs, "proj").with_options(OutputOptions {
            yield_every: 2,
            ..OutputOptions::default()
        });
        let mut yielder = CountingYield::default();
        gen.minimal(selected(&fs), |_| {}, &mut yielder)
            .await
            .unwrap();
        assert_eq!(yielder.count, 6);
    }

    #[tokio::test]
    async fn zero_cadence_still_yields() {
        let fs = many_files(3);
        let gen = Generator::new(&fs, "proj").with_options(OutputOptions {
            yield_every: 0,
            ..OutputOptions::default()
        });
        let mut yielder = CountingYield::default();
        gen.compact(selected(&fs), |_| {}, &mut yielder)
            .await
            .unwrap();
        assert_eq!(yielder.count, 3);
    }

    #[tokio::test]
    async fn yielding_does_not_change_output() {
        let fs = many_files(12);
        let gen = Generator::new(&fs, "proj").with_timestamp(fixed_time());
        let batch = gen
            .full(selected(&fs), |_| {}, &mut NoYield)
            .await
            .unwrap();
        let interactive = gen
            .full(selected(&fs), |_| {}, &mut TokioYield)
            .await
            .unwrap();
        assert_eq!(batch, interactive);
    }

    #[tokio::test]
    async fn cancellation_stops_at_yield_point() {
        let fs = many_files(12);
        let flag = Arc::new(AtomicBool::new(false));
        let gen = Generator::new(&fs, "proj").with_cancel(flag.clone());
        let mut seen = 0;
        let result = gen
            .compact(
                selected(&fs),
                |u| {
                    seen = u.current;
                    if u.current == 3 {
                        flag.store(true, Ordering::Relaxed);
                    }
                },
                &mut NoYield,
            )
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(seen, 5);
    }

    #[tokio::test]
    async fn input_order_does_not_matter() {
        let mut fs = MemoryFs::new("proj");
        fs.add_file("b/x.rs", "b").add_file("a/y.rs", "a").add_file("c.rs", "c");
        let gen = Generator::new(&fs, "proj").with_timestamp(fixed_time());
        let files = selected(&fs);
        let mut reversed = files.clone();
        reversed.reverse();

        for mode in [OutputMode::Minimal, OutputMode::Compact, OutputMode::Full] {
            let a = gen.generate(mode, files.clone(), |_| {}, &mut NoYield).await.unwrap();
            let b = gen.generate(mode, reversed.clone(), |_| {}, &mut NoYield).await.unwrap();
            assert_eq!(a, b, "{:?}", mode);
        }
    }
}
