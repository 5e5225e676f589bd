//! Conversion API Module
//!
//! Per-file decision engine: existence check, same-format skip, overwrite policy,
//! decode, format strategy, atomic encode. Batches never abort on a single file.

use crate::formats::{normalized_extension, ImageHandle, OutputFormat};
use crate::strategy::{self, strategy_for};
use image::ImageReader;
use rayon::prelude::*;
use serde::Serialize;
use shared_utils::{BatchResult, ConvertError};
use std::collections::HashMap;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const TEMP_PREFIX: &str = ".img-convert-";
const TEMP_SUFFIX: &str = ".tmp";

/// Batch-wide settings, fixed before the first file is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConvertOptions {
    pub output_format: OutputFormat,
    /// Replace outputs that already exist.
    pub overwrite: bool,
    /// Worker threads: 1 is sequential, 0 means one per CPU.
    pub jobs: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Jpg,
            overwrite: true,
            jobs: 1,
        }
    }
}

impl ConvertOptions {
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            ..Self::default()
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn effective_jobs(&self) -> usize {
        match self.jobs {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input_path: PathBuf,
    pub output_format: OutputFormat,
    pub overwrite_existing: bool,
}

impl ConversionRequest {
    pub fn new(input_path: impl Into<PathBuf>, options: &ConvertOptions) -> Self {
        Self {
            input_path: input_path.into(),
            output_format: options.output_format,
            overwrite_existing: options.overwrite,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        output_path_for(&self.input_path, self.output_format)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted(PathBuf),
    SkippedSameFormat,
    SkippedNotFound,
    SkippedExists(PathBuf),
    Failed(ConvertError),
}

impl ConversionOutcome {
    /// Short label, also used as the skip reason in batch tallies.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionOutcome::Converted(_) => "converted",
            ConversionOutcome::SkippedSameFormat => "same format",
            ConversionOutcome::SkippedNotFound => "not found",
            ConversionOutcome::SkippedExists(_) => "exists",
            ConversionOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            ConversionOutcome::SkippedSameFormat
                | ConversionOutcome::SkippedNotFound
                | ConversionOutcome::SkippedExists(_)
        )
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            ConversionOutcome::Converted(p) | ConversionOutcome::SkippedExists(p) => {
                Some(p.as_path())
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match self {
            ConversionOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn record_into(&self, input: &Path, tally: &mut BatchResult) {
        match self {
            ConversionOutcome::Converted(_) => tally.success(),
            ConversionOutcome::Failed(e) => tally.fail(input.to_path_buf(), e.to_string()),
            skipped => tally.skip(skipped.label()),
        }
    }
}

/// One input and its outcome, as reported back to the caller.
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: ConversionOutcome,
}

/// Outcomes of a batch in input order.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub options: ConvertOptions,
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn new<P: AsRef<Path>>(
        paths: &[P],
        outcomes: Vec<ConversionOutcome>,
        options: ConvertOptions,
    ) -> Self {
        let entries = paths
            .iter()
            .zip(outcomes)
            .map(|(p, outcome)| ReportEntry {
                input: p.as_ref().to_path_buf(),
                outcome,
            })
            .collect();
        Self { options, entries }
    }

    pub fn tally(&self) -> BatchResult {
        let mut tally = BatchResult::new();
        for entry in &self.entries {
            entry.outcome.record_into(&entry.input, &mut tally);
        }
        tally
    }
}

/// `<input dir>/<input stem>.<canonical extension>`.
pub fn output_path_for(input: &Path, format: OutputFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Convert every path, returning outcomes in input order.
pub fn convert_all<P: AsRef<Path>>(
    paths: &[P],
    options: &ConvertOptions,
) -> Vec<ConversionOutcome> {
    convert_all_with_progress(paths, options, |_, _| {})
}

/// Like [`convert_all`], calling `on_done` with the input index as each file finishes.
pub fn convert_all_with_progress<P, F>(
    paths: &[P],
    options: &ConvertOptions,
    on_done: F,
) -> Vec<ConversionOutcome>
where
    P: AsRef<Path>,
    F: Fn(usize, &ConversionOutcome) + Sync,
{
    let requests: Vec<ConversionRequest> = paths
        .iter()
        .map(|p| ConversionRequest::new(p.as_ref(), options))
        .collect();

    let jobs = options.effective_jobs();
    debug!(
        files = requests.len(),
        format = %options.output_format,
        overwrite = options.overwrite,
        jobs,
        "Starting batch"
    );

    if jobs <= 1 || requests.len() <= 1 {
        return convert_sequential(&requests, &on_done);
    }

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("img-convert-{}", i))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "Failed to build worker pool, converting sequentially");
            return convert_sequential(&requests, &on_done);
        }
    };

    let groups = group_by_output(&requests);
    let requests = &requests;
    let on_done = &on_done;
    let mut indexed: Vec<(usize, ConversionOutcome)> = pool.install(|| {
        groups
            .par_iter()
            .flat_map_iter(|group| {
                // same output path: strictly one after another, in input order
                group.iter().map(move |&i| {
                    let outcome = convert_one(&requests[i]);
                    on_done(i, &outcome);
                    (i, outcome)
                })
            })
            .collect()
    });

    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

fn convert_sequential<F>(requests: &[ConversionRequest], on_done: &F) -> Vec<ConversionOutcome>
where
    F: Fn(usize, &ConversionOutcome),
{
    requests
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let outcome = convert_one(request);
            on_done(i, &outcome);
            outcome
        })
        .collect()
}

/// Input indices grouped by the output file they would write, groups in first-seen order.
fn group_by_output(requests: &[ConversionRequest]) -> Vec<Vec<usize>> {
    let mut slots: HashMap<PathBuf, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (i, request) in requests.iter().enumerate() {
        let key = output_lock_key(&request.output_path());
        match slots.get(&key) {
            Some(&slot) => groups[slot].push(i),
            None => {
                slots.insert(key, groups.len());
                groups.push(vec![i]);
            }
        }
    }

    groups
}

/// Output path with its directory canonicalized, so `a/x.png` and `./a/x.png` collide.
fn output_lock_key(output: &Path) -> PathBuf {
    let (Some(parent), Some(name)) = (output.parent(), output.file_name()) else {
        return output.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    parent
        .canonicalize()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| output.to_path_buf())
}

/// Run the per-file decision sequence for one request.
pub fn convert_one(request: &ConversionRequest) -> ConversionOutcome {
    let input = request.input_path.as_path();
    let format = request.output_format;

    match input.try_exists() {
        Ok(true) => {}
        Ok(false) => {
            debug!(input = %input.display(), "Input not found, skipping");
            return ConversionOutcome::SkippedNotFound;
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            let err = ConvertError::from_read_io(input, e);
            error!(input = %input.display(), error = %err, "Cannot access input");
            return ConversionOutcome::Failed(err);
        }
        Err(e) => {
            debug!(input = %input.display(), error = %e, "Input not reachable, skipping");
            return ConversionOutcome::SkippedNotFound;
        }
    }

    if normalized_extension(input).as_deref() == Some(format.extension()) {
        debug!(input = %input.display(), format = %format, "Already in target format");
        return ConversionOutcome::SkippedSameFormat;
    }

    let output = output_path_for(input, format);
    if !request.overwrite_existing && output.exists() {
        warn!(
            input = %input.display(),
            output = %output.display(),
            "Output exists and overwrite is off, skipping"
        );
        return ConversionOutcome::SkippedExists(output);
    }

    match convert_to(input, &output, format, request.overwrite_existing) {
        Ok(Persisted::Written) => {
            info!(
                input = %input.display(),
                output = %output.display(),
                format = %format,
                "Converted"
            );
            ConversionOutcome::Converted(output)
        }
        Ok(Persisted::AlreadyExists) => {
            warn!(
                input = %input.display(),
                output = %output.display(),
                "Output appeared during conversion, left untouched"
            );
            ConversionOutcome::SkippedExists(output)
        }
        Err(err) => {
            error!(
                input = %input.display(),
                output = %output.display(),
                format = %format,
                category = ?err.category(),
                error = %err,
                "Conversion failed"
            );
            ConversionOutcome::Failed(err)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persisted {
    Written,
    /// No-clobber rename found a file already in place.
    AlreadyExists,
}

fn convert_to(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    overwrite: bool,
) -> Result<Persisted, ConvertError> {
    let handle = decode(input)?;
    let strategy = strategy_for(format);
    debug!(
        input = %input.display(),
        format = %format,
        mode = ?handle.mode(),
        transform = ?strategy.transform,
        quality = ?strategy.quality,
        reason = strategy.reason,
        "Applying format strategy"
    );
    let prepared = strategy.apply(handle, format);

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = temp_builder()
        .tempfile_in(dir)
        .map_err(|e| ConvertError::from_write_io(output, e))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        strategy::encode(prepared, format, &strategy, &mut writer)
            .map_err(|e| ConvertError::from_encode(output, e))?;
        writer
            .flush()
            .map_err(|e| ConvertError::from_write_io(output, e))?;
    }

    // temp is removed on drop if either persist fails
    if overwrite {
        temp.persist(output)
            .map_err(|e| ConvertError::from_write_io(output, e.error))?;
        return Ok(Persisted::Written);
    }

    match temp.persist_noclobber(output) {
        Ok(_) => Ok(Persisted::Written),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(Persisted::AlreadyExists),
        Err(e) => Err(ConvertError::from_write_io(output, e.error)),
    }
}

/// Decode by content sniffing, falling back to the extension.
pub fn decode(input: &Path) -> Result<ImageHandle, ConvertError> {
    let pixels = ImageReader::open(input)
        .map_err(|e| ConvertError::from_read_io(input, e))?
        .with_guessed_format()
        .map_err(|e| ConvertError::from_read_io(input, e))?
        .decode()
        .map_err(|e| ConvertError::from_decode(input, e))?;
    Ok(ImageHandle::new(pixels))
}

fn temp_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
    #[cfg(unix)]
    {
        // tempfile defaults to 0600; outputs should get the usual umask-derived mode
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
}
