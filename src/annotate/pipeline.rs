use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::annotate::reorder::ReorderBuffer;
use crate::annotate::writer::{AnnotationWriter, WriterConfig};
use crate::core::variant::Variant;
use crate::index::PositionalIndex;
use crate::matching::{DatabaseCursor, MatchEngine, MatchResult, MatchingConfig};
use crate::parsing::source::{OpenLines, SourceError};
use crate::parsing::vcf::{decode_line, parse_line, ParseError, ParsedLine, VcfHeader};

/// Default number of input records handed to a worker at once
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Malformed input lines reported individually before the log goes quiet
const MAX_MALFORMED_WARNINGS: u64 = 10;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Annotation cancelled after {} records", .0.records)]
    Cancelled(Box<RunSummary>),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Execution options
#[derive(Debug, Clone, Serialize)]
pub struct AnnotateOptions {
    /// Matching threads; 1 runs in the calling thread, 0 uses every CPU
    pub threads: usize,
    /// Records per unit of parallel work
    pub batch_size: usize,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AnnotateOptions {
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rows written, one per well-formed input record
    pub records: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Input lines skipped because they could not be parsed
    pub malformed_input: u64,
    /// Database lines skipped while indexing
    pub malformed_database: u64,
    pub threads: usize,
}

/// Streams an input VCF through the matcher and writes annotated rows.
///
/// With more than one thread, a reader thread batches records, workers
/// each match with their own [`DatabaseCursor`], and the calling thread
/// writes results back in input order. Output is identical either way.
pub struct Annotator<'a, D> {
    database: &'a D,
    engine: MatchEngine<'a>,
    writer: WriterConfig,
    options: AnnotateOptions,
    cancel: Arc<AtomicBool>,
}

impl<'a, D: OpenLines> Annotator<'a, D> {
    pub fn new(
        database: &'a D,
        index: &'a PositionalIndex,
        matching: MatchingConfig,
        writer: WriterConfig,
        options: AnnotateOptions,
    ) -> Self {
        Self {
            database,
            engine: MatchEngine::new(index, matching),
            writer,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run between records when set
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Annotate every record of `input`, writing the header row and one row
    /// per well-formed record to `output`.
    ///
    /// # Errors
    ///
    /// Returns `AnnotateError::Io` or `AnnotateError::Source` if reading or
    /// writing fails, `AnnotateError::Cancelled` (carrying the partial
    /// summary) if the cancel flag was raised, and
    /// `AnnotateError::WorkerPanicked` if a worker thread died.
    pub fn run<R, W>(&self, input: R, output: W) -> Result<RunSummary, AnnotateError>
    where
        R: BufRead + Send,
        W: Write,
    {
        let mut records = InputRecords::new(input);
        let input_header = records.read_header()?;

        let mut writer =
            AnnotationWriter::new(output, self.writer.clone(), self.engine.index().header());
        writer.write_header(&input_header)?;

        let threads = self.options.effective_threads();
        debug!(threads, batch_size = self.options.batch_size, "Starting annotation");

        let outcome = if threads > 1 {
            self.run_parallel(records, &mut writer, threads)
        } else {
            self.run_sequential(records, &mut writer)
        };

        let flushed = writer.flush();
        let malformed_input = outcome?;
        flushed?;

        let summary = RunSummary {
            records: writer.rows(),
            matched: writer.matched(),
            unmatched: writer.rows() - writer.matched(),
            malformed_input,
            malformed_database: self.engine.index().stats().malformed_lines,
            threads,
        };

        if self.cancel.load(Ordering::Relaxed) {
            warn!(records = summary.records, "Annotation cancelled");
            return Err(AnnotateError::Cancelled(Box::new(summary)));
        }

        info!(
            records = summary.records,
            matched = summary.matched,
            malformed_input = summary.malformed_input,
            "Annotation complete"
        );
        Ok(summary)
    }

    /// Returns the number of malformed input lines skipped
    fn run_sequential<R: BufRead, W: Write>(
        &self,
        mut records: InputRecords<R>,
        writer: &mut AnnotationWriter<'_, W>,
    ) -> Result<u64, AnnotateError> {
        let mut cursor = DatabaseCursor::new(self.database.open_lines()?);
        let mut malformed = MalformedTally::default();

        while let Some(item) = records.next_item()? {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            match item {
                InputItem::Record(variant) => {
                    let result = self.engine.match_variant(variant, &mut cursor)?;
                    writer.emit(&result)?;
                }
                InputItem::Malformed { line, error } => malformed.note(line, &error),
            }
        }

        Ok(malformed.count)
    }

    /// Returns the number of malformed input lines skipped
    fn run_parallel<R: BufRead + Send, W: Write>(
        &self,
        records: InputRecords<R>,
        writer: &mut AnnotationWriter<'_, W>,
        threads: usize,
    ) -> Result<u64, AnnotateError> {
        let batch_size = self.options.batch_size.max(1);
        let (batch_tx, batch_rx) = bounded::<Batch>(threads * 2);
        let (result_tx, result_rx) = bounded::<Result<Completed, AnnotateError>>(threads * 2);

        thread::scope(|s| {
            let cancel = self.cancel.as_ref();
            let producer = s.spawn(move || produce(records, &batch_tx, batch_size, cancel));

            let workers: Vec<_> = (0..threads)
                .map(|_| {
                    let batch_rx = batch_rx.clone();
                    let result_tx = result_tx.clone();
                    s.spawn(move || self.work(&batch_rx, &result_tx))
                })
                .collect();
            drop(batch_rx);
            drop(result_tx);

            let mut reorder = ReorderBuffer::new();
            let mut failure: Option<AnnotateError> = None;
            for message in &result_rx {
                if self.cancel.load(Ordering::Relaxed) {
                    break;
                }
                match message {
                    Ok(completed) => {
                        reorder.push(completed.sequence, completed.results);
                        if let Err(e) = write_ready(&mut reorder, writer) {
                            failure = Some(e.into());
                            break;
                        }
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            // Unblocks workers waiting to send so every thread can finish
            drop(result_rx);

            let mut panicked = false;
            for worker in workers {
                panicked |= worker.join().is_err();
            }
            let produced = producer.join();

            if let Some(e) = failure {
                return Err(e);
            }
            if panicked {
                return Err(AnnotateError::WorkerPanicked);
            }
            let malformed = produced.map_err(|_| AnnotateError::WorkerPanicked)??;
            if !reorder.is_empty() && !self.cancel.load(Ordering::Relaxed) {
                warn!(
                    pending = reorder.len(),
                    waiting_for = reorder.next_sequence(),
                    "Results left unwritten"
                );
            }
            Ok(malformed)
        })
    }

    /// Worker loop: match every batch with a private cursor
    fn work(&self, batches: &Receiver<Batch>, results: &Sender<Result<Completed, AnnotateError>>) {
        let mut cursor = match self.database.open_lines() {
            Ok(source) => DatabaseCursor::new(source),
            Err(e) => {
                let _ = results.send(Err(e.into()));
                return;
            }
        };

        for batch in batches {
            let mut matched = Vec::with_capacity(batch.records.len());
            for variant in batch.records {
                if self.cancel.load(Ordering::Relaxed) {
                    return;
                }
                match self.engine.match_variant(variant, &mut cursor) {
                    Ok(result) => matched.push(result),
                    Err(e) => {
                        let _ = results.send(Err(e.into()));
                        return;
                    }
                }
            }
            let completed = Completed {
                sequence: batch.sequence,
                results: matched,
            };
            if results.send(Ok(completed)).is_err() {
                return;
            }
        }
    }
}

/// Reader thread: parse input and hand out numbered batches.
/// Returns the number of malformed lines skipped.
fn produce<R: BufRead>(
    mut records: InputRecords<R>,
    batches: &Sender<Batch>,
    batch_size: usize,
    cancel: &AtomicBool,
) -> io::Result<u64> {
    let mut malformed = MalformedTally::default();
    let mut sequence = 0;
    let mut pending = Vec::with_capacity(batch_size);

    while let Some(item) = records.next_item()? {
        if cancel.load(Ordering::Relaxed) {
            return Ok(malformed.count);
        }
        match item {
            InputItem::Record(variant) => {
                pending.push(variant);
                if pending.len() == batch_size {
                    let batch = Batch {
                        sequence,
                        records: std::mem::replace(&mut pending, Vec::with_capacity(batch_size)),
                    };
                    if batches.send(batch).is_err() {
                        return Ok(malformed.count);
                    }
                    sequence += 1;
                }
            }
            InputItem::Malformed { line, error } => malformed.note(line, &error),
        }
    }

    if !pending.is_empty() {
        let _ = batches.send(Batch {
            sequence,
            records: pending,
        });
    }
    Ok(malformed.count)
}

fn write_ready<W: Write>(
    reorder: &mut ReorderBuffer<Vec<MatchResult>>,
    writer: &mut AnnotationWriter<'_, W>,
) -> io::Result<()> {
    while let Some(results) = reorder.pop_ready() {
        for result in &results {
            writer.emit(result)?;
        }
    }
    Ok(())
}

struct Batch {
    sequence: u64,
    records: Vec<Variant>,
}

struct Completed {
    sequence: u64,
    results: Vec<MatchResult>,
}

#[derive(Default)]
struct MalformedTally {
    count: u64,
}

impl MalformedTally {
    fn note(&mut self, line: u64, error: &ParseError) {
        self.count += 1;
        if self.count <= MAX_MALFORMED_WARNINGS {
            warn!(line, error = %error, "Skipping malformed input line");
        } else if self.count == MAX_MALFORMED_WARNINGS + 1 {
            warn!("Further malformed input lines will not be reported individually");
        }
    }
}

enum InputItem {
    Record(Variant),
    Malformed { line: u64, error: ParseError },
}

/// Sequential reader over the input VCF.
///
/// Lines are read as bytes so one that is not UTF-8 is reported as
/// malformed instead of failing the whole read.
struct InputRecords<R> {
    reader: R,
    line: Vec<u8>,
    line_number: u64,
    /// The last line read belongs to the body, not the header
    pending: bool,
}

impl<R: BufRead> InputRecords<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            line_number: 0,
            pending: false,
        }
    }

    /// Consume header lines up to the first body line
    fn read_header(&mut self) -> io::Result<VcfHeader> {
        let mut header = VcfHeader::new();
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(header);
            }
            self.line_number += 1;
            let is_header = match decode_line(&self.line) {
                Ok(text) => header.push_line(&text),
                Err(_) => false,
            };
            if !is_header {
                self.pending = true;
                return Ok(header);
            }
        }
    }

    /// Next record or malformed line; blank and `#` lines are skipped
    fn next_item(&mut self) -> io::Result<Option<InputItem>> {
        loop {
            if self.pending {
                self.pending = false;
            } else {
                self.line.clear();
                if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                    return Ok(None);
                }
                self.line_number += 1;
            }

            match decode_line(&self.line).and_then(|text| parse_line(&text)) {
                Ok(ParsedLine::Header) => continue,
                Ok(ParsedLine::Record(variant)) => return Ok(Some(InputItem::Record(variant))),
                Err(error) => {
                    return Ok(Some(InputItem::Malformed {
                        line: self.line_number,
                        error,
                    }))
                }
            }
        }
    }
}
