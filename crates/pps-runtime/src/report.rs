//! Line-oriented report output.
//!
//! Every report becomes exactly one line and is flushed straight away so a
//! terminal or log pipe sees it as soon as the pulse is processed.

use pps_common::config::OutputFormat;
use pps_common::error::{PpsError, PpsResult};
use pps_common::stats::Report;
use std::io::Write;

/// Writes reports to an output stream in the configured format.
#[derive(Debug)]
pub struct ReportSink<W: Write> {
    writer: W,
    format: OutputFormat,
    lines_written: u64,
}

impl<W: Write> ReportSink<W> {
    /// Create a sink over `writer`.
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            lines_written: 0,
        }
    }

    /// Render one report line and flush.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::Output`] if the write or flush fails.
    pub fn emit(&mut self, report: &Report) -> PpsResult<()> {
        let result = match self.format {
            OutputFormat::Text => writeln!(self.writer, "{report}"),
            OutputFormat::Json => serde_json::to_writer(&mut self.writer, report)
                .map_err(std::io::Error::from)
                .and_then(|()| self.writer.write_all(b"\n")),
        };
        result
            .and_then(|()| self.writer.flush())
            .map_err(|source| PpsError::Output { source })?;
        self.lines_written += 1;
        Ok(())
    }

    /// Number of lines emitted.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
