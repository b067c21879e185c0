//! Human-readable and JSON output on stdout.

use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use super::{Sink, SinkError};
use crate::table::Table;

/// Rendering used by [`DisplaySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// One block per table: a `#<n>: <name>` header, the columns, the rows.
    Text,
    /// One JSON array of series per batch, on a single line.
    Json,
}

/// Prints batches to a writer, stdout by default.
pub struct DisplaySink<W: Write + Send> {
    format: DisplayFormat,
    out: Mutex<W>,
}

impl DisplaySink<io::Stdout> {
    pub fn stdout(format: DisplayFormat) -> Self {
        Self::new(format, io::stdout())
    }
}

impl<W: Write + Send> DisplaySink<W> {
    pub fn new(format: DisplayFormat, out: W) -> Self {
        Self {
            format,
            out: Mutex::new(out),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, batch: &[Table]) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        match self.format {
            DisplayFormat::Text => write_text(&mut *out, batch)?,
            DisplayFormat::Json => {
                serde_json::to_writer(&mut *out, batch)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn write_text(out: &mut impl Write, batch: &[Table]) -> io::Result<()> {
    for (i, table) in batch.iter().enumerate() {
        write!(out, "\n#{}: {}\n", i, table.name)?;
        for column in &table.columns {
            write!(out, "| {}\t", column)?;
        }
        writeln!(out, "|")?;
        for row in &table.rows {
            write!(out, "| ")?;
            for value in row {
                write!(out, "{}\t| ", value)?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

impl<W: Write + Send> Sink for DisplaySink<W> {
    fn name(&self) -> &str {
        match self.format {
            DisplayFormat::Text => "display",
            DisplayFormat::Json => "display-json",
        }
    }

    fn write<'a>(
        &'a self,
        batch: &'a [Table],
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move { self.render(batch) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn batch() -> Vec<Table> {
        let mut load = Table::new("web01.load", &["one", "five", "fifteen"]);
        load.push_row(vec![Value::F64(0.15), Value::F64(0.1), Value::F64(0.05)])
            .unwrap();
        let mut swap = Table::new("web01.swap", &["free", "used", "total"]);
        swap.push_row(vec![Value::U64(3), Value::U64(1), Value::U64(4)])
            .unwrap();
        vec![load, swap]
    }

    #[tokio::test]
    async fn test_text_output() {
        let sink = DisplaySink::new(DisplayFormat::Text, Vec::new());
        sink.write(&batch()).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "\n#0: web01.load\n| one\t| five\t| fifteen\t|\n| 0.15\t| 0.1\t| 0.05\t| \n\
             \n#1: web01.swap\n| free\t| used\t| total\t|\n| 3\t| 1\t| 4\t| \n"
        );
    }

    #[tokio::test]
    async fn test_json_output_is_one_line_per_batch() {
        let sink = DisplaySink::new(DisplayFormat::Json, Vec::new());
        let batch = batch();
        sink.write(&batch).await.unwrap();
        sink.write(&batch[..1]).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: Vec<Table> = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, batch);
        assert!(lines[1].starts_with(r#"[{"name":"web01.load""#));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let sink = DisplaySink::new(DisplayFormat::Json, Vec::new());
        sink.write(&[]).await.unwrap();
        assert_eq!(sink.into_inner(), b"[]\n");
    }

    #[tokio::test]
    async fn test_write_error_is_io() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let sink = DisplaySink::new(DisplayFormat::Text, Broken);
        let err = sink.write(&batch()).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
