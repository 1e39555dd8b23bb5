/// Minimal FASTA reading and subsetting
///
/// Reference collections only need their headers (id and description); query gene
/// collections are filtered down to the sequences of still unresolved genomes before
/// alignment.
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::input::open_input;

const LINE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// First whitespace-delimited word of the header
    pub id: String,
    /// Rest of the header line, trimmed
    pub description: String,
    pub sequence: String,
}

pub struct FastaReader<R: BufRead> {
    reader: R,
    pending_header: Option<String>,
    line_number: usize,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        FastaReader {
            reader,
            pending_header: None,
            line_number: 0,
        }
    }

    pub fn read_record(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.pending_header.take() {
            Some(header) => header,
            None => match self.next_header()? {
                Some(header) => header,
                None => return Ok(None),
            },
        };

        let mut sequence = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            self.line_number += 1;
            let trimmed = line.trim();
            if let Some(next) = trimmed.strip_prefix('>') {
                self.pending_header = Some(next.to_string());
                break;
            }
            sequence.push_str(trimmed);
        }

        let header = header.trim();
        let (id, description) = match header.split_once(char::is_whitespace) {
            Some((id, rest)) => (id, rest.trim()),
            None => (header, ""),
        };
        if id.is_empty() {
            bail!("Empty FASTA header before line {}", self.line_number);
        }

        Ok(Some(FastaRecord {
            id: id.to_string(),
            description: description.to_string(),
            sequence,
        }))
    }

    /// Skip to the first header, rejecting sequence data that precedes it
    fn next_header(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.strip_prefix('>') {
                Some(header) => return Ok(Some(header.to_string())),
                None => bail!(
                    "Expected a FASTA header at line {}, found sequence data",
                    self.line_number
                ),
            }
        }
    }
}

/// (id, description) of every record, in file order
pub fn read_headers<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let mut reader = FastaReader::new(open_input(path)?);
    let mut headers = Vec::new();
    while let Some(record) = reader
        .read_record()
        .with_context(|| format!("Failed to read FASTA {}", path.display()))?
    {
        headers.push((record.id, record.description));
    }
    Ok(headers)
}

/// Copy the records whose id passes `keep` to `out`. Returns the number written.
pub fn write_subset<P, F, W>(path: P, keep: F, mut out: W) -> Result<usize>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
    W: Write,
{
    let path = path.as_ref();
    let mut reader = FastaReader::new(open_input(path)?);
    let mut written = 0;
    while let Some(record) = reader
        .read_record()
        .with_context(|| format!("Failed to read FASTA {}", path.display()))?
    {
        if !keep(&record.id) {
            continue;
        }
        write_record(&mut out, &record)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

pub fn write_record<W: Write>(out: &mut W, record: &FastaRecord) -> Result<()> {
    if record.description.is_empty() {
        writeln!(out, ">{}", record.id)?;
    } else {
        writeln!(out, ">{} {}", record.id, record.description)?;
    }
    for chunk in record.sequence.as_bytes().chunks(LINE_WIDTH) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
