use super::OutputHandler;
use crate::error::Result;
use crate::record::MovieRecord;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Streams records into a single JSON array.
pub struct JsonOutput {
    file: BufWriter<File>,
    first: bool,
}

impl JsonOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);

        write!(file, "[")?;

        Ok(Self { file, first: true })
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn write(&mut self, record: &MovieRecord) -> Result<()> {
        if !self.first {
            write!(self.file, ",")?;
        } else {
            self.first = false;
        }

        serde_json::to_writer(&mut self.file, record)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        writeln!(self.file, "]")?;
        self.file.flush()?;
        Ok(())
    }
}
