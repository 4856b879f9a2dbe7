use super::OutputHandler;
use crate::error::Result;
use crate::record::MovieRecord;
use async_trait::async_trait;
use std::path::PathBuf;

/// One row per record, header from the record's column names.
pub struct CsvOutput {
    writer: csv::Writer<std::fs::File>,
    path: PathBuf,
    rows: usize,
}

impl CsvOutput {
    pub fn new(path: PathBuf) -> Result<Self> {
        let writer = csv::Writer::from_path(&path)?;
        Ok(Self {
            writer,
            path,
            rows: 0,
        })
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn write(&mut self, record: &MovieRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.rows == 0 {
            // serialize() only writes the header alongside the first row
            self.writer.write_record(MovieRecord::COLUMNS)?;
        }
        self.writer.flush()?;
        log::info!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample;

    #[tokio::test]
    async fn rows_round_trip_through_csv_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies_api.csv");
        let mut out = CsvOutput::new(path.clone()).unwrap();
        out.write(&sample(1, "API")).await.unwrap();
        out.write(&sample(2, "API")).await.unwrap();
        out.close().await.unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect::<Vec<_>>(),
            MovieRecord::COLUMNS.to_vec()
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Title, \"1\"");
        assert_eq!(&rows[0][3], "7.3");
        assert_eq!(&rows[0][4], "N/A");
        assert_eq!(&rows[0][5], "Drama | Crime");
        assert_eq!(&rows[1][8], "API");
    }

    #[tokio::test]
    async fn empty_file_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies_common.csv");
        let mut out = CsvOutput::new(path.clone()).unwrap();
        out.close().await.unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written.trim_end(), MovieRecord::COLUMNS.join(","));
    }
}
