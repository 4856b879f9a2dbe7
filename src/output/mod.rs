use crate::config::schema::OutputConfig;
use crate::error::Result;
use crate::record::MovieRecord;
use async_trait::async_trait;
use indicatif::MultiProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod console;
pub mod csv;
pub mod json;
pub mod report;
pub mod sqlite;

pub use console::ConsoleOutput;
pub use csv::CsvOutput;
pub use json::JsonOutput;
pub use sqlite::SqliteOutput;

#[async_trait]
pub trait OutputHandler: Send + Sync {
    async fn write(&mut self, record: &MovieRecord) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens the sink for one record set. `stem` names it: `movies_<stem>.csv`,
/// `movies_<stem>.json`, or table `<table>_<stem>`.
pub async fn open_sink(
    config: &OutputConfig,
    stem: &str,
    multi: Option<Arc<MultiProgress>>,
) -> Result<Box<dyn OutputHandler>> {
    let stem = stem.to_lowercase();
    Ok(match config {
        OutputConfig::Console => Box::new(ConsoleOutput::new(multi)),
        OutputConfig::Csv { dir } => {
            Box::new(CsvOutput::new(prepare_dir(dir)?.join(format!("movies_{stem}.csv")))?)
        }
        OutputConfig::Json { dir } => {
            Box::new(JsonOutput::new(prepare_dir(dir)?.join(format!("movies_{stem}.json")))?)
        }
        OutputConfig::Sqlite { path, table } => Box::new(
            SqliteOutput::new(PathBuf::from(path), format!("{table}_{stem}")).await?,
        ),
    })
}

/// Writes every record and closes the sink.
pub async fn write_all(sink: &mut dyn OutputHandler, records: &[MovieRecord]) -> Result<()> {
    for record in records {
        sink.write(record).await?;
    }
    sink.close().await
}

/// Where run reports go for a given output setup.
pub fn report_dir(config: &OutputConfig) -> PathBuf {
    match config {
        OutputConfig::Csv { dir } | OutputConfig::Json { dir } => PathBuf::from(dir),
        OutputConfig::Sqlite { path, .. } => Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        OutputConfig::Console => PathBuf::from("."),
    }
}

fn prepare_dir(dir: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(dir);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{RawMovie, canonicalize};

    pub(crate) fn sample(id: i64, method: &str) -> MovieRecord {
        canonicalize(
            RawMovie {
                id: Some(id),
                title: Some(format!("Title, \"{id}\"")),
                rating: Some("7.25".into()),
                genres: vec!["Drama".into(), "Crime".into()],
                ..RawMovie::default()
            },
            method,
        )
    }

    #[tokio::test]
    async fn csv_sink_is_named_after_stem() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutputConfig::Csv {
            dir: dir.path().join("out").display().to_string(),
        };
        let mut sink = open_sink(&config, "BS4_TOR", None).await.unwrap();
        write_all(sink.as_mut(), &[sample(1, "BS4_TOR")]).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("out/movies_bs4_tor.csv")).unwrap();
        assert!(written.starts_with(&MovieRecord::COLUMNS.join(",")));
    }

    #[test]
    fn reports_follow_sink_location() {
        assert_eq!(
            report_dir(&OutputConfig::Sqlite {
                path: "data/movies.db".into(),
                table: "movies".into()
            }),
            PathBuf::from("data")
        );
        assert_eq!(
            report_dir(&OutputConfig::Sqlite {
                path: "movies.db".into(),
                table: "movies".into()
            }),
            PathBuf::from(".")
        );
        assert_eq!(report_dir(&OutputConfig::Console), PathBuf::from("."));
    }
}
