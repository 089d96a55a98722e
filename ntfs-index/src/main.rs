use std::io::Write;

use ntfs_index::catalogs::{INDEX_NAME, ReparsePoints};
use ntfs_index::config::DumpConfig;
use ntfs_index::storage::{FileRecord, OwningRecord, SortedIndex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ntfs_index=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match DumpConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: record_path={}, index_name={}",
        config.record_path.display(),
        config.index_name
    );

    let mut record = match FileRecord::load(&config.record_path) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Failed to load record: {e}");
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = if config.index_name == INDEX_NAME {
        ReparsePoints::new(&mut record)
            .dump(&mut out, &config.indent)
            .map_err(|e| e.to_string())
    } else {
        match record.index(&config.index_name) {
            Some(index) => dump_raw(index, &config, &mut out).map_err(|e| e.to_string()),
            None => Err(format!("record has no {} index", config.index_name)),
        }
    };

    if let Err(e) = result.and_then(|()| out.flush().map_err(|e| e.to_string())) {
        tracing::error!("Failed to dump index: {e}");
        std::process::exit(1);
    }
}

/// Dump an index with no known catalog as hex key/value pairs.
fn dump_raw(
    index: &SortedIndex,
    config: &DumpConfig,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let indent = &config.indent;
    writeln!(out, "{indent}INDEX {}", config.index_name)?;
    for entry in index.iter() {
        let (key, value) = entry?;
        writeln!(out, "{indent}  {} => {}", hex(&key), hex(&value))?;
    }
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    if bytes.is_empty() {
        return "<no data>".to_string();
    }
    bytes.iter().fold(String::new(), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
