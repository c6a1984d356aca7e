//! CSV ingestion for weekly metric exports.
//!
//! Expected header: `week`, one or more categorical columns, `visits`,
//! `conversions`. Every column is read as text so categorical codes keep
//! their exact spelling (`01` stays distinct from `1`); type normalisation
//! and null checks happen in [`Dataset::from_frame`].

use crate::dataset::Dataset;
use crate::error::{DecompError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

pub fn load_csv(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DecompError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )));
    }

    let frame = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| DecompError::Schema(format!("Failed to load CSV {}: {}", path.display(), e)))?;

    info!(
        "📥 Loaded {} rows, {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );

    Dataset::from_frame(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_csv_round_trip() {
        let dir = std::env::temp_dir().join(format!("metric_decomp_ingest_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("metrics.csv");
        fs::write(
            &path,
            "week,country,browser,visits,conversions\n\
             1,US,Chrome,1000,100\n\
             1,DE,Firefox,500,25\n\
             2,US,Chrome,1200,90\n",
        )
        .unwrap();

        let dataset = load_csv(&path).unwrap();
        assert_eq!(dataset.height(), 3);
        assert_eq!(dataset.dimension_columns(), &["country".to_string(), "browser".to_string()]);
        assert_eq!(dataset.weeks().unwrap(), vec![1, 2]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_numeric_looking_codes_stay_distinct() {
        let dir = std::env::temp_dir().join(format!("metric_decomp_codes_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("regions.csv");
        fs::write(
            &path,
            "week,region,visits,conversions\n\
             1,01,100,10\n\
             1,1,200,30\n\
             2,01,150,12\n\
             2,1,250,20\n",
        )
        .unwrap();

        let dataset = load_csv(&path).unwrap();
        assert_eq!(dataset.distinct_values("region").unwrap(), vec!["01", "1"]);
        assert_eq!(dataset.frame().column("visits").unwrap().dtype(), &DataType::Int64);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_late_non_numeric_code_loads() {
        let dir = std::env::temp_dir().join(format!("metric_decomp_late_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stores.csv");
        let mut body = String::from("week,store,visits,conversions\n");
        for i in 0..1100 {
            body.push_str(&format!("{},{},10,1\n", 1 + i % 2, i % 5));
        }
        body.push_str("2,STORE-X,10,1\n");
        fs::write(&path, body).unwrap();

        let dataset = load_csv(&path).unwrap();
        let stores = dataset.distinct_values("store").unwrap();
        assert_eq!(stores.len(), 6);
        assert!(stores.contains(&"STORE-X".to_string()));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_fractional_counts_rejected() {
        let dir = std::env::temp_dir().join(format!("metric_decomp_frac_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fractional.csv");
        fs::write(&path, "week,country,visits,conversions\n1,US,10.9,1\n2,US,12,2\n").unwrap();

        assert!(matches!(load_csv(&path), Err(DecompError::Schema(_))));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(DecompError::Io(_))));
    }
}
