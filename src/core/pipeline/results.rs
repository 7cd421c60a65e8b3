use crate::core::behavior::ResultRecord;
use crate::core::error::RecordError;
use std::path::Path;

const HEADER: [&str; 3] = ["video", "rears", "stretches"];

/// Writes the whole results table in one go (temp file + rename).
pub fn write_results(records: &[ResultRecord], path: impl AsRef<Path>) -> Result<(), RecordError> {
    let path = path.as_ref();
    let tmp = path.with_extension("csv.part");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        if records.is_empty() {
            writer.write_record(HEADER)?;
        }
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_results(path: impl AsRef<Path>) -> Result<Vec<ResultRecord>, RecordError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<ResultRecord>, csv::Error>>()?;
    Ok(rows)
}
