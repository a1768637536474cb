//! Arrow IPC file encoding of columnar records.

use std::io::Cursor;

use arrow::compute::concat_batches;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use crate::error::{Result, TransformError};
use crate::sink::SeekableByteSink;

/// Serialize `record` as an Arrow IPC file.
pub fn encode_record(record: &RecordBatch) -> Result<Bytes> {
    let mut writer = FileWriter::try_new(SeekableByteSink::new(), record.schema().as_ref())
        .map_err(TransformError::Encode)?;
    writer.write(record).map_err(TransformError::Encode)?;
    writer.finish().map_err(TransformError::Encode)?;
    let sink = writer.into_inner().map_err(TransformError::Encode)?;
    Ok(sink.into_bytes())
}

/// Decode an Arrow IPC file into one record, concatenating its batches.
pub fn read_record(payload: Bytes) -> Result<RecordBatch> {
    let reader = FileReader::try_new(Cursor::new(payload), None)
        .map_err(|err| TransformError::Decode(err.to_string()))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| TransformError::Decode(err.to_string()))?;
    concat_batches(&schema, &batches).map_err(|err| TransformError::Decode(err.to_string()))
}

/// Decode an Arrow IPC file holding exactly `num_rows` rows.
pub fn decode_record(payload: Bytes, num_rows: usize) -> Result<RecordBatch> {
    let record = read_record(payload)?;
    if record.num_rows() != num_rows {
        return Err(TransformError::Decode(format!(
            "expected {num_rows} rows, payload holds {}",
            record.num_rows()
        )));
    }
    Ok(record)
}
