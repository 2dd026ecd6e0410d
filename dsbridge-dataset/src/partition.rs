//! Partition values encoded in Hive-style directory names.

use arrow::datatypes::Schema;
use dsbridge_result::{Error, Result};
use dsbridge_types::PartitionValue;
use url::form_urlencoded;

/// Read `key=value` directory segments of `path` into a value tuple aligned
/// with `partition_schema`.
///
/// Keys compare exactly. Values are percent-decoded and typed per field; the
/// Hive default partition marker and empty values read as null. When a key
/// repeats, the segment nearest the file wins.
pub fn partition_values_from_path(
    path: &str,
    partition_schema: &Schema,
) -> Result<Vec<PartitionValue>> {
    let segments: Vec<(&str, &str)> = path
        .split('/')
        .filter_map(|segment| segment.split_once('='))
        .collect();

    partition_schema
        .fields()
        .iter()
        .map(|field| {
            let raw = segments
                .iter()
                .rev()
                .find(|(key, _)| *key == field.name())
                .map(|(_, value)| *value)
                .ok_or_else(|| {
                    Error::InvalidArgumentError(format!(
                        "path \"{path}\" has no segment for partition field \"{}\"",
                        field.name()
                    ))
                })?;
            let decoded = percent_decode(raw);
            PartitionValue::parse(&decoded, field.data_type()).map_err(|err| {
                Error::InvalidArgumentError(format!(
                    "partition field \"{}\" in \"{path}\": {err}",
                    field.name()
                ))
            })
        })
        .collect()
}

fn percent_decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    // `+` is literal in paths; protect it from form decoding.
    let escaped = raw.replace('+', "%2B");
    form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}
