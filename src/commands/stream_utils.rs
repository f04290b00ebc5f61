//! Projection between [`ReadResult`] and the canonical XREAD reply shape:
//! `[[key, [[id, [field, value, ...]], ...]], ...]`.
//!
//! The in-memory endpoint encodes through here and the remote endpoint
//! decodes through here, so both sides of the comparison normalize to the
//! same structure.

use crate::resp::RespValue;
use crate::store::{EntryId, Fields, ReadResult, StreamEntry};

/// Encodes a read result as a RESP reply. An empty result becomes a null
/// array, matching what stream servers reply when nothing qualified.
pub fn read_result_to_resp(result: &ReadResult) -> RespValue {
    if result.is_empty() {
        return RespValue::NullArray;
    }

    let streams = result
        .iter()
        .map(|(key, entries)| {
            RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                entries_to_resp(entries),
            ])
        })
        .collect::<Vec<RespValue>>();

    RespValue::Array(streams)
}

fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    let encoded = entries
        .iter()
        .map(|entry| {
            let mut field_values = Vec::with_capacity(entry.fields.len() * 2);

            for (field, value) in &entry.fields {
                field_values.push(RespValue::BulkString(field.clone()));
                field_values.push(RespValue::BulkString(value.clone()));
            }

            RespValue::Array(vec![
                RespValue::BulkString(entry.id.to_string()),
                RespValue::Array(field_values),
            ])
        })
        .collect::<Vec<RespValue>>();

    RespValue::Array(encoded)
}

/// Decodes an XREAD reply into a [`ReadResult`].
///
/// Null replies and empty arrays both decode to an empty result. Any other
/// shape deviation (wrong arity, non-bulk-string tokens, malformed IDs, odd
/// field/value counts) is an error; callers treat it as a hard failure.
pub fn read_result_from_resp(value: &RespValue) -> Result<ReadResult, String> {
    let streams = match value {
        RespValue::NullArray | RespValue::NullBulkString => return Ok(Vec::new()),
        RespValue::Array(elements) => elements,
        other => return Err(format!("XREAD reply is not an array: {:?}", other)),
    };

    let mut result = Vec::with_capacity(streams.len());

    for stream in streams {
        let RespValue::Array(pair) = stream else {
            return Err(format!("stream element is not an array: {:?}", stream));
        };

        if pair.len() != 2 {
            return Err(format!(
                "stream element has {} parts instead of 2",
                pair.len()
            ));
        }

        let RespValue::BulkString(key) = &pair[0] else {
            return Err(format!("stream name is not a bulk string: {:?}", pair[0]));
        };

        let RespValue::Array(raw_entries) = &pair[1] else {
            return Err(format!("stream entries are not an array: {:?}", pair[1]));
        };

        let mut entries = Vec::with_capacity(raw_entries.len());

        for raw_entry in raw_entries {
            entries.push(entry_from_resp(raw_entry)?);
        }

        result.push((key.clone(), entries));
    }

    Ok(result)
}

fn entry_from_resp(value: &RespValue) -> Result<StreamEntry, String> {
    let RespValue::Array(pair) = value else {
        return Err(format!("entry is not an array: {:?}", value));
    };

    if pair.len() != 2 {
        return Err(format!("entry has {} parts instead of 2", pair.len()));
    }

    let RespValue::BulkString(raw_id) = &pair[0] else {
        return Err(format!("entry ID is not a bulk string: {:?}", pair[0]));
    };

    let id = EntryId::parse(raw_id).map_err(|e| format!("entry ID '{}': {}", raw_id, e))?;

    let RespValue::Array(tokens) = &pair[1] else {
        return Err(format!("entry fields are not an array: {:?}", pair[1]));
    };

    if tokens.len() % 2 != 0 {
        return Err(format!("entry has {} field/value tokens", tokens.len()));
    }

    let mut fields = Fields::new();

    for pair in tokens.chunks(2) {
        let (RespValue::BulkString(field), RespValue::BulkString(value)) = (&pair[0], &pair[1])
        else {
            return Err(format!("field/value tokens are not bulk strings: {:?}", pair));
        };

        fields.insert(field.clone(), value.clone());
    }

    Ok(StreamEntry { id, fields })
}
