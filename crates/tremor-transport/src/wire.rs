//! Byte layouts of exchanged messages. Everything is little-endian.
//!
//! - length: one `i32`
//! - traces: `nt x 4` `f64`, row-major, columns `z, e, n, t`
//! - raw tensor: `nt x 9` `f64`, row-major
//! - scalars and index lists: `f64` / `u64`

use crate::error::TransportError;
use tremor_kernel::{GREEN_COMPONENTS, GeometryKey, GreenTensor, TimedTraces};

pub const TRACE_COLUMNS: usize = 4;

pub fn encode_len(nt: usize) -> Result<Vec<u8>, TransportError> {
    let value = i32::try_from(nt)
        .map_err(|_| TransportError::Encode(format!("length {nt} exceeds i32::MAX")))?;
    Ok(value.to_le_bytes().to_vec())
}

pub fn decode_len(bytes: &[u8]) -> Result<usize, TransportError> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| TransportError::Decode(format!("length message has {} bytes", bytes.len())))?;
    let value = i32::from_le_bytes(raw);
    usize::try_from(value).map_err(|_| TransportError::Decode(format!("negative length {value}")))
}

pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_f64s(bytes: &[u8]) -> Result<Vec<f64>, TransportError> {
    if bytes.len() % 8 != 0 {
        return Err(TransportError::Decode(format!(
            "f64 payload of {} bytes is not a multiple of 8",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_le_bytes(raw)
        })
        .collect())
}

pub fn encode_f64(value: f64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn decode_f64(bytes: &[u8]) -> Result<f64, TransportError> {
    match decode_f64s(bytes)?.as_slice() {
        [value] => Ok(*value),
        other => Err(TransportError::Decode(format!(
            "expected one f64, got {}",
            other.len()
        ))),
    }
}

pub fn encode_indices(values: &[usize]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|&v| (v as u64).to_le_bytes())
        .collect()
}

pub fn decode_indices(bytes: &[u8]) -> Result<Vec<usize>, TransportError> {
    if bytes.len() % 8 != 0 {
        return Err(TransportError::Decode(format!(
            "index payload of {} bytes is not a multiple of 8",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            usize::try_from(u64::from_le_bytes(raw))
                .map_err(|_| TransportError::Decode("index exceeds usize".to_string()))
        })
        .collect()
}

/// Rejects traces that would not survive accumulation on the receiver.
pub fn encode_traces(traces: &TimedTraces) -> Result<Vec<u8>, TransportError> {
    traces
        .validate()
        .map_err(|e| TransportError::Encode(format!("trace tensor: {e}")))?;
    let nt = traces.len();
    let mut out = Vec::with_capacity(nt * TRACE_COLUMNS * 8);
    for k in 0..nt {
        for v in [traces.z[k], traces.e[k], traces.n[k], traces.t[k]] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(out)
}

pub fn decode_traces(bytes: &[u8], nt: usize) -> Result<TimedTraces, TransportError> {
    let values = decode_f64s(bytes)?;
    if values.len() != nt * TRACE_COLUMNS {
        return Err(TransportError::Decode(format!(
            "trace tensor has {} values, expected {nt} x {TRACE_COLUMNS}",
            values.len()
        )));
    }
    let mut traces = TimedTraces {
        z: Vec::with_capacity(nt),
        e: Vec::with_capacity(nt),
        n: Vec::with_capacity(nt),
        t: Vec::with_capacity(nt),
    };
    for row in values.chunks_exact(TRACE_COLUMNS) {
        traces.z.push(row[0]);
        traces.e.push(row[1]);
        traces.n.push(row[2]);
        traces.t.push(row[3]);
    }
    Ok(traces)
}

pub fn encode_tensor(tensor: &GreenTensor) -> Vec<u8> {
    encode_f64s(tensor.as_slice())
}

pub fn decode_tensor(bytes: &[u8], nt: usize) -> Result<GreenTensor, TransportError> {
    let values = decode_f64s(bytes)?;
    if values.len() != nt * GREEN_COMPONENTS {
        return Err(TransportError::Decode(format!(
            "raw tensor has {} values, expected {nt} x {GREEN_COMPONENTS}",
            values.len()
        )));
    }
    GreenTensor::new(nt, values).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Keys as `dh, z_rec, z_src` triples.
pub fn encode_keys(keys: &[GeometryKey]) -> Vec<u8> {
    let flat: Vec<f64> = keys.iter().flat_map(|k| [k.dh, k.z_rec, k.z_src]).collect();
    encode_f64s(&flat)
}

pub fn decode_keys(bytes: &[u8]) -> Result<Vec<GeometryKey>, TransportError> {
    let values = decode_f64s(bytes)?;
    if values.len() % 3 != 0 {
        return Err(TransportError::Decode(format!(
            "key payload has {} values, not a multiple of 3",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(3)
        .map(|c| GeometryKey::new(c[0], c[1], c[2]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_four_bytes_little_endian() {
        assert_eq!(encode_len(258).expect("encode"), vec![2, 1, 0, 0]);
        assert_eq!(decode_len(&[2, 1, 0, 0]).expect("decode"), 258);
        assert!(encode_len(i32::MAX as usize + 1).is_err());
        assert!(decode_len(&[0xff, 0xff, 0xff, 0xff]).is_err());
        assert!(decode_len(&[1, 0]).is_err());
    }

    #[test]
    fn traces_are_row_major_zent() {
        let traces = TimedTraces {
            z: vec![1.0, 5.0],
            e: vec![2.0, 6.0],
            n: vec![3.0, 7.0],
            t: vec![4.0, 8.0],
        };
        let bytes = encode_traces(&traces).expect("valid traces should encode");
        let flat = decode_f64s(&bytes).expect("decode");
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(decode_traces(&bytes, 2).expect("decode"), traces);
        assert!(decode_traces(&bytes, 3).is_err());
    }

    #[test]
    fn malformed_traces_are_not_encoded() {
        let ragged = TimedTraces {
            z: vec![1.0, 5.0],
            e: vec![2.0],
            n: vec![3.0, 7.0],
            t: vec![4.0, 8.0],
        };
        assert!(matches!(encode_traces(&ragged), Err(TransportError::Encode(_))));
        let empty = TimedTraces {
            z: vec![],
            e: vec![],
            n: vec![],
            t: vec![],
        };
        assert!(matches!(encode_traces(&empty), Err(TransportError::Encode(_))));
    }

    #[test]
    fn ragged_payloads_are_rejected() {
        assert!(decode_f64s(&[0; 12]).is_err());
        assert!(decode_indices(&[0; 7]).is_err());
        assert!(decode_keys(&encode_f64s(&[1.0, 2.0])).is_err());
        assert!(decode_f64(&encode_f64s(&[1.0, 2.0])).is_err());
    }
}
