//! Dense numeric arrays persisted in NumPy `.npy` format.
//!
//! Only what the pipeline writes is supported: little-endian `f64`, C order,
//! one- or two-dimensional.

use crate::error::PipelineError;
use crate::persistence;
use std::path::Path;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_ALIGN: usize = 64;

/// Row-major `f64` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl NumericArray {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, PipelineError> {
        if rows * cols != data.len() {
            return Err(PipelineError::dataset(format!(
                "array shape ({rows}, {cols}) does not match {} values",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PipelineError> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(PipelineError::dataset(format!(
                    "row {idx} has {} values, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    /// Split into feature rows and the last column (the label).
    pub fn split_last_column(&self) -> Result<(Vec<Vec<f64>>, Vec<f64>), PipelineError> {
        if self.cols < 2 {
            return Err(PipelineError::dataset(format!(
                "need at least one feature column and a label column, got {} columns",
                self.cols
            )));
        }
        let mut features = Vec::with_capacity(self.rows);
        let mut labels = Vec::with_capacity(self.rows);
        for i in 0..self.rows {
            let row = self.row(i);
            features.push(row[..self.cols - 1].to_vec());
            labels.push(row[self.cols - 1]);
        }
        Ok((features, labels))
    }

    pub fn to_npy_bytes(&self) -> Vec<u8> {
        let dict = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
            self.rows, self.cols
        );
        // magic + version + u16 length + dict + padding + '\n'
        let unpadded = NPY_MAGIC.len() + 2 + 2 + dict.len() + 1;
        let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
        let header_len = dict.len() + padding + 1;

        let mut out = Vec::with_capacity(unpadded + padding + self.data.len() * 8);
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(dict.as_bytes());
        out.extend(std::iter::repeat_n(b' ', padding));
        out.push(b'\n');
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn from_npy_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return Err(PipelineError::dataset("not an .npy file"));
        }
        let (header_len, header_start) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 if bytes.len() >= 12 => (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            ),
            v => {
                return Err(PipelineError::dataset(format!(
                    "unsupported .npy version {v}"
                )));
            }
        };
        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return Err(PipelineError::dataset("truncated .npy header"));
        }
        let header = std::str::from_utf8(&bytes[header_start..data_start])
            .map_err(|_| PipelineError::dataset(".npy header is not text"))?;

        if !header.contains("'descr': '<f8'") {
            return Err(PipelineError::dataset(format!(
                "only little-endian f64 arrays are supported, header: {}",
                header.trim()
            )));
        }
        if !header.contains("'fortran_order': False") {
            return Err(PipelineError::dataset("Fortran-ordered arrays are not supported"));
        }
        let (rows, cols) = parse_shape(header)?;

        let payload = &bytes[data_start..];
        if payload.len() != rows * cols * 8 {
            return Err(PipelineError::dataset(format!(
                ".npy payload holds {} bytes, shape ({rows}, {cols}) needs {}",
                payload.len(),
                rows * cols * 8
            )));
        }
        let data = payload
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect();
        Self::new(rows, cols, data)
    }

    pub fn write_npy(&self, path: &Path) -> Result<(), PipelineError> {
        persistence::atomic_write(path, &self.to_npy_bytes())
    }

    pub fn read_npy(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::missing_resource(format!(
                "array not found: {}",
                path.display()
            )));
        }
        Self::from_npy_bytes(&std::fs::read(path)?)
    }
}

fn parse_shape(header: &str) -> Result<(usize, usize), PipelineError> {
    let start = header
        .find("'shape': (")
        .ok_or_else(|| PipelineError::dataset(".npy header has no shape"))?
        + "'shape': (".len();
    let end = header[start..]
        .find(')')
        .ok_or_else(|| PipelineError::dataset("unterminated .npy shape"))?
        + start;
    let dims = header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| PipelineError::dataset(format!("bad .npy dimension '{s}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match dims.as_slice() {
        [n] => Ok((*n, 1)),
        [r, c] => Ok((*r, *c)),
        _ => Err(PipelineError::dataset(format!(
            "only 1-D and 2-D arrays are supported, got shape {dims:?}"
        ))),
    }
}
