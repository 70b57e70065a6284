// SDPL - a statistical data-processing language interpreter.
// Copyright (C) 2026 The SDPL Project
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Tabular Dataset Format (C15): the default on-disk codec a saved dataset
//! round-trips through. Little-endian, length-prefixed, atomic-write.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::Path;

use binrw::{BinReaderExt, BinWriterExt};
use thiserror::Error as ThisError;

use crate::identifier::Identifier;
use crate::pdv::{Dataset, Row, VarType};
use crate::value::Value;

const MAGIC: &[u8; 4] = b"SDTF";
const VERSION: u16 = 1;
const TAG_NUMERIC: u8 = 0;
const TAG_STRING: u8 = 1;

#[derive(Debug, ThisError)]
pub enum TdfError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a TDF file (bad magic)")]
    BadMagic,
    #[error("unsupported TDF version {0}")]
    UnsupportedVersion(u16),
    #[error("corrupt TDF: {0}")]
    Corrupt(String),
}

/// The external dataset-storage interface: a format that can load and save a
/// [Dataset] given a library member path.
pub trait DatasetCodec {
    fn load(path: &Path) -> Result<Dataset, TdfError>;
    fn save(dataset: &Dataset, path: &Path) -> Result<(), TdfError>;
}

pub struct BinTdf;

impl DatasetCodec for BinTdf {
    fn save(dataset: &Dataset, path: &Path) -> Result<(), TdfError> {
        let mut buf = Vec::new();
        {
            let mut cursor = Cursor::new(&mut buf);
            cursor.write_all(MAGIC)?;
            cursor.write_le(&VERSION)?;
            cursor.write_le(&(dataset.columns.len() as u16))?;
            for (name, var_type, len) in &dataset.columns {
                let name_bytes = name.as_str().as_bytes();
                cursor.write_le(&(name_bytes.len() as u16))?;
                cursor.write_all(name_bytes)?;
                match var_type {
                    VarType::Numeric => cursor.write_le(&TAG_NUMERIC)?,
                    VarType::Character => {
                        cursor.write_le(&TAG_STRING)?;
                        cursor.write_le(&(*len as u16))?;
                    }
                }
            }
            cursor.write_le(&(dataset.rows.len() as u64))?;
            for row in &dataset.rows {
                for (name, var_type, len) in &dataset.columns {
                    let value = row.get(name).cloned().unwrap_or(match var_type {
                        VarType::Numeric => Value::missing(),
                        VarType::Character => Value::blank(*len),
                    });
                    write_cell(&mut cursor, &value)?;
                }
            }
        }

        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, &buf)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Dataset, TdfError> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(TdfError::BadMagic);
        }
        let version: u16 = file.read_le()?;
        if version != VERSION {
            return Err(TdfError::UnsupportedVersion(version));
        }
        let column_count: u16 = file.read_le()?;
        let mut columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let name_len: u16 = file.read_le()?;
            let mut name_bytes = vec![0u8; name_len as usize];
            file.read_exact(&mut name_bytes)?;
            let name = String::from_utf8(name_bytes)
                .map_err(|e| TdfError::Corrupt(e.to_string()))?;
            let tag: u8 = file.read_le()?;
            let (var_type, len) = match tag {
                TAG_NUMERIC => (VarType::Numeric, 0),
                TAG_STRING => {
                    let len: u16 = file.read_le()?;
                    (VarType::Character, len as usize)
                }
                other => return Err(TdfError::Corrupt(format!("unknown type tag {other}"))),
            };
            columns.push((Identifier::new_unchecked(name), var_type, len));
        }

        let row_count: u64 = file.read_le()?;
        let mut rows = Vec::with_capacity(row_count as usize);
        for _ in 0..row_count {
            let mut cells = Vec::with_capacity(columns.len());
            for (name, var_type, _) in &columns {
                let value = read_cell(&mut file, *var_type)?;
                cells.push((name.clone(), value));
            }
            rows.push(Row::new(cells));
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Dataset { name, columns, rows })
    }
}

fn write_cell<W: Write + Seek>(w: &mut W, value: &Value) -> Result<(), TdfError> {
    match value {
        Value::Number(n) => {
            w.write_le(&n.unwrap_or(f64::NAN))?;
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            w.write_le(&(bytes.len() as u32))?;
            w.write_all(bytes)?;
        }
    }
    Ok(())
}

fn read_cell<R: Read>(r: &mut R, var_type: VarType) -> Result<Value, TdfError> {
    match var_type {
        VarType::Numeric => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            let n = f64::from_le_bytes(buf);
            Ok(Value::Number(if n.is_nan() { None } else { Some(n) }))
        }
        VarType::Character => {
            let mut len_buf = [0u8; 4];
            r.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes)?;
            let s = String::from_utf8(bytes).map_err(|e| TdfError::Corrupt(e.to_string()))?;
            Ok(Value::String(s))
        }
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdv::VarType;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn round_trips_numeric_and_string_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tdf");

        let columns = vec![
            (id("x"), VarType::Numeric, 0),
            (id("name"), VarType::Character, 8),
        ];
        let rows = vec![
            Row::new(vec![
                (id("x"), Value::Number(Some(1.5))),
                (id("name"), Value::String("Bob     ".into())),
            ]),
            Row::new(vec![
                (id("x"), Value::Number(None)),
                (id("name"), Value::String("Eve     ".into())),
            ]),
        ];
        let dataset = Dataset {
            name: "a".into(),
            columns,
            rows,
        };

        BinTdf::save(&dataset, &path).unwrap();
        let loaded = BinTdf::load(&path).unwrap();

        assert_eq!(loaded.columns.len(), 2);
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(
            loaded.rows[0].get(&id("x")).unwrap().as_number(),
            Some(Some(1.5))
        );
        assert_eq!(
            loaded.rows[1].get(&id("x")).unwrap().as_number(),
            Some(None)
        );
        assert_eq!(
            loaded.rows[0].get(&id("name")).unwrap().as_str(),
            Some("Bob     ")
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tdf");
        fs::write(&path, b"NOPE1234").unwrap();
        assert!(matches!(BinTdf::load(&path), Err(TdfError::BadMagic)));
    }
}
