// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCD (Point Cloud Data) v0.7 reader.
//!
//! Supports `ascii` and `binary` data with `x`, `y`, `z` fields and an
//! optional packed `rgb`/`rgba` field, stored either as a float (bit pattern)
//! or as an unsigned integer. `WIDTH` and `HEIGHT` are kept, so organized
//! clouds stay organized. `binary_compressed` is not supported.

use crate::{
    cloud::{PointCloud, PointXyzRgb},
    error::Error,
};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};
use tracing::debug;

/// Color assigned to points of files without an `rgb` field.
pub const DEFAULT_COLOR: [u8; 3] = [255, 255, 255];

/// Upper bound on storage reserved from header counts before any data is read.
const MAX_PREALLOCATED: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq)]
enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Clone, Debug)]
struct Field {
    name: String,
    size: usize,
    kind: char,
    count: usize,
}

#[derive(Debug)]
struct Header {
    fields: Vec<Field>,
    width: usize,
    height: usize,
    points: usize,
    data: DataFormat,
}

/// Position of a field inside one point record: byte offset for binary data
/// and token index for ascii data.
#[derive(Clone, Copy, Debug)]
struct Slot {
    offset: usize,
    token: usize,
    size: usize,
    kind: char,
    count: usize,
}

#[derive(Debug)]
struct Layout {
    x: Slot,
    y: Slot,
    z: Slot,
    rgb: Option<Slot>,
    stride: usize,
    tokens: usize,
}

/// Read a PCD file from disk.
pub fn read_pcd<P: AsRef<Path>>(path: P) -> Result<PointCloud<PointXyzRgb>, Error> {
    let file = File::open(path.as_ref())?;
    debug!("reading {}", path.as_ref().display());
    parse_pcd(BufReader::new(file))
}

/// Parse PCD data from a reader.
pub fn parse_pcd<R: BufRead>(mut reader: R) -> Result<PointCloud<PointXyzRgb>, Error> {
    let header = read_header(&mut reader)?;
    let layout = Layout::new(&header)?;

    let points = match header.data {
        DataFormat::Ascii => read_ascii(&mut reader, &header, &layout)?,
        DataFormat::Binary => read_binary(&mut reader, &header, &layout)?,
    };
    debug!(
        "parsed {} points ({}x{}, {:?})",
        points.len(),
        header.width,
        header.height,
        header.data
    );

    if header.height > 1 {
        PointCloud::organized(points, header.width, header.height)
    } else {
        Ok(PointCloud::new(points))
    }
}

fn pcd_error(msg: impl Into<String>) -> Error {
    Error::Pcd(msg.into())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, Error> {
    value
        .parse()
        .map_err(|_| pcd_error(format!("invalid {} value '{}'", key, value)))
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<Header, Error> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut kinds: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width = None;
    let mut height = 1;
    let mut points = None;
    let mut line = String::new();

    let data = loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(pcd_error("missing DATA line"));
        }
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        if key.starts_with('#') {
            continue;
        }
        let values: Vec<&str> = tokens.collect();

        match key.to_ascii_uppercase().as_str() {
            "VERSION" | "VIEWPOINT" => {}
            "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => {
                sizes = values
                    .iter()
                    .map(|v| parse_usize("SIZE", v))
                    .collect::<Result<_, _>>()?
            }
            "TYPE" => {
                kinds = values
                    .iter()
                    .map(|v| match v.chars().next() {
                        Some(c @ ('F' | 'U' | 'I')) if v.len() == 1 => Ok(c),
                        _ => Err(pcd_error(format!("invalid TYPE '{}'", v))),
                    })
                    .collect::<Result<_, _>>()?
            }
            "COUNT" => {
                counts = values
                    .iter()
                    .map(|v| parse_usize("COUNT", v))
                    .collect::<Result<_, _>>()?
            }
            "WIDTH" => width = Some(parse_usize("WIDTH", values.first().unwrap_or(&""))?),
            "HEIGHT" => height = parse_usize("HEIGHT", values.first().unwrap_or(&""))?,
            "POINTS" => points = Some(parse_usize("POINTS", values.first().unwrap_or(&""))?),
            "DATA" => match values.first().copied() {
                Some("ascii") => break DataFormat::Ascii,
                Some("binary") => break DataFormat::Binary,
                Some(other) => {
                    return Err(pcd_error(format!("unsupported DATA format '{}'", other)));
                }
                None => return Err(pcd_error("DATA line without format")),
            },
            other => return Err(pcd_error(format!("unknown header entry '{}'", other))),
        }
    };

    if counts.is_empty() {
        counts = vec![1; names.len()];
    }
    if sizes.len() != names.len() || kinds.len() != names.len() || counts.len() != names.len() {
        return Err(pcd_error(format!(
            "header lists {} fields but {} sizes, {} types and {} counts",
            names.len(),
            sizes.len(),
            kinds.len(),
            counts.len()
        )));
    }

    let width = width.ok_or_else(|| pcd_error("missing WIDTH"))?;
    let cells = width
        .checked_mul(height)
        .ok_or_else(|| pcd_error(format!("WIDTH {} x HEIGHT {} overflows", width, height)))?;
    let points = points.unwrap_or(cells);
    if points != cells {
        return Err(pcd_error(format!(
            "POINTS {} does not match {}x{}",
            points, width, height
        )));
    }

    let fields = names
        .into_iter()
        .zip(sizes)
        .zip(kinds)
        .zip(counts)
        .map(|(((name, size), kind), count)| Field {
            name,
            size,
            kind,
            count,
        })
        .collect();

    Ok(Header {
        fields,
        width,
        height,
        points,
        data,
    })
}

impl Layout {
    fn new(header: &Header) -> Result<Self, Error> {
        let mut offset = 0;
        let mut token = 0;
        let mut slots = Vec::with_capacity(header.fields.len());
        for field in &header.fields {
            slots.push((
                field.name.as_str(),
                Slot {
                    offset,
                    token,
                    size: field.size,
                    kind: field.kind,
                    count: field.count,
                },
            ));
            offset = field
                .size
                .checked_mul(field.count)
                .and_then(|bytes| offset.checked_add(bytes))
                .ok_or_else(|| pcd_error(format!("field '{}' is too large", field.name)))?;
            token = token
                .checked_add(field.count)
                .ok_or_else(|| pcd_error(format!("field '{}' is too large", field.name)))?;
        }
        let stride = offset;

        // Every field we read must hold at least one value inside the record.
        let find = |name: &str| -> Result<Option<Slot>, Error> {
            match slots.iter().find(|(n, _)| *n == name) {
                Some((_, slot)) if slot.count == 0 => {
                    Err(pcd_error(format!("field '{}' has COUNT 0", name)))
                }
                Some((_, slot)) if slot.offset + slot.size > stride => Err(pcd_error(format!(
                    "field '{}' ends past the {} byte record",
                    name, stride
                ))),
                Some((_, slot)) => Ok(Some(*slot)),
                None => Ok(None),
            }
        };
        let position = |name: &str| -> Result<Slot, Error> {
            let slot = find(name)?.ok_or_else(|| pcd_error(format!("missing field '{}'", name)))?;
            match (slot.kind, slot.size) {
                ('F', 4) | ('F', 8) => Ok(slot),
                _ => Err(pcd_error(format!(
                    "field '{}' must be a float, found {}{}",
                    name, slot.kind, slot.size
                ))),
            }
        };

        let color = match find("rgb")? {
            Some(slot) => Some(slot),
            None => find("rgba")?,
        };
        let rgb = match color {
            Some(slot) if slot.size == 4 => Some(slot),
            Some(slot) => {
                return Err(pcd_error(format!(
                    "packed color must be 4 bytes, found {}",
                    slot.size
                )));
            }
            None => None,
        };

        Ok(Layout {
            x: position("x")?,
            y: position("y")?,
            z: position("z")?,
            rgb,
            stride,
            tokens: token,
        })
    }
}

#[inline]
fn unpack_rgb(packed: u32) -> [u8; 3] {
    [
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
    ]
}

fn read_ascii<R: BufRead>(
    reader: &mut R,
    header: &Header,
    layout: &Layout,
) -> Result<Vec<PointXyzRgb>, Error> {
    let mut points = Vec::with_capacity(header.points.min(MAX_PREALLOCATED));
    let mut line = String::new();

    while points.len() < header.points {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(pcd_error(format!(
                "expected {} points, found {}",
                header.points,
                points.len()
            )));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < layout.tokens {
            return Err(pcd_error(format!(
                "point {} has {} values, expected {}",
                points.len(),
                tokens.len(),
                layout.tokens
            )));
        }

        let coord = |slot: &Slot| -> Result<f32, Error> {
            tokens[slot.token]
                .parse::<f32>()
                .map_err(|_| pcd_error(format!("invalid coordinate '{}'", tokens[slot.token])))
        };
        let rgb = match &layout.rgb {
            Some(slot) => {
                let token = tokens[slot.token];
                let packed = match slot.kind {
                    'F' => token.parse::<f32>().map(f32::to_bits).ok(),
                    'I' => token.parse::<i32>().map(|v| v as u32).ok(),
                    _ => token.parse::<u32>().ok(),
                };
                unpack_rgb(packed.ok_or_else(|| pcd_error(format!("invalid color '{}'", token)))?)
            }
            None => DEFAULT_COLOR,
        };

        points.push(PointXyzRgb::new(
            coord(&layout.x)?,
            coord(&layout.y)?,
            coord(&layout.z)?,
            rgb,
        ));
    }

    Ok(points)
}

fn read_binary<R: BufRead>(
    reader: &mut R,
    header: &Header,
    layout: &Layout,
) -> Result<Vec<PointXyzRgb>, Error> {
    let len = header
        .points
        .checked_mul(layout.stride)
        .ok_or_else(|| pcd_error(format!("{} points overflow the data size", header.points)))?;
    let mut body = Vec::with_capacity(len.min(MAX_PREALLOCATED));
    reader.by_ref().take(len as u64).read_to_end(&mut body)?;
    if body.len() < len {
        return Err(pcd_error(format!(
            "binary data shorter than {} points: {} of {} bytes",
            header.points,
            body.len(),
            len
        )));
    }

    let coord = |record: &[u8], slot: &Slot| -> f32 {
        let bytes = &record[slot.offset..slot.offset + slot.size];
        match bytes.try_into() {
            Ok(four) => f32::from_le_bytes(four),
            Err(_) => {
                let mut eight = [0u8; 8];
                eight.copy_from_slice(bytes);
                f64::from_le_bytes(eight) as f32
            }
        }
    };

    Ok(body
        .chunks_exact(layout.stride)
        .map(|record| {
            let rgb = match &layout.rgb {
                Some(slot) => {
                    let mut packed = [0u8; 4];
                    packed.copy_from_slice(&record[slot.offset..slot.offset + 4]);
                    unpack_rgb(u32::from_le_bytes(packed))
                }
                None => DEFAULT_COLOR,
            };
            PointXyzRgb::new(
                coord(record, &layout.x),
                coord(record, &layout.y),
                coord(record, &layout.z),
                rgb,
            )
        })
        .collect())
}
