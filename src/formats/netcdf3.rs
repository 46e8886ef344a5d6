//! Classic netCDF (CDF-1 / CDF-2) decode strategy.
//!
//! Parses the self-describing big-endian header (dimensions, attributes,
//! variables with absolute data offsets) and either materializes every
//! variable eagerly or plans per-variable deferred slabs that fetch
//! through a fresh scoped open later. Fixed-size and record variables
//! are both supported; the record dimension's length comes from the
//! file's record count.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use crate::dataset::{ArrayValues, AttrValue, DataType, Dataset, DeferredSlab, Variable, VariableData};
use crate::error::GridfetchError;
use crate::formats::{DeferredFetch, FormatReader};
use crate::location::Location;
use crate::opener::OpenFile;

const MAGIC: &[u8; 3] = b"CDF";
const TAG_DIMENSION: u32 = 0x0A;
const TAG_VARIABLE: u32 = 0x0B;
const TAG_ATTRIBUTE: u32 = 0x0C;
const STREAMING_NUMRECS: u32 = 0xFFFF_FFFF;

const NC_BYTE: u32 = 1;
const NC_CHAR: u32 = 2;
const NC_SHORT: u32 = 3;
const NC_INT: u32 = 4;
const NC_FLOAT: u32 = 5;
const NC_DOUBLE: u32 = 6;

pub(crate) struct Netcdf3Reader;

impl FormatReader for Netcdf3Reader {
    fn read_dataset(&self, source: &OpenFile, load: bool) -> Result<Dataset, GridfetchError> {
        if load {
            read_eager(source)
        } else {
            read_lazy(source)
        }
    }
}

/// Parsed file header: dimensions, attributes, and variable layout.
struct Header {
    numrecs: usize,
    dimensions: Vec<Dim>,
    attributes: BTreeMap<String, AttrValue>,
    variables: Vec<VarPlan>,
    /// Bytes between consecutive records in the record section.
    record_stride: u64,
}

struct Dim {
    name: String,
    /// Zero marks the record dimension.
    len: usize,
}

/// Layout of one variable, with its absolute data offset.
struct VarPlan {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    dtype: DataType,
    attributes: BTreeMap<String, AttrValue>,
    begin: u64,
    is_record: bool,
    /// Elements per record for record variables; total elements otherwise.
    count_per_record: usize,
}

impl VarPlan {
    fn total_count(&self, numrecs: usize) -> usize {
        if self.is_record {
            self.count_per_record * numrecs
        } else {
            self.count_per_record
        }
    }
}

fn read_eager(source: &OpenFile) -> Result<Dataset, GridfetchError> {
    let location = source.location().clone();
    let bytes = source.read_all()?;
    let header = parse_header(&mut Cursor::new(&bytes), &location)?;

    let mut variables = BTreeMap::new();
    for plan in &header.variables {
        let esize = plan.dtype.size_bytes();
        let raw = if plan.is_record {
            let per_record = plan.count_per_record * esize;
            let mut raw = Vec::new();
            for record in 0..header.numrecs as u64 {
                let start = plan.begin + record * header.record_stride;
                raw.extend_from_slice(slice_data(&bytes, start, per_record, &location, &plan.name)?);
            }
            raw
        } else {
            slice_data(
                &bytes,
                plan.begin,
                plan.count_per_record * esize,
                &location,
                &plan.name,
            )?
            .to_vec()
        };

        variables.insert(
            plan.name.clone(),
            build_variable(plan, &header, VariableData::InMemory(decode_values(plan.dtype, &raw))),
        );
    }

    Ok(assemble_dataset(&header, variables))
}

fn read_lazy(source: &OpenFile) -> Result<Dataset, GridfetchError> {
    let location = source.location().clone();
    let header = {
        // Scoped acquisition: the stream is released once the header is
        // parsed; each deferred fetch reopens independently.
        let mut reader = source.open()?;
        parse_header(&mut reader, &location)?
    };

    let mut variables = BTreeMap::new();
    for plan in &header.variables {
        let fetch = if plan.is_record {
            DeferredFetch::Netcdf3Record {
                offset: plan.begin,
                dtype: plan.dtype,
                count_per_record: plan.count_per_record,
                numrecs: header.numrecs,
                stride: header.record_stride,
            }
        } else {
            DeferredFetch::Netcdf3Fixed {
                offset: plan.begin,
                dtype: plan.dtype,
                count: plan.count_per_record,
            }
        };

        variables.insert(
            plan.name.clone(),
            build_variable(
                plan,
                &header,
                VariableData::Deferred(DeferredSlab {
                    source: source.clone(),
                    fetch,
                }),
            ),
        );
    }

    Ok(assemble_dataset(&header, variables))
}

/// Fetch one deferred variable slab through a fresh scoped open.
pub(crate) fn fetch_slab(
    source: &OpenFile,
    fetch: &DeferredFetch,
) -> Result<ArrayValues, GridfetchError> {
    let location = source.location();
    let mut reader = source.open()?;

    match fetch {
        DeferredFetch::Netcdf3Fixed { offset, dtype, count } => {
            skip(&mut reader, *offset).map_err(|e| io_err(location, e))?;
            let raw =
                read_bytes(&mut reader, count * dtype.size_bytes()).map_err(|e| io_err(location, e))?;
            Ok(decode_values(*dtype, &raw))
        }
        DeferredFetch::Netcdf3Record {
            offset,
            dtype,
            count_per_record,
            numrecs,
            stride,
        } => {
            skip(&mut reader, *offset).map_err(|e| io_err(location, e))?;
            let per_record = count_per_record * dtype.size_bytes();
            let gap = stride.checked_sub(per_record as u64).ok_or_else(|| {
                parse_err(
                    location,
                    format!("record stride {stride} is smaller than the {per_record}-byte record payload"),
                )
            })?;
            let mut raw = Vec::new();
            for record in 0..*numrecs {
                raw.extend_from_slice(
                    &read_bytes(&mut reader, per_record).map_err(|e| io_err(location, e))?,
                );
                if record + 1 < *numrecs {
                    skip(&mut reader, gap).map_err(|e| io_err(location, e))?;
                }
            }
            Ok(decode_values(*dtype, &raw))
        }
        DeferredFetch::JsonGridVariable { .. } => Err(parse_err(
            location,
            "json-grid fetch recipe routed to the netcdf decoder",
        )),
    }
}

fn build_variable(plan: &VarPlan, header: &Header, data: VariableData) -> Variable {
    let shape = plan
        .shape
        .iter()
        .enumerate()
        .map(|(i, len)| {
            if plan.is_record && i == 0 {
                header.numrecs
            } else {
                *len
            }
        })
        .collect();

    Variable {
        dims: plan.dims.clone(),
        shape,
        dtype: plan.dtype,
        attributes: plan.attributes.clone(),
        data,
    }
}

fn assemble_dataset(header: &Header, variables: BTreeMap<String, Variable>) -> Dataset {
    let dimensions = header
        .dimensions
        .iter()
        .map(|dim| {
            let len = if dim.len == 0 { header.numrecs } else { dim.len };
            (dim.name.clone(), len)
        })
        .collect();

    Dataset {
        dimensions,
        attributes: header.attributes.clone(),
        variables,
    }
}

fn parse_header(reader: &mut impl Read, location: &Location) -> Result<Header, GridfetchError> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| io_err(location, e))?;
    if &magic[..3] != MAGIC {
        return Err(parse_err(location, "not a classic netCDF file (bad magic)"));
    }
    let version = magic[3];
    if version != 1 && version != 2 {
        return Err(parse_err(
            location,
            format!("unsupported netCDF version byte {version}"),
        ));
    }

    let numrecs_raw = read_u32(reader).map_err(|e| io_err(location, e))?;
    if numrecs_raw == STREAMING_NUMRECS {
        return Err(parse_err(location, "streaming record count is not supported"));
    }
    let numrecs = numrecs_raw as usize;

    let dimensions = parse_dimensions(reader, location)?;
    let attributes = parse_attributes(reader, location)?;
    let (variables, record_stride) = parse_variables(reader, location, version, &dimensions)?;

    Ok(Header {
        numrecs,
        dimensions,
        attributes,
        variables,
        record_stride,
    })
}

fn parse_dimensions(
    reader: &mut impl Read,
    location: &Location,
) -> Result<Vec<Dim>, GridfetchError> {
    let count = read_list_header(reader, TAG_DIMENSION, location, "dimension")?;
    let mut dimensions = Vec::with_capacity(count);
    let mut record_seen = false;
    for _ in 0..count {
        let name = read_name(reader, location)?;
        let len = read_u32(reader).map_err(|e| io_err(location, e))? as usize;
        if len == 0 {
            if record_seen {
                return Err(parse_err(location, "multiple record dimensions"));
            }
            record_seen = true;
        }
        dimensions.push(Dim { name, len });
    }
    Ok(dimensions)
}

fn parse_attributes(
    reader: &mut impl Read,
    location: &Location,
) -> Result<BTreeMap<String, AttrValue>, GridfetchError> {
    let count = read_list_header(reader, TAG_ATTRIBUTE, location, "attribute")?;
    let mut attributes = BTreeMap::new();
    for _ in 0..count {
        let name = read_name(reader, location)?;
        let nc_type = read_u32(reader).map_err(|e| io_err(location, e))?;
        let nelems = read_u32(reader).map_err(|e| io_err(location, e))? as usize;

        let value = if nc_type == NC_CHAR {
            let raw = read_bytes(reader, nelems).map_err(|e| io_err(location, e))?;
            skip_padding(reader, nelems).map_err(|e| io_err(location, e))?;
            AttrValue::Text(String::from_utf8_lossy(&raw).into_owned())
        } else {
            let dtype = dtype_for(nc_type, location)?;
            let total = nelems.checked_mul(dtype.size_bytes()).ok_or_else(|| {
                parse_err(location, format!("attribute '{name}' byte size overflows"))
            })?;
            let raw = read_bytes(reader, total).map_err(|e| io_err(location, e))?;
            skip_padding(reader, total).map_err(|e| io_err(location, e))?;
            AttrValue::Numbers(decode_values(dtype, &raw).to_f64_vec())
        };
        attributes.insert(name, value);
    }
    Ok(attributes)
}

fn parse_variables(
    reader: &mut impl Read,
    location: &Location,
    version: u8,
    dimensions: &[Dim],
) -> Result<(Vec<VarPlan>, u64), GridfetchError> {
    let count = read_list_header(reader, TAG_VARIABLE, location, "variable")?;
    let mut variables = Vec::with_capacity(count.min(1024));
    // (name, vsize, per-record payload) of each record variable.
    let mut record_layouts: Vec<(String, u64, u64)> = Vec::new();

    for _ in 0..count {
        let name = read_name(reader, location)?;
        let ndims = read_u32(reader).map_err(|e| io_err(location, e))? as usize;

        let mut dims = Vec::with_capacity(ndims);
        let mut shape = Vec::with_capacity(ndims);
        let mut is_record = false;
        for position in 0..ndims {
            let dimid = read_u32(reader).map_err(|e| io_err(location, e))? as usize;
            let dim = dimensions.get(dimid).ok_or_else(|| {
                parse_err(
                    location,
                    format!("variable '{name}' references unknown dimension id {dimid}"),
                )
            })?;
            if dim.len == 0 {
                if position != 0 {
                    return Err(parse_err(
                        location,
                        format!("variable '{name}' uses the record dimension beyond position 0"),
                    ));
                }
                is_record = true;
            }
            dims.push(dim.name.clone());
            shape.push(dim.len);
        }

        let attributes = parse_attributes(reader, location)?;
        let nc_type = read_u32(reader).map_err(|e| io_err(location, e))?;
        let dtype = dtype_for(nc_type, location)?;
        let vsize = u64::from(read_u32(reader).map_err(|e| io_err(location, e))?);
        let begin = if version == 1 {
            u64::from(read_u32(reader).map_err(|e| io_err(location, e))?)
        } else {
            read_u64(reader).map_err(|e| io_err(location, e))?
        };

        let mut count_per_record: usize = 1;
        for (position, len) in shape.iter().enumerate() {
            if is_record && position == 0 {
                continue;
            }
            count_per_record = count_per_record.checked_mul(*len).ok_or_else(|| {
                parse_err(
                    location,
                    format!("variable '{name}' shape product overflows"),
                )
            })?;
        }
        let payload = count_per_record
            .checked_mul(dtype.size_bytes())
            .ok_or_else(|| {
                parse_err(location, format!("variable '{name}' byte size overflows"))
            })? as u64;

        if is_record {
            record_layouts.push((name.clone(), vsize, payload));
        }

        variables.push(VarPlan {
            name,
            dims,
            shape,
            dtype,
            attributes,
            begin,
            is_record,
            count_per_record,
        });
    }

    // A lone record variable packs its records without padding, so the
    // stride is its raw payload even though vsize is rounded up to four
    // bytes. With several record variables, records are slabs of the
    // padded vsizes in declaration order.
    let record_stride = match record_layouts.as_slice() {
        [] => 0,
        [(_, _, payload)] => *payload,
        many => {
            for (name, vsize, payload) in many {
                if vsize < payload {
                    return Err(parse_err(
                        location,
                        format!(
                            "record variable '{name}' declares vsize {vsize} smaller than its {payload}-byte record payload"
                        ),
                    ));
                }
            }
            many.iter().map(|(_, vsize, _)| *vsize).sum()
        }
    };

    Ok((variables, record_stride))
}

fn read_list_header(
    reader: &mut impl Read,
    expected_tag: u32,
    location: &Location,
    what: &str,
) -> Result<usize, GridfetchError> {
    let tag = read_u32(reader).map_err(|e| io_err(location, e))?;
    let nelems = read_u32(reader).map_err(|e| io_err(location, e))? as usize;
    if tag == 0 && nelems == 0 {
        return Ok(0);
    }
    if tag != expected_tag {
        return Err(parse_err(
            location,
            format!("bad {what} list tag 0x{tag:02x}"),
        ));
    }
    Ok(nelems)
}

fn read_name(reader: &mut impl Read, location: &Location) -> Result<String, GridfetchError> {
    let len = read_u32(reader).map_err(|e| io_err(location, e))? as usize;
    let raw = read_bytes(reader, len).map_err(|e| io_err(location, e))?;
    skip_padding(reader, len).map_err(|e| io_err(location, e))?;
    String::from_utf8(raw).map_err(|_| parse_err(location, "name is not valid UTF-8"))
}

fn dtype_for(nc_type: u32, location: &Location) -> Result<DataType, GridfetchError> {
    match nc_type {
        NC_BYTE => Ok(DataType::I8),
        NC_CHAR => Ok(DataType::U8),
        NC_SHORT => Ok(DataType::I16),
        NC_INT => Ok(DataType::I32),
        NC_FLOAT => Ok(DataType::F32),
        NC_DOUBLE => Ok(DataType::F64),
        other => Err(parse_err(location, format!("unknown nc_type {other}"))),
    }
}

fn decode_values(dtype: DataType, bytes: &[u8]) -> ArrayValues {
    match dtype {
        DataType::I8 => ArrayValues::I8(bytes.iter().map(|b| *b as i8).collect()),
        DataType::U8 => ArrayValues::U8(bytes.to_vec()),
        DataType::I16 => ArrayValues::I16(
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_be_bytes([c[0], c[1]]))
                .collect(),
        ),
        DataType::I32 => ArrayValues::I32(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::F32 => ArrayValues::F32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        DataType::F64 => ArrayValues::F64(
            bytes
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
        ),
    }
}

fn slice_data<'a>(
    bytes: &'a [u8],
    start: u64,
    len: usize,
    location: &Location,
    var: &str,
) -> Result<&'a [u8], GridfetchError> {
    let start = usize::try_from(start)
        .map_err(|_| parse_err(location, format!("offset overflow for variable '{var}'")))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| parse_err(location, format!("offset overflow for variable '{var}'")))?;
    bytes.get(start..end).ok_or_else(|| {
        parse_err(
            location,
            format!("data for variable '{var}' extends past end of file"),
        )
    })
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

// Sized by untrusted header fields, so grow while reading instead of
// allocating the declared length up front.
fn read_bytes(reader: &mut impl Read, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "unexpected end of stream while reading",
        ));
    }
    Ok(buf)
}

/// Header fields are padded to four-byte boundaries.
fn skip_padding(reader: &mut impl Read, consumed: usize) -> std::io::Result<()> {
    skip(reader, ((4 - consumed % 4) % 4) as u64)
}

fn skip(reader: &mut impl Read, n: u64) -> std::io::Result<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(n), &mut std::io::sink())?;
    if copied < n {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "unexpected end of stream while skipping",
        ));
    }
    Ok(())
}

fn parse_err(location: &Location, message: impl Into<String>) -> GridfetchError {
    GridfetchError::FormatParse {
        location: location.to_string(),
        format: "netcdf".to_string(),
        message: message.into(),
    }
}

fn io_err(location: &Location, source: std::io::Error) -> GridfetchError {
    GridfetchError::SourceUnavailable {
        location: location.to_string(),
        message: format!("read failed: {source}"),
    }
}
