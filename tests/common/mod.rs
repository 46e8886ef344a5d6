#![allow(dead_code)]

pub mod http_server;

use std::io::Write;
use std::path::Path;

/// Fixed-variable values in the sample file: lon(f64[x]).
pub const LON_VALUES: [f64; 3] = [10.0, 20.0, 30.0];

/// Record-variable values in the sample file: temp(f32[time, x]),
/// two records flattened.
pub const TEMP_VALUES: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

fn push_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.resize(buf.len() + (4 - name.len() % 4) % 4, 0);
}

/// Hand-assembled classic netCDF (CDF-1) file:
///
/// - dimensions: `x` = 3, `time` = record (2 records)
/// - global attribute: `title` = "example"
/// - variables: `lon` f64\[x\], `temp` f32\[time, x\]
pub fn netcdf3_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"CDF\x01");
    buf.extend_from_slice(&2u32.to_be_bytes()); // numrecs

    // dimension list: x = 3, time = record
    buf.extend_from_slice(&0x0Au32.to_be_bytes());
    buf.extend_from_slice(&2u32.to_be_bytes());
    push_name(&mut buf, "x");
    buf.extend_from_slice(&3u32.to_be_bytes());
    push_name(&mut buf, "time");
    buf.extend_from_slice(&0u32.to_be_bytes());

    // global attributes: title = "example"
    buf.extend_from_slice(&0x0Cu32.to_be_bytes());
    buf.extend_from_slice(&1u32.to_be_bytes());
    push_name(&mut buf, "title");
    buf.extend_from_slice(&2u32.to_be_bytes()); // NC_CHAR
    buf.extend_from_slice(&7u32.to_be_bytes());
    buf.extend_from_slice(b"example\x00"); // padded to 8

    // variable list
    buf.extend_from_slice(&0x0Bu32.to_be_bytes());
    buf.extend_from_slice(&2u32.to_be_bytes());

    // lon: f64[x]
    push_name(&mut buf, "lon");
    buf.extend_from_slice(&1u32.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // dim x
    buf.extend_from_slice(&[0u8; 8]); // no attributes
    buf.extend_from_slice(&6u32.to_be_bytes()); // NC_DOUBLE
    buf.extend_from_slice(&24u32.to_be_bytes()); // vsize
    let lon_begin_pos = buf.len();
    buf.extend_from_slice(&0u32.to_be_bytes());

    // temp: f32[time, x]
    push_name(&mut buf, "temp");
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.extend_from_slice(&1u32.to_be_bytes()); // dim time (record)
    buf.extend_from_slice(&0u32.to_be_bytes()); // dim x
    buf.extend_from_slice(&[0u8; 8]); // no attributes
    buf.extend_from_slice(&5u32.to_be_bytes()); // NC_FLOAT
    buf.extend_from_slice(&12u32.to_be_bytes()); // vsize per record
    let temp_begin_pos = buf.len();
    buf.extend_from_slice(&0u32.to_be_bytes());

    let header_len = buf.len() as u32;
    let lon_begin = header_len;
    let temp_begin = header_len + 24;
    buf[lon_begin_pos..lon_begin_pos + 4].copy_from_slice(&lon_begin.to_be_bytes());
    buf[temp_begin_pos..temp_begin_pos + 4].copy_from_slice(&temp_begin.to_be_bytes());

    for value in LON_VALUES {
        buf.extend_from_slice(&value.to_be_bytes());
    }
    for value in TEMP_VALUES {
        buf.extend_from_slice(&value.to_be_bytes());
    }
    buf
}

/// Write the sample netCDF file to `path`.
pub fn write_netcdf3(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::File::create(path)
        .expect("create netcdf file")
        .write_all(&netcdf3_bytes())
        .expect("write netcdf file");
}
