//! JSON grid decode strategy: a JSON document of named arrays.
//!
//! Layout:
//!
//! ```json
//! {
//!   "attributes": { "title": "example" },
//!   "dimensions": { "x": 3 },
//!   "variables": {
//!     "temp": { "dims": ["x"], "shape": [3], "data": [1.0, 2.0, 3.0] }
//!   }
//! }
//! ```
//!
//! Values decode as `f64`. Lazy mode parses the document for structure
//! but defers every variable's data; each deferred fetch re-opens the
//! handle and re-parses for just that variable.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dataset::{ArrayValues, AttrValue, DataType, Dataset, DeferredSlab, Variable, VariableData};
use crate::error::GridfetchError;
use crate::formats::{DeferredFetch, FormatReader};
use crate::location::Location;
use crate::opener::OpenFile;

pub(crate) struct JsonGridReader;

impl FormatReader for JsonGridReader {
    fn read_dataset(&self, source: &OpenFile, load: bool) -> Result<Dataset, GridfetchError> {
        let doc = parse_document(source)?;
        let location = source.location();

        let mut variables = BTreeMap::new();
        for (name, var) in &doc.variables {
            let shape = effective_shape(name, var, location)?;
            let data = if load {
                VariableData::InMemory(ArrayValues::F64(var.data.clone()))
            } else {
                VariableData::Deferred(DeferredSlab {
                    source: source.clone(),
                    fetch: DeferredFetch::JsonGridVariable { name: name.clone() },
                })
            };
            variables.insert(
                name.clone(),
                Variable {
                    dims: var.dims.clone(),
                    shape,
                    dtype: DataType::F64,
                    attributes: var.attributes.clone(),
                    data,
                },
            );
        }

        Ok(Dataset {
            dimensions: doc.dimensions,
            attributes: doc.attributes,
            variables,
        })
    }
}

/// Fetch one named variable by re-parsing the document.
pub(crate) fn fetch_variable(
    source: &OpenFile,
    name: &str,
) -> Result<ArrayValues, GridfetchError> {
    let doc = parse_document(source)?;
    let var = doc.variables.get(name).ok_or_else(|| {
        parse_err(
            source.location(),
            format!("variable '{name}' disappeared from the source document"),
        )
    })?;
    Ok(ArrayValues::F64(var.data.clone()))
}

#[derive(Debug, Deserialize)]
struct JsonGridDoc {
    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,

    #[serde(default)]
    dimensions: BTreeMap<String, usize>,

    variables: BTreeMap<String, JsonGridVar>,
}

#[derive(Debug, Deserialize)]
struct JsonGridVar {
    #[serde(default)]
    dims: Vec<String>,

    #[serde(default)]
    shape: Option<Vec<usize>>,

    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,

    data: Vec<f64>,
}

fn parse_document(source: &OpenFile) -> Result<JsonGridDoc, GridfetchError> {
    let bytes = source.read_all()?;
    serde_json::from_slice(&bytes).map_err(|e| parse_err(source.location(), e.to_string()))
}

fn effective_shape(
    name: &str,
    var: &JsonGridVar,
    location: &Location,
) -> Result<Vec<usize>, GridfetchError> {
    let shape = var
        .shape
        .clone()
        .unwrap_or_else(|| vec![var.data.len()]);
    let expected: usize = shape.iter().product();
    if expected != var.data.len() {
        return Err(parse_err(
            location,
            format!(
                "variable '{}' has {} values but shape {:?} implies {}",
                name,
                var.data.len(),
                shape,
                expected
            ),
        ));
    }
    Ok(shape)
}

fn parse_err(location: &Location, message: impl Into<String>) -> GridfetchError {
    GridfetchError::FormatParse {
        location: location.to_string(),
        format: "json-grid".to_string(),
        message: message.into(),
    }
}
