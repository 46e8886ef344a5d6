//! In-memory dataset model: named variables with a binary
//! materialization state.
//!
//! This is the structure every format reader decodes into. A variable's
//! data is either fully [`InMemory`](VariableData::InMemory) or a
//! [`Deferred`](VariableData::Deferred) slab that fetches on demand
//! through a fresh scoped open of its handle, never anything in
//! between, so the laziness a caller requests is exactly the laziness
//! they get.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GridfetchError;
use crate::formats;
use crate::opener::OpenFile;

/// Element type of a variable's array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    I8,
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 => 2,
            DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

/// Decoded array values for one variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArrayValues {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ArrayValues {
    pub fn len(&self) -> usize {
        match self {
            ArrayValues::I8(v) => v.len(),
            ArrayValues::U8(v) => v.len(),
            ArrayValues::I16(v) => v.len(),
            ArrayValues::I32(v) => v.len(),
            ArrayValues::F32(v) => v.len(),
            ArrayValues::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DataType {
        match self {
            ArrayValues::I8(_) => DataType::I8,
            ArrayValues::U8(_) => DataType::U8,
            ArrayValues::I16(_) => DataType::I16,
            ArrayValues::I32(_) => DataType::I32,
            ArrayValues::F32(_) => DataType::F32,
            ArrayValues::F64(_) => DataType::F64,
        }
    }

    /// Lossy view of the values as `f64`, for comparisons and summaries.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            ArrayValues::I8(v) => v.iter().map(|x| f64::from(*x)).collect(),
            ArrayValues::U8(v) => v.iter().map(|x| f64::from(*x)).collect(),
            ArrayValues::I16(v) => v.iter().map(|x| f64::from(*x)).collect(),
            ArrayValues::I32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            ArrayValues::F32(v) => v.iter().map(|x| f64::from(*x)).collect(),
            ArrayValues::F64(v) => v.clone(),
        }
    }
}

/// An attribute value attached to a dataset or variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

/// A lazily-referenced slab of variable data: the handle to reopen plus
/// a format-specific fetch recipe. Fetching acquires a fresh scoped
/// stream each time; the slab itself holds no live connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeferredSlab {
    pub(crate) source: OpenFile,
    pub(crate) fetch: formats::DeferredFetch,
}

impl DeferredSlab {
    fn materialize(&self) -> Result<ArrayValues, GridfetchError> {
        formats::fetch_deferred(&self.source, &self.fetch)
    }
}

/// Binary materialization state of a variable's data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum VariableData {
    InMemory(ArrayValues),
    Deferred(DeferredSlab),
}

/// One named variable of a dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variable {
    /// Dimension names, outermost first.
    pub dims: Vec<String>,

    /// Lengths matching `dims`.
    pub shape: Vec<usize>,

    pub dtype: DataType,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,

    pub data: VariableData,
}

impl Variable {
    /// Whether the values are resident in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.data, VariableData::InMemory(_))
    }

    /// Total element count implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// The variable's values, fetching from the source if deferred.
    ///
    /// Does not change the materialization state; use [`Variable::load`]
    /// to materialize in place.
    pub fn values(&self) -> Result<ArrayValues, GridfetchError> {
        match &self.data {
            VariableData::InMemory(values) => Ok(values.clone()),
            VariableData::Deferred(slab) => slab.materialize(),
        }
    }

    /// Materialize the values in place and return a reference to them.
    pub fn load(&mut self) -> Result<&ArrayValues, GridfetchError> {
        if let VariableData::Deferred(slab) = &self.data {
            self.data = VariableData::InMemory(slab.materialize()?);
        }
        match &self.data {
            VariableData::InMemory(values) => Ok(values),
            VariableData::Deferred(_) => unreachable!("materialized above"),
        }
    }
}

/// A structured, named-variable container loaded from a handle or
/// location through a format-specific decode step.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Named dimension lengths shared across variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, usize>,

    /// Global attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttrValue>,

    /// Variables by name.
    pub variables: BTreeMap<String, Variable>,
}

impl Dataset {
    /// Materialize every variable in place.
    pub fn load_all(&mut self) -> Result<(), GridfetchError> {
        for variable in self.variables.values_mut() {
            variable.load()?;
        }
        Ok(())
    }

    /// Check that every variable's materialization state matches
    /// `in_memory`, naming the offenders otherwise.
    ///
    /// Assertion-style: meant for test harnesses checking the loader's
    /// postcondition, not for production recovery.
    pub fn check_materialization(&self, in_memory: bool) -> Result<(), GridfetchError> {
        let offenders: Vec<String> = self
            .variables
            .iter()
            .filter(|(_, variable)| variable.is_in_memory() != in_memory)
            .map(|(name, _)| name.clone())
            .collect();

        if offenders.is_empty() {
            Ok(())
        } else {
            Err(GridfetchError::MaterializationMismatch {
                expected_in_memory: in_memory,
                variables: offenders,
            })
        }
    }
}
