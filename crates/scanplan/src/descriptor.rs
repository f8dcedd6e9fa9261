//! Resolved output schema of a scan.
//!
//! Descriptors are produced by the analyzer. Planning code only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a tuple descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleId(pub i32);

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a slot descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub i32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal { precision: u8, scale: i8 },
    Utf8,
    Date,
    Datetime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::Decimal { precision, scale } => write!(f, "Decimal({precision},{scale})"),
            Self::Utf8 => write!(f, "Utf8"),
            Self::Date => write!(f, "Date"),
            Self::Datetime => write!(f, "Datetime"),
        }
    }
}

/// A column in the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Column {
            name: name.into(),
            datatype,
        }
    }
}

/// One output column of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub id: SlotId,
    /// Source column backing this slot.
    pub column: Column,
    /// If the value for this slot must actually be fetched.
    ///
    /// Slots only used transiently during planning are not materialized.
    pub materialized: bool,
}

/// Ordered output schema for a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDescriptor {
    pub id: TupleId,
    pub slots: Vec<SlotDescriptor>,
}

impl TupleDescriptor {
    pub fn new(id: TupleId) -> Self {
        TupleDescriptor {
            id,
            slots: Vec::new(),
        }
    }

    /// Add a slot, assigning it the next slot id within this tuple.
    pub fn with_slot(mut self, column: Column, materialized: bool) -> Self {
        let id = SlotId(self.slots.len() as i32);
        self.slots.push(SlotDescriptor {
            id,
            column,
            materialized,
        });
        self
    }

    pub fn materialized_slots(&self) -> impl Iterator<Item = &SlotDescriptor> {
        self.slots.iter().filter(|slot| slot.materialized)
    }
}
