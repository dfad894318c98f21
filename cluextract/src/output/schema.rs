//! Output field schema mirrored from the remote layer.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::service::{FieldInfo, LayerMetadata};

/// ArcGIS type of object-id fields, which are never copied.
const OID_FIELD_TYPE: &str = "esriFieldTypeOID";

/// Name fragment of geodatabase shape area/length system fields.
const SHAPE_SYSTEM_FIELD: &str = "SHAPE_ST";

/// Storage type of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Double,
    Float,
    Long,
    Short,
    Date,
    Guid,
}

impl FieldType {
    /// Maps an ArcGIS field type name.
    ///
    /// Returns `None` for types that have no output counterpart (OID,
    /// geometry, blob, raster, XML).
    pub fn from_esri(esri_type: &str) -> Option<Self> {
        match esri_type {
            "esriFieldTypeString" => Some(FieldType::Text),
            "esriFieldTypeDouble" => Some(FieldType::Double),
            "esriFieldTypeSingle" => Some(FieldType::Float),
            "esriFieldTypeInteger" => Some(FieldType::Long),
            "esriFieldTypeSmallInteger" => Some(FieldType::Short),
            "esriFieldTypeDate" => Some(FieldType::Date),
            "esriFieldTypeGUID" | "esriFieldTypeGlobalID" => Some(FieldType::Guid),
            _ => None,
        }
    }

    /// ArcGIS type name written to Esri JSON output.
    ///
    /// Dates are stored as formatted text in the output, so they are written
    /// as string fields.
    pub fn esri_name(&self) -> &'static str {
        match self {
            FieldType::Text | FieldType::Date => "esriFieldTypeString",
            FieldType::Double => "esriFieldTypeDouble",
            FieldType::Float => "esriFieldTypeSingle",
            FieldType::Long => "esriFieldTypeInteger",
            FieldType::Short => "esriFieldTypeSmallInteger",
            FieldType::Guid => "esriFieldTypeGUID",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "TEXT",
            FieldType::Double => "DOUBLE",
            FieldType::Float => "FLOAT",
            FieldType::Long => "LONG",
            FieldType::Short => "SHORT",
            FieldType::Date => "DATE",
            FieldType::Guid => "GUID",
        };
        f.write_str(name)
    }
}

/// One output field.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    pub field_type: FieldType,
    pub alias: String,
    /// Length for text fields.
    pub length: Option<u32>,
}

/// Esri JSON field description (`{"name", "type", "alias", "length"}`).
#[derive(Debug, Serialize)]
pub(crate) struct EsriFieldJson<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    field_type: &'static str,
    alias: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<u32>,
}

impl OutputField {
    fn from_info(info: &FieldInfo) -> Option<Self> {
        if info.field_type == OID_FIELD_TYPE || info.name.contains(SHAPE_SYSTEM_FIELD) {
            return None;
        }

        let Some(field_type) = FieldType::from_esri(&info.field_type) else {
            warn!(field = %info.name, kind = %info.field_type, "Skipping field with unsupported type");
            return None;
        };

        let length = match field_type {
            FieldType::Text => info.length,
            _ => None,
        };

        Some(Self {
            name: info.name.clone(),
            field_type,
            alias: info.alias.clone().unwrap_or_else(|| info.name.clone()),
            length,
        })
    }

    pub(crate) fn to_esri_json(&self) -> EsriFieldJson<'_> {
        EsriFieldJson {
            name: &self.name,
            field_type: self.field_type.esri_name(),
            alias: &self.alias,
            length: match self.field_type {
                FieldType::Date => Some(DATE_TEXT_LENGTH),
                _ => self.length,
            },
        }
    }
}

/// Text length reserved for formatted dates.
const DATE_TEXT_LENGTH: u32 = 32;

/// Ordered output fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSchema {
    fields: Vec<OutputField>,
}

impl OutputSchema {
    /// Mirrors the fields of a remote layer.
    ///
    /// The object-id field and `SHAPE_ST*` system fields are left out.
    pub fn from_metadata(metadata: &LayerMetadata) -> Self {
        Self {
            fields: metadata.fields.iter().filter_map(OutputField::from_info).collect(),
        }
    }

    /// Creates a schema from explicit fields.
    pub fn new(fields: Vec<OutputField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&OutputField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
