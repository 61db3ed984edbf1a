//! Parsed BSDL tree as consumed by the resolvers
//!
//! The tree is produced by an external BSDL parser and handed over as nested
//! mappings and lists, usually serialized as JSON. Several sections are
//! optional, and some of them show up either as a single record or as a list
//! of records depending on how many entries the source file declared. All of
//! that is normalized here, during deserialization, so the resolvers only
//! ever see ordered lists.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse JSON tree: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to parse TOML tree: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Unsupported tree format: {0}")]
    UnsupportedFormat(String),
}

/// A section that may be given as one value or as a list of values
///
/// Always holds the normalized list form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOrMany<T>(pub Vec<T>);

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape<U> {
            Many(Vec<U>),
            One(U),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Many(items) => Self(items),
            Shape::One(item) => Self(vec![item]),
        })
    }
}

impl<T: Serialize> Serialize for OneOrMany<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Integer literal that the parser may have left as a string ("32")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntLit {
    Int(u64),
    Text(String),
}

impl IntLit {
    /// Numeric value, or `None` if the text is not a non-negative integer
    pub fn to_usize(&self) -> Option<usize> {
        match self {
            IntLit::Int(v) => usize::try_from(*v).ok(),
            IntLit::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Physical pin identifier from the package pin map
///
/// Package pins are numbered ("12") on some packages and ball-named ("A1")
/// on others; both end up as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(pub String);

impl PinId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PinId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PinId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u32> for PinId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for PinId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Self(v.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

impl Serialize for PinId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn trimmed_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(|s| s.trim().to_string()))
}

/// One optional-register record: `<name>_register` mapped to its bit string
pub type RegisterRecord = BTreeMap<String, OneOrMany<String>>;

/// Generic parameters of the entity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenericParameter {
    #[serde(default)]
    pub default_device_package_type: Option<String>,
}

/// Opcode declaration for one instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcodeEntry {
    /// `None` for the anonymous entry
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub instruction_name: Option<String>,
    #[serde(default)]
    pub opcode_list: OneOrMany<String>,
}

/// Instruction register length and opcode list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstructionRegisterDescription {
    #[serde(default)]
    pub instruction_length: Option<IntLit>,
    #[serde(default)]
    pub instruction_opcodes: OneOrMany<OpcodeEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixedBoundaryStmts {
    #[serde(default)]
    pub boundary_length: Option<IntLit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryScanRegisterDescription {
    #[serde(default)]
    pub fixed_boundary_stmts: Option<FixedBoundaryStmts>,
}

/// Register named by a register-access entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRef {
    #[serde(deserialize_with = "trimmed")]
    pub reg_name: String,
    #[serde(default, alias = "reg_len")]
    pub reg_length: Option<IntLit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedInstruction {
    #[serde(deserialize_with = "trimmed")]
    pub instruction_name: String,
}

/// Register together with the instructions that target it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccess {
    pub register: RegisterRef,
    #[serde(default)]
    pub instruction_capture_list: OneOrMany<CapturedInstruction>,
}

/// Physical pins bonded to one port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortPins {
    pub port_name: String,
    #[serde(default)]
    pub pin_list: OneOrMany<PinId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackagePinMapping {
    #[serde(default)]
    pub pin_map: Vec<PortPins>,
}

/// Group of logical ports sharing a signal class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalPortGroup {
    #[serde(default)]
    pub identifier_list: OneOrMany<String>,
    pub pin_type: String,
}

/// Root of a parsed BSDL tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BsdlAst {
    #[serde(default)]
    pub component_name: OneOrMany<String>,
    #[serde(default)]
    pub generic_parameter: Option<GenericParameter>,
    #[serde(default)]
    pub optional_register_description: Option<OneOrMany<RegisterRecord>>,
    #[serde(default)]
    pub instruction_register_description: Option<InstructionRegisterDescription>,
    #[serde(default)]
    pub boundary_scan_register_description: Option<BoundaryScanRegisterDescription>,
    #[serde(default)]
    pub register_access_description: Option<OneOrMany<RegisterAccess>>,
    #[serde(default)]
    pub device_package_pin_mappings: Vec<PackagePinMapping>,
    #[serde(default)]
    pub logical_port_description: Option<OneOrMany<LogicalPortGroup>>,
}

impl BsdlAst {
    /// Parse a tree from a JSON string
    pub fn from_json(json: &str) -> Result<Self, AstError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a tree from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, AstError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a tree from a `.json` or `.toml` file
    pub fn from_file(path: &Path) -> Result<Self, AstError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json(&content),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml(&content),
            other => Err(AstError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Component name with its fragments joined
    pub fn component_name(&self) -> String {
        self.component_name.iter().map(String::as_str).collect()
    }

    pub fn package(&self) -> &str {
        self.generic_parameter
            .as_ref()
            .and_then(|g| g.default_device_package_type.as_deref())
            .unwrap_or("")
    }

    pub fn optional_registers(&self) -> &[RegisterRecord] {
        self.optional_register_description
            .as_ref()
            .map(OneOrMany::as_slice)
            .unwrap_or(&[])
    }

    pub fn register_accesses(&self) -> &[RegisterAccess] {
        self.register_access_description
            .as_ref()
            .map(OneOrMany::as_slice)
            .unwrap_or(&[])
    }

    /// Port-to-pin map of the first package mapping
    pub fn pin_map(&self) -> &[PortPins] {
        self.device_package_pin_mappings
            .first()
            .map(|m| m.pin_map.as_slice())
            .unwrap_or(&[])
    }

    pub fn logical_ports(&self) -> Option<&[LogicalPortGroup]> {
        self.logical_port_description.as_ref().map(OneOrMany::as_slice)
    }
}

/// Concatenate bit-string fragments into one string
pub fn join_bits(fragments: &OneOrMany<String>) -> String {
    fragments.iter().map(String::as_str).collect()
}
