//! LSIF graph model
//!
//! Typed vertices and edges of the LSIF dump, serialized one JSON object
//! per line with camelCase keys:
//!
//! `{"id":1,"type":"vertex","label":"metaData","version":"0.4.3",...}`
//!
//! Identifiers are assigned by the emitter at write time, never by this
//! module.

use serde::Serialize;

/// LSIF protocol version declared on the `metaData` vertex.
pub const PROTOCOL_VERSION: &str = "0.4.3";

/// Position encoding declared on the `metaData` vertex.
pub const POSITION_ENCODING: &str = "utf-16";

/// Language tag used for project, document and hover snippet vertices.
pub const LANGUAGE_ID: &str = "py";

/// Identifier of a vertex or edge record.
pub type Id = u64;

/// A zero-indexed source position (end columns are exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Tool metadata carried by the `metaData` vertex.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "lsif-py".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One entry of a hover tooltip: a fenced code snippet or raw text.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HoverContent {
    Snippet { language: String, value: String },
    Raw(String),
}

impl HoverContent {
    /// A Python code snippet entry.
    pub fn snippet(value: impl Into<String>) -> Self {
        Self::Snippet {
            language: LANGUAGE_ID.to_string(),
            value: value.into(),
        }
    }
}

/// The `result` payload of a `hoverResult` vertex.
#[derive(Debug, Clone, Serialize)]
pub struct HoverContents {
    pub contents: Vec<HoverContent>,
}

/// LSIF vertex payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "label", rename_all = "camelCase")]
pub enum Vertex {
    #[serde(rename_all = "camelCase")]
    MetaData {
        version: String,
        position_encoding: String,
        project_root: String,
        tool_info: ToolInfo,
    },
    Project {
        kind: String,
    },
    #[serde(rename_all = "camelCase")]
    Document {
        language_id: String,
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        contents: Option<String>,
    },
    Range {
        start: Position,
        end: Position,
    },
    ResultSet,
    DefinitionResult,
    ReferenceResult,
    HoverResult {
        result: HoverContents,
    },
    Moniker {
        kind: MonikerKind,
        scheme: String,
        identifier: String,
    },
}

/// Moniker kinds: whether the symbol is provided or consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonikerKind {
    Export,
    Import,
}

/// The `property` discriminator on `item` edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemProperty {
    Definitions,
    References,
}

/// LSIF edge payloads.
///
/// `contains` edges batch all children under a single record; the emitter
/// never writes one with an empty `inVs` list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "label")]
pub enum Edge {
    #[serde(rename = "contains", rename_all = "camelCase")]
    Contains { out_v: Id, in_vs: Vec<Id> },
    #[serde(rename = "item", rename_all = "camelCase")]
    Item {
        out_v: Id,
        in_vs: Vec<Id>,
        document: Id,
        #[serde(skip_serializing_if = "Option::is_none")]
        property: Option<ItemProperty>,
    },
    #[serde(rename = "next", rename_all = "camelCase")]
    Next { out_v: Id, in_v: Id },
    #[serde(rename = "moniker", rename_all = "camelCase")]
    Moniker { out_v: Id, in_v: Id },
    #[serde(rename = "textDocument/definition", rename_all = "camelCase")]
    Definition { out_v: Id, in_v: Id },
    #[serde(rename = "textDocument/references", rename_all = "camelCase")]
    References { out_v: Id, in_v: Id },
    #[serde(rename = "textDocument/hover", rename_all = "camelCase")]
    Hover { out_v: Id, in_v: Id },
}

/// Discriminator between vertex and edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Vertex,
    Edge,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Vertex(Vertex),
    Edge(Edge),
}

/// A single line of the dump: identifier, record type and payload.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: Id,
    #[serde(rename = "type")]
    pub ty: RecordType,
    #[serde(flatten)]
    pub payload: Payload,
}
