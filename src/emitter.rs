//! LSIF emitter
//!
//! Writes dump records to the given writer in exactly the order they are
//! submitted, assigning each record a strictly increasing identifier.
//! Callers are responsible for submitting a vertex before any edge that
//! references it; the emitter never re-orders or validates.

use std::io::Write;

use crate::graph::{
    Edge, HoverContents, Id, ItemProperty, MonikerKind, Payload, Position, Record, RecordType,
    ToolInfo, Vertex, LANGUAGE_ID, POSITION_ENCODING, PROTOCOL_VERSION,
};
use crate::Result;

/// Emitter writes LSIF dump data to the given writer, one self-contained
/// JSON record per line. Identifiers start at 1 and are never reused.
pub struct Emitter<W: Write> {
    writer: W,
    next_id: Id,
}

impl<W: Write> Emitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, next_id: 1 }
    }

    /// Number of records written so far.
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }

    fn emit(&mut self, ty: RecordType, payload: Payload) -> Result<Id> {
        let id = self.next_id;
        self.next_id += 1;
        let record = Record { id, ty, payload };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(id)
    }

    pub fn emit_vertex(&mut self, vertex: Vertex) -> Result<Id> {
        self.emit(RecordType::Vertex, Payload::Vertex(vertex))
    }

    pub fn emit_edge(&mut self, edge: Edge) -> Result<Id> {
        self.emit(RecordType::Edge, Payload::Edge(edge))
    }

    // Vertex emits

    pub fn emit_meta_data(&mut self, project_root: &str) -> Result<Id> {
        self.emit_vertex(Vertex::MetaData {
            version: PROTOCOL_VERSION.to_string(),
            position_encoding: POSITION_ENCODING.to_string(),
            project_root: project_root.to_string(),
            tool_info: ToolInfo::default(),
        })
    }

    pub fn emit_project(&mut self) -> Result<Id> {
        self.emit_vertex(Vertex::Project {
            kind: LANGUAGE_ID.to_string(),
        })
    }

    pub fn emit_document(&mut self, uri: &str, contents: Option<String>) -> Result<Id> {
        self.emit_vertex(Vertex::Document {
            language_id: LANGUAGE_ID.to_string(),
            uri: uri.to_string(),
            contents,
        })
    }

    pub fn emit_range(&mut self, start: Position, end: Position) -> Result<Id> {
        self.emit_vertex(Vertex::Range { start, end })
    }

    pub fn emit_result_set(&mut self) -> Result<Id> {
        self.emit_vertex(Vertex::ResultSet)
    }

    pub fn emit_definition_result(&mut self) -> Result<Id> {
        self.emit_vertex(Vertex::DefinitionResult)
    }

    pub fn emit_reference_result(&mut self) -> Result<Id> {
        self.emit_vertex(Vertex::ReferenceResult)
    }

    pub fn emit_hover_result(&mut self, result: HoverContents) -> Result<Id> {
        self.emit_vertex(Vertex::HoverResult { result })
    }

    pub fn emit_moniker(&mut self, kind: MonikerKind, identifier: &str) -> Result<Id> {
        self.emit_vertex(Vertex::Moniker {
            kind,
            scheme: "lsif-py".to_string(),
            identifier: identifier.to_string(),
        })
    }

    // Edge emits

    pub fn emit_contains(&mut self, out_v: Id, in_vs: Vec<Id>) -> Result<Option<Id>> {
        // An empty inVs list is rejected by dump validators.
        if in_vs.is_empty() {
            return Ok(None);
        }
        self.emit_edge(Edge::Contains { out_v, in_vs }).map(Some)
    }

    pub fn emit_item(
        &mut self,
        out_v: Id,
        in_vs: Vec<Id>,
        document: Id,
        property: Option<ItemProperty>,
    ) -> Result<Id> {
        self.emit_edge(Edge::Item {
            out_v,
            in_vs,
            document,
            property,
        })
    }

    pub fn emit_next(&mut self, out_v: Id, in_v: Id) -> Result<Id> {
        self.emit_edge(Edge::Next { out_v, in_v })
    }

    pub fn emit_moniker_edge(&mut self, out_v: Id, in_v: Id) -> Result<Id> {
        self.emit_edge(Edge::Moniker { out_v, in_v })
    }

    pub fn emit_text_document_definition(&mut self, out_v: Id, in_v: Id) -> Result<Id> {
        self.emit_edge(Edge::Definition { out_v, in_v })
    }

    pub fn emit_text_document_references(&mut self, out_v: Id, in_v: Id) -> Result<Id> {
        self.emit_edge(Edge::References { out_v, in_v })
    }

    pub fn emit_text_document_hover(&mut self, out_v: Id, in_v: Id) -> Result<Id> {
        self.emit_edge(Edge::Hover { out_v, in_v })
    }

    /// Flush any buffered output to the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consume the emitter, returning the underlying writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> Emitter<Vec<u8>> {
        Emitter::new(Vec::new())
    }

    fn lines(emitter: Emitter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(emitter.writer)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_ids_are_monotonic_from_one() {
        let mut em = emitter();
        let a = em.emit_result_set().unwrap();
        let b = em.emit_definition_result().unwrap();
        let c = em.emit_next(a, b).unwrap();
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(em.count(), 3);
    }

    #[test]
    fn test_records_are_written_in_submission_order() {
        let mut em = emitter();
        em.emit_meta_data("file:///w").unwrap();
        em.emit_project().unwrap();
        let out = lines(em);
        assert!(out[0].contains(r#""label":"metaData""#));
        assert!(out[1].contains(r#""label":"project""#));
        assert!(out[0].starts_with(r#"{"id":1,"#));
        assert!(out[1].starts_with(r#"{"id":2,"#));
    }

    #[test]
    fn test_empty_contains_is_dropped() {
        let mut em = emitter();
        let project = em.emit_project().unwrap();
        assert_eq!(em.emit_contains(project, vec![]).unwrap(), None);
        assert_eq!(em.count(), 1);
        assert!(em.emit_contains(project, vec![project]).unwrap().is_some());
    }

    #[test]
    fn test_one_json_object_per_line() {
        let mut em = emitter();
        em.emit_project().unwrap();
        em.emit_result_set().unwrap();
        for line in lines(em) {
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert!(value.get("id").is_some());
            assert!(value.get("type").is_some());
            assert!(value.get("label").is_some());
        }
    }
}
