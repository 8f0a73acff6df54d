//! Streaming NF-e emitter parser.

use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::trace;

use crate::error::DocumentError;
use crate::models::ExtractionRecord;

use super::rules::Regime;
use super::{EmitterExtractor, Result, NFE_NAMESPACE};

/// Emitter child fields read from an NF-e.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    TaxId,
    LegalName,
    RegimeCode,
}

impl Field {
    fn tag(&self) -> &'static str {
        match self {
            Field::TaxId => "CNPJ",
            Field::LegalName => "xNome",
            Field::RegimeCode => "CRT",
        }
    }

    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"CNPJ" => Some(Field::TaxId),
            b"xNome" => Some(Field::LegalName),
            b"CRT" => Some(Field::RegimeCode),
            _ => None,
        }
    }
}

/// Open element kinds tracked while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Emit,
    Field(Field),
    Other,
}

#[derive(Debug, Default)]
struct EmitterFields {
    tax_id: Option<String>,
    legal_name: Option<String>,
    regime_code: Option<String>,
}

impl EmitterFields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::TaxId => &mut self.tax_id,
            Field::LegalName => &mut self.legal_name,
            Field::RegimeCode => &mut self.regime_code,
        }
    }

    /// First occurrence in document order wins.
    fn offer(&mut self, field: Field, value: String) {
        let slot = self.slot(field);
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn into_record(self) -> Result<ExtractionRecord> {
        let tax_id = self.tax_id.ok_or(DocumentError::MissingField(Field::TaxId.tag()))?;
        let legal_name = self
            .legal_name
            .ok_or(DocumentError::MissingField(Field::LegalName.tag()))?;
        let regime_code = self
            .regime_code
            .ok_or(DocumentError::MissingField(Field::RegimeCode.tag()))?;

        Ok(ExtractionRecord::new(
            tax_id,
            legal_name,
            Regime::from_code(Some(&regime_code)),
        ))
    }
}

/// Extracts `emit/CNPJ`, `emit/xNome` and `emit/CRT` from NF-e documents.
///
/// Only elements bound to the NF-e namespace are considered, at any depth
/// below the root. Field values are taken verbatim.
pub struct NfeEmitterParser {
    /// Documents above this size are rejected without parsing.
    max_bytes: u64,
}

impl NfeEmitterParser {
    /// Create a parser with no size limit.
    pub fn new() -> Self {
        Self { max_bytes: u64::MAX }
    }

    /// Reject documents larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Parse an in-memory document.
    pub fn parse(&self, data: &[u8]) -> Result<ExtractionRecord> {
        let mut reader = NsReader::from_reader(data);
        let mut buf = Vec::new();

        let mut fields = EmitterFields::default();
        let mut stack: Vec<Node> = Vec::new();
        // (field, depth at which it was opened, accumulated text, child seen)
        let mut current: Option<(Field, usize, String, bool)> = None;
        let mut root_seen = false;

        loop {
            {
                let (ns, event) = reader.read_resolved_event_into(&mut buf)?;

                match event {
                    Event::Start(e) => {
                        check_single_root(root_seen, &stack)?;
                        root_seen = true;

                        stop_at_child(&mut current, stack.len());
                        let node = classify(&ns, e.local_name().as_ref(), stack.last());
                        stack.push(node);
                        if let (Node::Field(field), None) = (node, &current) {
                            current = Some((field, stack.len(), String::new(), false));
                        }
                    }
                    Event::Empty(e) => {
                        check_single_root(root_seen, &stack)?;
                        root_seen = true;

                        stop_at_child(&mut current, stack.len());
                        if let Node::Field(field) = classify(&ns, e.local_name().as_ref(), stack.last()) {
                            fields.offer(field, String::new());
                        }
                    }
                    Event::Text(t) => {
                        let text = t
                            .unescape()
                            .map_err(|e| DocumentError::Parse(e.to_string()))?;
                        if stack.is_empty() {
                            if !text.trim().is_empty() {
                                return Err(DocumentError::Parse(
                                    "text outside the document element".to_string(),
                                ));
                            }
                        } else if let Some((_, depth, value, false)) = current.as_mut() {
                            if *depth == stack.len() {
                                value.push_str(&text);
                            }
                        }
                    }
                    Event::CData(c) => {
                        if let Some((_, depth, value, false)) = current.as_mut() {
                            if *depth == stack.len() {
                                let text = c
                                    .decode()
                                    .map_err(|e| DocumentError::Parse(e.to_string()))?;
                                value.push_str(&text);
                            }
                        }
                    }
                    Event::End(_) => {
                        let depth = stack.len();
                        stack.pop();
                        if matches!(current, Some((_, d, _, _)) if d == depth) {
                            if let Some((field, _, value, _)) = current.take() {
                                fields.offer(field, value);
                            }
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                }
            }

            buf.clear();
        }

        if !root_seen {
            return Err(DocumentError::Parse("no document element".to_string()));
        }
        if !stack.is_empty() {
            return Err(DocumentError::Parse(format!(
                "unexpected end of document, {} element(s) left open",
                stack.len()
            )));
        }

        trace!(
            "Emitter fields: CNPJ={:?} xNome={:?} CRT={:?}",
            fields.tax_id, fields.legal_name, fields.regime_code
        );

        fields.into_record()
    }
}

impl Default for NfeEmitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterExtractor for NfeEmitterParser {
    fn extract(&self, xml: &str) -> Result<ExtractionRecord> {
        self.parse(xml.as_bytes())
    }

    fn extract_file(&self, path: &Path) -> Result<ExtractionRecord> {
        let read_error = |source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        };

        let size = fs::metadata(path).map_err(read_error)?.len();
        if size > self.max_bytes {
            return Err(DocumentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let data = fs::read(path).map_err(read_error)?;
        self.parse(&data)
    }
}

fn classify(ns: &ResolveResult, local_name: &[u8], parent: Option<&Node>) -> Node {
    let in_nfe = matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == NFE_NAMESPACE.as_bytes());
    if !in_nfe {
        return Node::Other;
    }

    // The document element itself is never the emitter.
    if local_name == b"emit" && parent.is_some() {
        return Node::Emit;
    }

    match (parent, Field::from_local_name(local_name)) {
        (Some(Node::Emit), Some(field)) => Node::Field(field),
        _ => Node::Other,
    }
}

/// A field's value is its text up to the first child element.
fn stop_at_child(current: &mut Option<(Field, usize, String, bool)>, depth: usize) {
    if let Some((_, field_depth, _, child_seen)) = current.as_mut() {
        if *field_depth == depth {
            *child_seen = true;
        }
    }
}

fn check_single_root(root_seen: bool, stack: &[Node]) -> Result<()> {
    if root_seen && stack.is_empty() {
        return Err(DocumentError::Parse(
            "junk after document element".to_string(),
        ));
    }
    Ok(())
}
