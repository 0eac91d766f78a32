//! Custom protocol extensions spoken by the libsyntax backend
//!
//! All methods live under the `m/` prefix and ride on an ordinary language
//! server connection.

use lsp_types::notification::Notification;
use lsp_types::request::Request;
use lsp_types::{Position, Range, TextDocumentIdentifier, Uri};
use serde::{Deserialize, Serialize};

/// Dump of the backend's parse tree for a document
pub enum SyntaxTree {}

impl Request for SyntaxTree {
    type Params = SyntaxTreeParams;
    type Result = String;
    const METHOD: &'static str = "m/syntaxTree";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxTreeParams {
    pub text_document: TextDocumentIdentifier,
}

/// Grow each selection to the next enclosing syntactic unit
pub enum ExtendSelection {}

impl Request for ExtendSelection {
    type Params = ExtendSelectionParams;
    type Result = ExtendSelectionResult;
    const METHOD: &'static str = "m/extendSelection";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSelectionParams {
    pub text_document: TextDocumentIdentifier,
    pub selections: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSelectionResult {
    pub selections: Vec<Range>,
}

/// Position of the delimiter matching the one at each offset
pub enum FindMatchingBrace {}

impl Request for FindMatchingBrace {
    type Params = FindMatchingBraceParams;
    type Result = Vec<Position>;
    const METHOD: &'static str = "m/findMatchingBrace";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatchingBraceParams {
    pub text_document: TextDocumentIdentifier,
    pub offsets: Vec<Position>,
}

/// Server push: full set of syntax decorations for a document
pub enum PublishDecorations {}

impl Notification for PublishDecorations {
    type Params = PublishDecorationsParams;
    const METHOD: &'static str = "m/publishDecorations";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishDecorationsParams {
    pub uri: Uri,
    pub decorations: Vec<Decoration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoration {
    pub range: Range,
    /// Kept as a free string so unknown tags survive deserialization
    pub tag: String,
}

/// Server request: place the cursor at a position
pub enum MoveCursor {}

impl Request for MoveCursor {
    type Params = Position;
    type Result = ();
    const METHOD: &'static str = "m/moveCursor";
}
