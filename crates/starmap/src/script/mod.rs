/*!
The Rosetta script dialect used by StarMap templates.

Scripts are a narrow subset of XML: self-closing or paired tags with `name=value` attributes,
    and no text content, comments or namespaces.

|                                | from source code                    | to source code          | edit
|--------------------------------|-------------------------------------|-------------------------|-----
| document ([`Document`])        | [`Document::from_source_code`]      | [`Document::display`]   | [`edit`]
| tokens ([`lexer::Token`])      | [`lexer::Lexer::new`]               | N/A                     | N/A

*/

mod display;
pub mod edit;
mod error;
pub mod lexer;
mod parser;
mod tree;

pub use error::*;
pub use tree::*;

/// Parse, edit and serialize a script in one go.
///
/// The edit closure receives the parsed document and a fresh [`edit::EditContext`].
pub fn transform<F, E>(source: &str, f: F) -> Result<String, E>
where
    F: FnOnce(&mut Document, &mut edit::EditContext) -> Result<(), E>,
    E: From<ParseError>,
{
    let mut document = Document::from_source_code(source)?;
    let mut ctx = edit::EditContext::default();
    f(&mut document, &mut ctx)?;
    let rendered = document.display().to_string();
    Ok(rendered)
}
