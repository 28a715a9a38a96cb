use std::io::BufRead;
use std::path::Path;

use crate::archive::with_export_stream;
use crate::errors::ParserError;
use crate::reader::{Token, Tokens};
use crate::schema;

/// Scans forward for the first non-empty `<transmisja_id>` without building
/// any product records. The element may appear anywhere in the document.
pub fn peek_transmission_id<R: BufRead>(inner: R) -> Result<Option<String>, ParserError> {
    let mut tokens = Tokens::new(inner);
    loop {
        match tokens.next()? {
            Token::Start(name) if name == schema::TRANSMISSION_ID => {
                let value = tokens.read_text(schema::TRANSMISSION_ID)?;
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(Some(value.to_string()));
                }
            }
            Token::Eof => return Ok(None),
            _ => {}
        }
    }
}

pub fn read_transmission_id(path: &Path) -> Result<Option<String>, ParserError> {
    with_export_stream(path, |stream| peek_transmission_id(stream))
}
