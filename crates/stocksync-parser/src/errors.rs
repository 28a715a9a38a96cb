use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML syntax error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("invalid escape sequence in <{element}>: {source}")]
    Escape {
        element: String,
        #[source]
        source: quick_xml::escape::EscapeError,
    },

    #[error("unsupported document encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive does not contain an XML entry")]
    MissingXmlEntry,

    #[error("<{element}> has invalid {field} '{value}'")]
    InvalidRecord {
        element: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("document ended inside <{element}>")]
    Truncated { element: String },
}
