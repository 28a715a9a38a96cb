use std::collections::HashMap;
use std::io::BufRead;

use encoding_rs::Encoding;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::encoding::resolve_encoding;
use crate::errors::ParserError;
use crate::fields::{parse_decimal, parse_flag, parse_identity, parse_integer};
use crate::model::{ExportItem, ProductRecord, StockRecord};
use crate::schema::{self, product, stock};

/// Owned, decoded view of a quick-xml event. Element names are lowercased
/// local names; text is decoded with the declared encoding and unescaped.
#[derive(Debug)]
pub(crate) enum Token {
    Decl(Option<String>),
    Start(String),
    Empty(String),
    End(String),
    Text(String),
    Eof,
    Other,
}

pub(crate) struct Tokens<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    encoding: &'static Encoding,
    current: String,
}

impl<R: BufRead> Tokens<R> {
    pub(crate) fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            encoding: encoding_rs::UTF_8,
            current: String::new(),
        }
    }

    pub(crate) fn next(&mut self) -> Result<Token, ParserError> {
        self.buf.clear();
        let encoding = self.encoding;
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(source) => {
                return Err(ParserError::Xml {
                    position: self.reader.buffer_position() as u64,
                    source,
                })
            }
        };

        let token = match event {
            Event::Decl(decl) => {
                let label = match decl.encoding() {
                    Some(Ok(raw)) => Some(String::from_utf8_lossy(&raw).into_owned()),
                    Some(Err(err)) => {
                        return Err(ParserError::Xml {
                            position: self.reader.buffer_position() as u64,
                            source: quick_xml::Error::InvalidAttr(err),
                        })
                    }
                    None => None,
                };
                Token::Decl(label)
            }
            Event::Start(start) => Token::Start(element_name(start.local_name().as_ref())),
            Event::Empty(start) => Token::Empty(element_name(start.local_name().as_ref())),
            Event::End(end) => Token::End(element_name(end.local_name().as_ref())),
            Event::Text(text) => {
                let (decoded, _) = encoding.decode_without_bom_handling(&text);
                let unescaped = quick_xml::escape::unescape(&decoded).map_err(|source| {
                    ParserError::Escape {
                        element: self.current.clone(),
                        source,
                    }
                })?;
                Token::Text(unescaped.into_owned())
            }
            Event::CData(data) => {
                let (decoded, _) = encoding.decode_without_bom_handling(&data);
                Token::Text(decoded.into_owned())
            }
            Event::Eof => Token::Eof,
            _ => Token::Other,
        };

        match &token {
            Token::Decl(Some(label)) => self.encoding = resolve_encoding(label)?,
            Token::Start(name) => self.current.clone_from(name),
            _ => {}
        }

        Ok(token)
    }

    /// Collects the text content of `element` up to its end tag. Nested markup
    /// is skipped; only character data is kept.
    pub(crate) fn read_text(&mut self, element: &str) -> Result<String, ParserError> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.next()? {
                Token::Text(chunk) if depth == 0 => text.push_str(&chunk),
                Token::Start(_) => depth += 1,
                Token::End(name) if depth == 0 && name == element => return Ok(text),
                Token::End(_) => depth = depth.saturating_sub(1),
                Token::Eof => {
                    return Err(ParserError::Truncated {
                        element: element.to_string(),
                    })
                }
                _ => {}
            }
        }
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Forward-only reader over a stock export. Products are decoded one at a
/// time, so memory use is bounded by the largest single `<towar>` element.
pub struct ExportReader<R> {
    tokens: Tokens<R>,
    in_product_list: bool,
    finished: bool,
}

impl<R: BufRead> ExportReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            tokens: Tokens::new(inner),
            in_product_list: false,
            finished: false,
        }
    }

    pub fn next_item(&mut self) -> Result<Option<ExportItem>, ParserError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.tokens.next()? {
                Token::Start(name) if name == schema::TRANSMISSION_ID => {
                    let value = self.tokens.read_text(schema::TRANSMISSION_ID)?;
                    let value = value.trim();
                    if !value.is_empty() {
                        return Ok(Some(ExportItem::TransmissionId(value.to_string())));
                    }
                }
                Token::Start(name) if name == schema::PRODUCT_LIST => self.in_product_list = true,
                Token::End(name) if name == schema::PRODUCT_LIST => self.in_product_list = false,
                Token::Start(name) if self.in_product_list && name == schema::PRODUCT => {
                    let record = self.read_product()?;
                    return Ok(Some(ExportItem::Product(record)));
                }
                Token::Empty(name) if self.in_product_list && name == schema::PRODUCT => {
                    return Err(ParserError::InvalidRecord {
                        element: schema::PRODUCT,
                        field: product::ID,
                        value: String::new(),
                    });
                }
                Token::Eof => {
                    if self.in_product_list {
                        return Err(ParserError::Truncated {
                            element: schema::PRODUCT_LIST.to_string(),
                        });
                    }
                    self.finished = true;
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn read_product(&mut self) -> Result<ProductRecord, ParserError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut stock = Vec::new();

        loop {
            match self.tokens.next()? {
                Token::Start(name) if name == schema::STOCK => stock.push(self.read_stock()?),
                Token::Start(name) if name == schema::STOCK_LIST => {}
                Token::End(name) if name == schema::STOCK_LIST => {}
                Token::Start(name) => {
                    let value = self.tokens.read_text(&name)?;
                    fields.insert(name, value);
                }
                Token::Empty(name) if name == schema::STOCK || name == schema::STOCK_LIST => {}
                Token::Empty(name) => {
                    fields.insert(name, String::new());
                }
                Token::End(name) if name == schema::PRODUCT => break,
                Token::Eof => {
                    return Err(ParserError::Truncated {
                        element: schema::PRODUCT.to_string(),
                    })
                }
                _ => {}
            }
        }

        build_product(fields, stock)
    }

    fn read_stock(&mut self) -> Result<StockRecord, ParserError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        loop {
            match self.tokens.next()? {
                Token::Start(name) => {
                    let value = self.tokens.read_text(&name)?;
                    fields.insert(name, value);
                }
                Token::Empty(name) => {
                    fields.insert(name, String::new());
                }
                Token::End(name) if name == schema::STOCK => break,
                Token::Eof => {
                    return Err(ParserError::Truncated {
                        element: schema::STOCK.to_string(),
                    })
                }
                _ => {}
            }
        }

        let raw_id = fields.remove(stock::WAREHOUSE_ID).unwrap_or_default();
        let warehouse_id = parse_identity(&raw_id).ok_or(ParserError::InvalidRecord {
            element: schema::STOCK,
            field: stock::WAREHOUSE_ID,
            value: raw_id,
        })?;

        Ok(StockRecord {
            warehouse_id,
            quantity: parse_decimal(field(&fields, stock::QUANTITY)),
            reserved: parse_decimal(field(&fields, stock::RESERVED)),
        })
    }
}

impl<R: BufRead> Iterator for ExportReader<R> {
    type Item = Result<ExportItem, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_item() {
            Ok(item) => item.map(Ok),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> &'a str {
    fields.get(name).map(String::as_str).unwrap_or("")
}

fn build_product(
    mut fields: HashMap<String, String>,
    stock: Vec<StockRecord>,
) -> Result<ProductRecord, ParserError> {
    let raw_id = fields.remove(product::ID).unwrap_or_default();
    let product_id = parse_identity(&raw_id).ok_or(ParserError::InvalidRecord {
        element: schema::PRODUCT,
        field: product::ID,
        value: raw_id,
    })?;

    Ok(ProductRecord {
        product_id,
        code: field(&fields, product::CODE).trim().to_string(),
        name: field(&fields, product::NAME).trim().to_string(),
        description: field(&fields, product::DESCRIPTION).to_string(),
        vat_id: parse_integer(field(&fields, product::VAT_ID)),
        category_id: parse_integer(field(&fields, product::CATEGORY_ID)),
        group_id: parse_integer(field(&fields, product::GROUP_ID)),
        unit_id: parse_integer(field(&fields, product::UNIT_ID)),
        price_retail: parse_decimal(field(&fields, product::PRICE_RETAIL)),
        price_wholesale: parse_decimal(field(&fields, product::PRICE_WHOLESALE)),
        price_night: parse_decimal(field(&fields, product::PRICE_NIGHT)),
        price_extra: parse_decimal(field(&fields, product::PRICE_EXTRA)),
        price_retail_before_promo: parse_decimal(field(
            &fields,
            product::PRICE_RETAIL_BEFORE_PROMO,
        )),
        lowest_price_30d: parse_decimal(field(&fields, product::LOWEST_PRICE_30D)),
        marked_for_deletion: parse_flag(field(&fields, product::MARKED_FOR_DELETION)),
        active: parse_flag(field(&fields, product::ACTIVE)),
        last_update: field(&fields, product::LAST_UPDATE).trim().to_string(),
        image_folder: field(&fields, product::IMAGE_FOLDER).to_string(),
        image_file: field(&fields, product::IMAGE_FILE).to_string(),
        stock,
    })
}
