use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;

use crate::core::{FiscalError, format_amount};

fn xml_io(e: std::io::Error) -> FiscalError {
    FiscalError::Xml(format!("XML write error: {e}"))
}

/// Compact XML writer.
///
/// No indentation is emitted: whitespace text nodes would become part of
/// the signed content, and a compact document canonicalizes identically no
/// matter where it is later embedded.
pub(crate) struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    pub fn with_declaration() -> Result<Self, FiscalError> {
        let mut w = Self::new();
        w.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(w)
    }

    pub fn into_string(self) -> Result<String, FiscalError> {
        let buf = self.writer.into_inner();
        String::from_utf8(buf).map_err(|e| FiscalError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, FiscalError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FiscalError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, FiscalError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, FiscalError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write an amount with exactly two fraction digits.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, FiscalError> {
        self.text_element(name, &format_amount(amount))
    }

    pub fn bool_element(&mut self, name: &str, value: bool) -> Result<&mut Self, FiscalError> {
        self.text_element(name, if value { "true" } else { "false" })
    }

    /// Append pre-serialized markup verbatim.
    pub fn raw(&mut self, markup: &str) -> Result<&mut Self, FiscalError> {
        self.writer.get_mut().extend_from_slice(markup.as_bytes());
        Ok(self)
    }
}
