//! Row reader for tag-based source feeds.
//!
//! A feed is a flat list of row elements under some wrapper. Each row is
//! read as its direct children in document order, with the text of each
//! child (including any nested text) cleaned:
//!
//! ```text
//! <CVXInfo>                      Row [
//!   <CVXCode> 208 </CVXCode>  ->   ("CVXCode", "208"),
//!   <Status>Active</Status>        ("Status", "Active"),
//! </CVXInfo>                     ]
//! ```

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::text::clean;

/// Child element holding a field name in name/value feeds.
const NAME_TAG: &str = "Name";
/// Child element holding a field value in name/value feeds.
const VALUE_TAG: &str = "Value";

/// A feed that is not well-formed XML.
#[derive(Debug, thiserror::Error)]
#[error("malformed XML near byte {position}: {source}")]
pub struct RowError {
    /// Byte offset the parser stopped at.
    pub position: u64,
    /// Parser error.
    #[source]
    pub source: quick_xml::Error,
}

/// One row element of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    /// Build a row from `(child name, text)` pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Children in document order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Text of the last child named `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text of the last child named `name`, or `""`.
    pub fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Pair every `Name` child with the `Value` child that follows it.
    ///
    /// A name without a value is dropped; a repeated name keeps its last
    /// value.
    pub fn name_value_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut name: Option<&str> = None;
        let mut value: Option<&str> = None;
        for (tag, text) in &self.fields {
            match tag.as_str() {
                NAME_TAG => {
                    if let (Some(n), Some(v)) = (name, value.take()) {
                        map.insert(n.to_string(), v.to_string());
                    }
                    name = Some(text);
                }
                VALUE_TAG => value = Some(text),
                _ => {}
            }
        }
        if let (Some(n), Some(v)) = (name, value) {
            map.insert(n.to_string(), v.to_string());
        }
        map
    }
}

/// Read every element named `row_tag` from `xml`.
///
/// Fails with the parser error and its byte offset on malformed input.
pub fn read_rows(xml: &str, row_tag: &str) -> Result<Vec<Row>, RowError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();

    let mut current: Option<Row> = None;
    // depth below the row element; 1 while inside a direct child
    let mut depth = 0usize;
    let mut field = String::new();
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|source| RowError {
            position: reader.error_position(),
            source,
        })?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match current {
                    None if name == row_tag => {
                        current = Some(Row::default());
                        depth = 0;
                    }
                    None => {}
                    Some(_) => {
                        depth += 1;
                        if depth == 1 {
                            field = name;
                            text.clear();
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match current.as_mut() {
                    Some(row) if depth == 0 => row.fields.push((name, String::new())),
                    None if name == row_tag => rows.push(Row::default()),
                    _ => {}
                }
            }
            Event::Text(t) if current.is_some() && depth > 0 => {
                let unescaped = t.unescape().map_err(|source| RowError {
                    position: reader.buffer_position(),
                    source,
                })?;
                text.push_str(&unescaped);
            }
            Event::CData(c) if current.is_some() && depth > 0 => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) if current.is_some() => {
                if depth == 0 {
                    rows.extend(current.take());
                } else {
                    if depth == 1 {
                        if let Some(row) = current.as_mut() {
                            row.fields.push((std::mem::take(&mut field), clean(&text)));
                        }
                        text.clear();
                    }
                    depth -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_rows_and_cleans_text() {
        let xml = r#"<?xml version="1.0"?>
<CVXCodes>
  <CVXInfo>
    <ShortDescription>COVID-19,
        mRNA</ShortDescription>
    <CVXCode> 208 </CVXCode>
    <Notes/>
  </CVXInfo>
  <CVXInfo><CVXCode>03</CVXCode><FullVaccinename>M &amp; M</FullVaccinename></CVXInfo>
</CVXCodes>"#;
        let rows = read_rows(xml, "CVXInfo").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("ShortDescription"), "COVID-19, mRNA");
        assert_eq!(rows[0].text("CVXCode"), "208");
        assert_eq!(rows[0].get("Notes"), Some(""));
        assert_eq!(rows[0].get("Missing"), None);
        assert_eq!(rows[1].text("FullVaccinename"), "M & M");
    }

    #[test]
    fn test_nested_text_belongs_to_child() {
        let xml = "<r><row><a>x<b>y</b>z</a><c>1</c></row></r>";
        let rows = read_rows(xml, "row").unwrap();
        assert_eq!(rows[0].fields(), &[("a".to_string(), "xyz".to_string()), ("c".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_name_value_pairs() {
        let xml = r#"<VGCodes><CVXVGInfo>
  <Name>ShortDescription</Name><Value>COVID-19 mRNA</Value>
  <Name>CVXCode</Name><Value>208</Value>
  <Name>Orphan</Name>
  <Name>Vaccine Group Name</Name><Value>COVID-19</Value>
</CVXVGInfo></VGCodes>"#;
        let rows = read_rows(xml, "CVXVGInfo").unwrap();
        let map = rows[0].name_value_map();
        assert_eq!(map.get("ShortDescription").map(String::as_str), Some("COVID-19 mRNA"));
        assert_eq!(map.get("CVXCode").map(String::as_str), Some("208"));
        assert_eq!(map.get("Vaccine Group Name").map(String::as_str), Some("COVID-19"));
        assert!(!map.contains_key("Orphan"));
    }

    #[test]
    fn test_malformed_feed_is_error() {
        let err = read_rows("<a><row><b>1</c></row></a>", "row").unwrap_err();
        assert!(matches!(err.source, quick_xml::Error::IllFormed(_)));
        assert!(err.position > 0);
    }

    #[test]
    fn test_bad_entity_is_error() {
        let err = read_rows("<a><row><b>x &bogus; y</b></row></a>", "row").unwrap_err();
        assert!(matches!(err.source, quick_xml::Error::Escape(_)));
    }
}
