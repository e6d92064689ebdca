use crate::constants;
use bytes::Bytes;

/// The header map of a body part.
///
/// Keys are unique, case preserving and kept in insertion order. Each key maps
/// to an ordered list of values, the way a `Key: value1,value2` header line
/// splits on commas. Repeated header lines for the same key append their
/// values instead of replacing them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl PartHeaders {
    pub fn new() -> Self {
        PartHeaders::default()
    }

    /// Appends values under the given key, folding into an existing entry.
    pub fn append<K, V>(&mut self, key: K, values: V)
    where
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let key = key.into();
        let values = values.into_iter().map(Into::into);

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((key, values.collect())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses an accumulated header block, the final `\r\n\r\n` included.
    ///
    /// Lines without a colon are dropped. Keys and values are trimmed, values
    /// are split on commas.
    pub(crate) fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut headers = PartHeaders::new();

        for line in text.split(constants::CRLF) {
            if let Some((key, values)) = split_line(line) {
                headers.append(key, values);
            }
        }

        headers
    }

    /// Renders the header block in wire form, terminated by a blank line.
    pub(crate) fn render(&self) -> Bytes {
        let lines = self
            .iter()
            .map(|(key, values)| format!("{}: {}", key, values.join(",")))
            .collect::<Vec<_>>();

        Bytes::from(lines.join(constants::CRLF) + constants::CRLF_CRLF)
    }
}

fn split_line(line: &str) -> Option<(&str, impl Iterator<Item = &str>)> {
    line.find(':').map(move |idx| {
        (
            line[..idx].trim(),
            line[idx + 1..].split(',').map(str::trim),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_value() {
        let headers = PartHeaders::parse(b"Header1: Value\r\nHeader2: Value1, Value2\r\n\r\n");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Header1"), Some(&["Value".to_owned()][..]));
        assert_eq!(
            headers.get("Header2"),
            Some(&["Value1".to_owned(), "Value2".to_owned()][..])
        );
    }

    #[test]
    fn test_parse_folds_repeated_keys() {
        let headers = PartHeaders::parse(b"Key: a\r\nKey: b,c\r\n\r\n");

        assert_eq!(
            headers.get("Key"),
            Some(&["a".to_owned(), "b".to_owned(), "c".to_owned()][..])
        );
    }

    #[test]
    fn test_parse_drops_lines_without_colon() {
        let headers = PartHeaders::parse(b"garbage line\r\nKey: value\r\n\r\n");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Key"), Some(&["value".to_owned()][..]));
    }

    #[test]
    fn test_render_insertion_order() {
        let mut headers = PartHeaders::new();

        headers.append("B", vec!["1"]);
        headers.append("A", vec!["2", "3"]);

        assert_eq!(&headers.render()[..], b"B: 1\r\nA: 2,3\r\n\r\n");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(&PartHeaders::new().render()[..], b"\r\n\r\n");
    }
}
