use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A version 3 source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    fn with_mappings(mappings: String) -> Self {
        Self {
            version: 3,
            file: None,
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings,
        }
    }

    /// Every generated line maps to the same line of the single source.
    pub fn identity(source: &str) -> Self {
        let mappings = (0..source.lines().count())
            .map(|i| if i == 0 { "AAAA" } else { "AACA" })
            .collect::<Vec<_>>()
            .join(";");
        let mut map = Self::with_mappings(mappings);
        map.sources_content.push(source.to_string());
        map
    }

    /// A single segment mapping generated line 1, column 1 to `line:column`
    /// (both 1-based) of the source.
    pub fn point(line: usize, column: usize) -> Self {
        let mut mappings = String::new();
        encode_vlq(0, &mut mappings);
        encode_vlq(0, &mut mappings);
        encode_vlq(line.saturating_sub(1) as i64, &mut mappings);
        encode_vlq(column.saturating_sub(1) as i64, &mut mappings);
        Self::with_mappings(mappings)
    }

    /// Name the generated file and the source it maps back to.
    pub fn with_files(mut self, file: impl Into<String>, source: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self.sources = vec![source.into()];
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Append the base64 VLQ encoding of `value`.
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut v = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (v & 0b11111) as usize;
        v >>= 5;
        if v > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if v == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(v: i64) -> String {
        let mut s = String::new();
        encode_vlq(v, &mut s);
        s
    }

    #[test]
    fn test_vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-16), "hB");
        assert_eq!(vlq(1000), "w+B");
    }

    #[test]
    fn test_identity_map_one_segment_per_line() {
        let map = SourceMap::identity("a\nb\nc\n");
        assert_eq!(map.mappings, "AAAA;AACA;AACA");
        assert_eq!(map.sources_content, vec!["a\nb\nc\n".to_string()]);
    }

    #[test]
    fn test_point_map() {
        assert_eq!(SourceMap::point(1, 1).mappings, "AAAA");
        assert_eq!(SourceMap::point(3, 5).mappings, "AAEI");
    }

    #[test]
    fn test_json_shape() {
        let json = SourceMap::identity("x\n").with_files("a.js", "../src/a.js").to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["version"], 3);
        assert_eq!(v["file"], "a.js");
        assert_eq!(v["sources"][0], "../src/a.js");
        assert_eq!(v["sourcesContent"][0], "x\n");
        assert_eq!(v["mappings"], "AAAA");
    }
}
