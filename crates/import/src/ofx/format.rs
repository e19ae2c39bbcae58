use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// A tag followed by raw text up to the line end, e.g. `<CODE>0`.
re!(re_sgml_value_line, r"<[A-Za-z0-9.]+>[^<\r\n]+(?:\r?\n|$)");
re!(re_ofx_pi_version, r#"(?i)<\?OFX[^>]*\bVERSION\s*=\s*"([^"]*)""#);
re!(re_xml_encoding, r#"(?i)<\?XML[^>]*\bENCODING\s*=\s*"([^"]*)""#);

pub const DEFAULT_SGML_VERSION: &str = "102";
pub const DEFAULT_SGML_ENCODING: &str = "USASCII";
pub const DEFAULT_SGML_CHARSET: &str = "1252";

pub const DEFAULT_XML_VERSION: &str = "200";
pub const DEFAULT_XML_ENCODING: &str = "UTF-8";
pub const DEFAULT_XML_CHARSET: &str = "NONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfxVersion {
    /// SGML-based OFX 1.x.
    #[serde(rename = "1")]
    V1,
    /// XML-based OFX 2.x.
    #[serde(rename = "2")]
    V2,
}

impl fmt::Display for OfxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfxVersion::V1 => write!(f, "1"),
            OfxVersion::V2 => write!(f, "2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub version_major: OfxVersion,
    pub is_sgml: bool,
    pub header_version: String,
    pub encoding: String,
    pub charset: String,
}

impl FormatInfo {
    fn sgml(content: &str) -> Self {
        let header = SgmlHeader::parse(content);
        FormatInfo {
            version_major: OfxVersion::V1,
            is_sgml: true,
            header_version: header.version,
            encoding: header.encoding,
            charset: header.charset,
        }
    }

    fn xml(content: &str) -> Self {
        let capture = |re: &Regex, default: &str| {
            re.captures(content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        FormatInfo {
            version_major: OfxVersion::V2,
            is_sgml: false,
            header_version: capture(re_ofx_pi_version(), DEFAULT_XML_VERSION),
            encoding: capture(re_xml_encoding(), DEFAULT_XML_ENCODING),
            charset: DEFAULT_XML_CHARSET.to_string(),
        }
    }
}

/// Classifies `content` as OFX 1.x (SGML) or 2.x (XML). Never fails: when
/// nothing matches, the document is treated as SGML.
pub fn detect(content: &str) -> FormatInfo {
    let upper = content.to_ascii_uppercase();

    let info = if upper.contains("OFXHEADER:") || upper.contains("DATA:OFXSGML") {
        FormatInfo::sgml(content)
    } else if upper.contains("<?XML") || upper.contains("<?OFX") {
        FormatInfo::xml(content)
    } else {
        // Unmarked documents are read as SGML either way; the tag-soup
        // pattern only decides whether the fallback is worth logging.
        if !re_sgml_value_line().is_match(content) {
            tracing::debug!("no OFX format markers found, assuming SGML");
        }
        FormatInfo::sgml(content)
    };

    tracing::debug!(
        version = %info.version_major,
        sgml = info.is_sgml,
        header_version = %info.header_version,
        "detected OFX format"
    );
    info
}

struct SgmlHeader {
    version: String,
    encoding: String,
    charset: String,
}

impl SgmlHeader {
    /// Reads `KEY:VALUE` lines preceding the root `<OFX>` element.
    fn parse(content: &str) -> Self {
        let root = content.to_ascii_uppercase().find("<OFX>").unwrap_or(content.len());
        let mut header = SgmlHeader {
            version: DEFAULT_SGML_VERSION.to_string(),
            encoding: DEFAULT_SGML_ENCODING.to_string(),
            charset: DEFAULT_SGML_CHARSET.to_string(),
        };

        for line in content[..root].lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_uppercase().as_str() {
                "VERSION" => header.version = value.to_string(),
                "ENCODING" => header.encoding = value.to_string(),
                "CHARSET" => header.charset = value.to_string(),
                _ => {}
            }
        }

        header
    }
}
