use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Documents the dashboard can have the backend generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Frago,
    Casevac,
    Eoincrep,
}

impl DocumentKind {
    pub const ALL: [Self; 3] = [Self::Frago, Self::Casevac, Self::Eoincrep];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frago => "FRAGO",
            Self::Casevac => "CASEVAC",
            Self::Eoincrep => "EOINCREP",
        }
    }

    /// Lowercase form used in URL paths and request field names.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Frago => "frago",
            Self::Casevac => "casevac",
            Self::Eoincrep => "eoincrep",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "frago" => Ok(Self::Frago),
            "casevac" => Ok(Self::Casevac),
            "eoincrep" => Ok(Self::Eoincrep),
            _ => Err(()),
        }
    }
}

/// A formatted document returned by a generate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub sequence: u32,
    pub unit_name: String,
    pub formatted_document: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl GeneratedDocument {
    pub fn filename(&self) -> String {
        download_filename(self.kind, self.sequence, &self.unit_name)
    }
}

/// `{KIND}_{sequence:04}_{unit name}.txt`, every whitespace run in the unit
/// name collapsed to a single underscore.
pub fn download_filename(kind: DocumentKind, sequence: u32, unit_name: &str) -> String {
    let mut name = String::with_capacity(unit_name.len());
    let mut in_whitespace = false;
    for ch in unit_name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
        } else {
            name.push(ch);
            in_whitespace = false;
        }
    }
    format!("{}_{sequence:04}_{name}.txt", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_pads_sequence_and_underscores_spaces() {
        assert_eq!(
            download_filename(DocumentKind::Frago, 7, "Alpha Company"),
            "FRAGO_0007_Alpha_Company.txt"
        );
        assert_eq!(
            download_filename(DocumentKind::Casevac, 12345, "2nd  Plt\t3"),
            "CASEVAC_12345_2nd_Plt_3.txt"
        );
    }

    #[test]
    fn kind_parses_from_path_segment() {
        assert_eq!("eoincrep".parse::<DocumentKind>(), Ok(DocumentKind::Eoincrep));
        assert_eq!("FRAGO".parse::<DocumentKind>(), Ok(DocumentKind::Frago));
        assert!("opord".parse::<DocumentKind>().is_err());
    }
}
