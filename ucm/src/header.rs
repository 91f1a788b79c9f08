//! Ordered, typed header of a ucm frame.
//!
//! Item names are hierarchical with `.` separating levels (for example
//! `Site.Observatory`); directory items carry no value and only group their
//! children. Item order is preserved on read and write.

/// Value of a header item, one variant per supported on-disk type
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Double(f64),
    Int(i32),
    UInt(u32),
    Float(f32),
    Str(String),
    Bool(bool),
    Dir,
    /// Integer MJD day number and hour of the day
    Time { mjd: i32, hour: f64 },
    DVector(Vec<f64>),
    UChar(u8),
    USInt(u16),
    IVector(Vec<i32>),
    FVector(Vec<f32>),
}

/// On-disk type codes
pub mod type_code {
    pub const DOUBLE: i32 = 0;
    pub const CHAR: i32 = 1;
    pub const INT: i32 = 2;
    pub const UINT: i32 = 3;
    pub const LINT: i32 = 4;
    pub const ULINT: i32 = 5;
    pub const FLOAT: i32 = 6;
    pub const STRING: i32 = 7;
    pub const BOOL: i32 = 8;
    pub const DIR: i32 = 9;
    pub const DATE: i32 = 10;
    pub const TIME: i32 = 11;
    pub const POSITION: i32 = 12;
    pub const DVECTOR: i32 = 13;
    pub const UCHAR: i32 = 14;
    pub const TELESCOPE: i32 = 15;
    pub const USINT: i32 = 16;
    pub const IVECTOR: i32 = 17;
    pub const FVECTOR: i32 = 18;
}

impl HeaderValue {
    pub fn type_code(&self) -> i32 {
        use type_code::*;
        match self {
            HeaderValue::Double(_) => DOUBLE,
            HeaderValue::Int(_) => INT,
            HeaderValue::UInt(_) => UINT,
            HeaderValue::Float(_) => FLOAT,
            HeaderValue::Str(_) => STRING,
            HeaderValue::Bool(_) => BOOL,
            HeaderValue::Dir => DIR,
            HeaderValue::Time { .. } => TIME,
            HeaderValue::DVector(_) => DVECTOR,
            HeaderValue::UChar(_) => UCHAR,
            HeaderValue::USInt(_) => USINT,
            HeaderValue::IVector(_) => IVECTOR,
            HeaderValue::FVector(_) => FVECTOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderItem {
    pub value: HeaderValue,
    pub comment: String,
}

/// Insertion-ordered header keyed on the full item name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    items: Vec<(String, HeaderItem)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an item, replacing the value in place if the name already exists
    pub fn set(&mut self, name: impl Into<String>, value: HeaderValue, comment: impl Into<String>) {
        let name = name.into();
        let item = HeaderItem {
            value,
            comment: comment.into(),
        };
        match self.items.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = item,
            None => self.items.push((name, item)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderItem> {
        self.items.iter().find(|(n, _)| n == name).map(|(_, item)| item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderItem)> {
        self.items.iter().map(|(n, item)| (n.as_str(), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_preserves_order_and_replaces() {
        let mut header = Header::new();
        header.set("Site", HeaderValue::Dir, "site information");
        header.set("Site.Observatory", HeaderValue::Str("WHT".into()), "");
        header.set("Exposure", HeaderValue::Float(2.5), "seconds");
        header.set("Site.Observatory", HeaderValue::Str("NTT".into()), "moved");

        let names: Vec<&str> = header.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Site", "Site.Observatory", "Exposure"]);
        let obs = header.get("Site.Observatory").unwrap();
        assert_eq!(obs.value, HeaderValue::Str("NTT".into()));
        assert_eq!(obs.comment, "moved");
        assert!(header.get("Missing").is_none());
    }

    #[test]
    fn test_type_codes() {
        assert_eq!(HeaderValue::Double(1.0).type_code(), type_code::DOUBLE);
        assert_eq!(
            HeaderValue::Time { mjd: 53592, hour: 2.58 }.type_code(),
            type_code::TIME
        );
        assert_eq!(HeaderValue::FVector(vec![]).type_code(), type_code::FVECTOR);
    }
}
