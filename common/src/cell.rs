//! A1形式のセル番地
//!
//! 行・列はいずれも0始まりで保持し、表示時だけ1始まりにする。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// "F2" → CellRef { row: 1, col: 5 }。`$` は無視する。
    pub fn parse(a1: &str) -> Option<Self> {
        let a1 = a1.trim();
        let mut letters = 0u32;
        let mut col: u32 = 0;
        let mut rest = "";

        for (i, ch) in a1.char_indices() {
            if ch == '$' {
                continue;
            }
            if ch.is_ascii_alphabetic() {
                col = col
                    .checked_mul(26)?
                    .checked_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
                letters += 1;
            } else {
                rest = &a1[i..];
                break;
            }
        }

        if letters == 0 || letters > 3 {
            return None;
        }

        let row: u32 = rest.trim_start_matches('$').parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self::new(row - 1, col - 1))
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", column_name(self.col), self.row + 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CellRef::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid cell: {}", s)))
    }
}

/// 0始まりの列番号 → "A", "B", ..., "AA"
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// "B" → 1。列記号として不正なら None
pub fn column_index(letters: &str) -> Option<u32> {
    CellRef::parse(&format!("{}1", letters.trim())).map(|c| c.col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_a1() {
        assert_eq!(CellRef::parse("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(CellRef::parse("F2"), Some(CellRef::new(1, 5)));
        assert_eq!(CellRef::parse("$G$6"), Some(CellRef::new(5, 6)));
        assert_eq!(CellRef::parse("aa10"), Some(CellRef::new(9, 26)));
    }

    #[test]
    fn test_parse_a1_invalid() {
        assert_eq!(CellRef::parse(""), None);
        assert_eq!(CellRef::parse("12"), None);
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("B"), None);
    }

    #[test]
    fn test_to_a1() {
        assert_eq!(CellRef::new(8, 3).to_a1(), "D9");
        assert_eq!(CellRef::new(0, 27).to_a1(), "AB1");
    }

    #[test]
    fn test_column_name_and_index() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_index("C"), Some(2));
        assert_eq!(column_index("1"), None);
    }
}
