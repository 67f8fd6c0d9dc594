use std::fmt;
use std::str::FromStr;

/// The fixed set of houses that points are awarded to.
///
/// Serialized as the short code (`"Gryff"`, `"Slyth"`, ...), which is also
/// the value stored in the `category` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Gryff,
    Slyth,
    Raven,
    Huff,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 4] = [
        Category::Gryff,
        Category::Slyth,
        Category::Raven,
        Category::Huff,
    ];

    /// Short code used on the wire and in storage.
    pub fn code(self) -> &'static str {
        match self {
            Category::Gryff => "Gryff",
            Category::Slyth => "Slyth",
            Category::Raven => "Raven",
            Category::Huff => "Huff",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategoryError(pub String);

impl FromStr for Category {
    type Err = UnknownCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.code() == s)
            .ok_or_else(|| UnknownCategoryError(s.to_owned()))
    }
}

impl serde::Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            serde::de::Error::unknown_variant(&s, &["Gryff", "Slyth", "Raven", "Huff"])
        })
    }
}
