use crate::error::{CubeError, Result};
use crate::event::Event;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Event field an event can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Interaction kind (`view`, `cart`, ...)
    EventType,
    /// Category path
    CategoryCode,
    /// Brand, the drill-down level under category
    Brand,
    /// Product identifier
    ProductId,
    /// Shopper identifier
    UserId,
}

impl Dimension {
    /// Column name of the dimension
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::EventType => "event_type",
            Dimension::CategoryCode => "category_code",
            Dimension::Brand => "brand",
            Dimension::ProductId => "product_id",
            Dimension::UserId => "user_id",
        }
    }

    /// Read this dimension's value off an event
    pub fn value_of(self, event: &Event) -> String {
        match self {
            Dimension::EventType => event.event_type().to_string(),
            Dimension::CategoryCode => event.category_code().to_string(),
            Dimension::Brand => event.brand().to_string(),
            Dimension::ProductId => event.product_id().to_string(),
            Dimension::UserId => event.user_id().to_string(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event_type" => Ok(Dimension::EventType),
            "category_code" => Ok(Dimension::CategoryCode),
            "brand" => Ok(Dimension::Brand),
            "product_id" => Ok(Dimension::ProductId),
            "user_id" => Ok(Dimension::UserId),
            _ => Err(CubeError::Configuration(format!(
                "unknown dimension '{}'",
                s.trim()
            ))),
        }
    }
}

/// Ordered grouping keys defining how events are bucketed into cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionHierarchy {
    dimensions: Vec<Dimension>,
}

impl DimensionHierarchy {
    /// Build a hierarchy from dimension names.
    ///
    /// `brand` is the drill-down level of `category_code`: when a category is
    /// requested without a brand, the brand is inserted right after it.
    /// Unknown, duplicated or empty lists are rejected.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut dimensions = Vec::with_capacity(names.len() + 1);
        for name in names {
            let dimension: Dimension = name.as_ref().parse()?;
            if dimensions.contains(&dimension) {
                return Err(CubeError::Configuration(format!(
                    "dimension '{}' listed twice",
                    dimension
                )));
            }
            dimensions.push(dimension);
        }
        if dimensions.is_empty() {
            return Err(CubeError::Configuration(
                "at least one dimension is required".to_string(),
            ));
        }

        if !dimensions.contains(&Dimension::Brand) {
            if let Some(idx) = dimensions.iter().position(|d| *d == Dimension::CategoryCode) {
                dimensions.insert(idx + 1, Dimension::Brand);
            }
        }
        Ok(Self { dimensions })
    }

    /// Dimensions, outermost first
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Always false; a hierarchy has at least one level
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Build the cell key for an event
    pub fn key_for(&self, event: &Event) -> DimensionKey {
        DimensionKey(self.dimensions.iter().map(|d| d.value_of(event)).collect())
    }
}

/// Identity of a cube cell: one value per hierarchy level, compared
/// lexicographically
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DimensionKey(Vec<String>);

impl DimensionKey {
    /// Create a key from its components
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Key components in hierarchy order
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}
