//! Report families and their fixed column layouts

use std::fmt;
use std::str::FromStr;

/// One tag column: tag key, column index, and whether `/` must be rewritten to `-`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagColumn {
    pub key: &'static str,
    pub index: usize,
    pub replace_slash: bool,
}

impl TagColumn {
    const fn plain(key: &'static str, index: usize) -> Self {
        Self { key, index, replace_slash: false }
    }
}

/// Column positions inside one report row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// "YYYY-MM-DD HH:MM:SS[.fff]"
    pub datetime: usize,
    pub value: usize,
    pub tags: &'static [TagColumn],
}

const GENERATION_LAYOUT: ColumnLayout = ColumnLayout {
    datetime: 3,
    value: 10,
    tags: &[
        TagColumn::plain("map_code", 8),
        TagColumn::plain("map_code_desc", 7),
        // Production types such as "Fossil Brown coal/Lignite"
        TagColumn { key: "type", index: 9, replace_slash: true },
        TagColumn::plain("area_code", 5),
        TagColumn::plain("area_type_code", 6),
    ],
};

const CROSS_BORDER_FLOW_LAYOUT: ColumnLayout = ColumnLayout {
    datetime: 3,
    value: 13,
    tags: &[
        TagColumn::plain("out_map_code", 8),
        TagColumn::plain("out_map_code_desc", 7),
        TagColumn::plain("out_area_code", 5),
        TagColumn::plain("out_area_type_code", 6),
        TagColumn::plain("in_map_code", 12),
        TagColumn::plain("in_map_code_desc", 11),
        TagColumn::plain("in_area_code", 9),
        TagColumn::plain("in_area_type_code", 10),
    ],
};

/// Report family handled by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Generation,
    CrossBorderFlow,
}

impl DatasetKind {
    /// Default processing order
    pub const ALL: [DatasetKind; 2] = [DatasetKind::Generation, DatasetKind::CrossBorderFlow];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Generation => "generation",
            DatasetKind::CrossBorderFlow => "cross_border_flow",
        }
    }

    pub fn layout(&self) -> &'static ColumnLayout {
        match self {
            DatasetKind::Generation => &GENERATION_LAYOUT,
            DatasetKind::CrossBorderFlow => &CROSS_BORDER_FLOW_LAYOUT,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = UnknownDatasetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "generation" => Ok(DatasetKind::Generation),
            "cross_border_flow" => Ok(DatasetKind::CrossBorderFlow),
            other => Err(UnknownDatasetKind(other.to_string())),
        }
    }
}

/// Dataset name that does not map to any [`DatasetKind`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDatasetKind(pub String);

impl fmt::Display for UnknownDatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown dataset kind: '{}' (expected generation or cross_border_flow)",
            self.0
        )
    }
}

impl std::error::Error for UnknownDatasetKind {}
