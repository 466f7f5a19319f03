/// Static mapping tables
///
/// Translates DSL vocabulary (technology flags, metrics, groupings,
/// population flags, fields) into physical column names and expressions,
/// and holds the data-year tables. Every concept accepts an English word
/// and a Norwegian alias; the first name listed is canonical.
use crate::ast::*;
use crate::error::CodeGenError;
use std::fmt;

/// Label of the synthetic national-total row
pub const NATIONAL_LABEL: &str = "Norge";

/// Every year for which any data exists, ascending
pub const KNOWN_YEARS: [i32; 12] = [
    2013, 2014, 2015, 2016, 2017, 2018, 2019, 2020, 2021, 2022, 2023, 2024,
];

/// First year with address-level data; earlier years are historical
pub const HISTORICAL_CUTOFF: i32 = 2022;

/// Identifiers accepted for the year column in `FOR aar >= 2020`
pub const YEAR_COLUMN_NAMES: [&str; 2] = ["aar", "year"];

/// Years with address-level data, ascending
pub fn modern_years() -> impl Iterator<Item = i32> {
    KNOWN_YEARS.into_iter().filter(|y| *y >= HISTORICAL_CUTOFF)
}

pub fn is_historical_year(year: i32) -> bool {
    year < HISTORICAL_CUTOFF
}

/// Technologies present in the historical dataset
pub const HISTORICAL_TECHS: [TechFlag; 4] =
    [TechFlag::Fiber, TechFlag::Cable, TechFlag::Dsl, TechFlag::FourG];

/// Download thresholds (Mbit/s) present in the historical dataset
pub const HISTORICAL_DOWNLOAD_THRESHOLDS: [i64; 6] = [10, 30, 50, 100, 500, 1000];

/// Upload thresholds (Mbit/s) present in the historical dataset
pub const HISTORICAL_UPLOAD_THRESHOLDS: [i64; 5] = [10, 50, 100, 500, 1000];

/// Data files under `<data_path>/<year>/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// One row per address with population counts
    Addresses,
    /// Fixed broadband coverage, one row per address and technology
    FixedCoverage,
    /// Mobile coverage, same layout as fixed
    MobileCoverage,
    /// One row per subscription
    Subscriptions,
    /// Pre-aggregated coverage fractions per geography and indicator
    Historical,
}

impl Dataset {
    pub fn file_name(&self) -> &'static str {
        match self {
            Dataset::Addresses => "adr.parquet",
            Dataset::FixedCoverage => "fbb.parquet",
            Dataset::MobileCoverage => "mob.parquet",
            Dataset::Subscriptions => "ab.parquet",
            Dataset::Historical => "dekning.parquet",
        }
    }

    /// Single-quoted file path literal
    pub fn source(&self, data_path: &str, year: i32) -> String {
        format!("'{}/{}/{}'", data_path, year, self.file_name())
    }
}

/// Convert Mbit/s to the kbit/s stored in the datasets
pub fn convert_speed(mbps: i64) -> Result<i64, CodeGenError> {
    mbps.checked_mul(1000).ok_or_else(|| {
        CodeGenError::new(format!("Speed value {} Mbit/s is out of range", mbps))
    })
}

macro_rules! vocabulary {
    ($ty:ident { $($variant:ident => [$($name:literal),+]),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Look up a lowercased DSL word
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($($name)|+ => Some($ty::$variant),)+
                    _ => None,
                }
            }

            /// Canonical DSL word
            pub fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => [$($name),+][0],)+
                }
            }

            /// Every accepted DSL word, for error messages
            pub fn names() -> Vec<&'static str> {
                vec![$($($name),+),+]
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.name())
            }
        }
    };
}

vocabulary!(TechFlag {
    Fiber => ["fiber"],
    Cable => ["cable", "kabel"],
    Dsl => ["dsl"],
    FiveG => ["5g"],
    FourG => ["4g"],
    Fwa => ["fwa", "ftb"],
});

vocabulary!(Metric {
    Homes => ["hus", "homes"],
    Addresses => ["adr", "addresses"],
    Buildings => ["bygg", "buildings"],
    Cabins => ["fritid", "cabins"],
    Subscriptions => ["ab", "subscriptions"],
});

vocabulary!(Grouping {
    National => ["total", "national"],
    County => ["fylke", "county"],
    Municipality => ["kom", "municipality"],
    Postal => ["postnr", "postal"],
    Urban => ["tett", "urban"],
    Provider => ["tilb", "provider"],
    Tech => ["tek", "tech"],
});

vocabulary!(Output {
    Count => ["count"],
    Percent => ["andel", "percent"],
    Both => ["begge", "both"],
});

vocabulary!(SortField {
    Count => ["count"],
    Percent => ["andel", "percent"],
    Group => ["group", "gruppe"],
});

vocabulary!(PopulationFlag {
    Urban => ["tett", "urban"],
    Rural => ["spredt", "rural"],
    Private => ["private", "privat"],
    Business => ["business", "bedrift"],
});

vocabulary!(Field {
    Tech => ["tek", "tech"],
    Speed => ["nedhast", "speed"],
    Upload => ["opphast", "upload"],
    Provider => ["tilb", "provider"],
    County => ["fylke", "county"],
    Municipality => ["kom", "municipality"],
    BuildingType => ["type", "bygtype"],
    Postal => ["postnr", "postal"],
});

impl TechFlag {
    /// Value stored in the technology column
    pub fn column_value(&self) -> &'static str {
        match self {
            TechFlag::Fiber => "fiber",
            TechFlag::Cable => "cable",
            TechFlag::Dsl => "dsl",
            TechFlag::FiveG => "5g",
            TechFlag::FourG => "4g",
            TechFlag::Fwa => "fwa",
        }
    }

    /// Resolve a technology column value back to its flag
    pub fn from_column_value(value: &str) -> Option<Self> {
        TechFlag::ALL
            .iter()
            .copied()
            .find(|flag| flag.column_value() == value)
    }
}

/// Technology column in the coverage and subscription datasets
pub const TECH_COLUMN: &str = "tek";

impl Metric {
    /// Column summed by coverage aggregates; `1` counts addresses
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Homes => "hus",
            Metric::Addresses => "1",
            Metric::Buildings => "bygninger",
            Metric::Cabins => "fritid",
            Metric::Subscriptions => "1",
        }
    }
}

impl Grouping {
    /// SQL expression producing the group label, optionally qualified
    pub fn expr(&self, qualifier: Option<&str>) -> String {
        match self {
            Grouping::National => format!("'{}'", NATIONAL_LABEL),
            Grouping::Urban => format!(
                "CASE WHEN {} THEN 'Tettsted' ELSE 'Spredt' END",
                qualify(qualifier, "ertett")
            ),
            Grouping::County => qualify(qualifier, "fylke"),
            Grouping::Municipality => qualify(qualifier, "komnavn"),
            Grouping::Postal => qualify(qualifier, "postnr"),
            Grouping::Provider => qualify(qualifier, "tilb"),
            Grouping::Tech => qualify(qualifier, TECH_COLUMN),
        }
    }
}

impl PopulationFlag {
    /// SQL predicate for this flag, optionally qualified
    pub fn predicate(&self, qualifier: Option<&str>) -> String {
        match self {
            PopulationFlag::Urban => format!("{} = true", qualify(qualifier, "ertett")),
            PopulationFlag::Rural => format!("{} = false", qualify(qualifier, "ertett")),
            PopulationFlag::Private => format!("{} = true", qualify(qualifier, "privat")),
            PopulationFlag::Business => format!("{} = false", qualify(qualifier, "privat")),
        }
    }
}

impl Field {
    /// Physical column name
    pub fn column(&self) -> &'static str {
        match self {
            Field::Tech => TECH_COLUMN,
            Field::Speed => "ned",
            Field::Upload => "opp",
            Field::Provider => "tilb",
            Field::County => "fylke",
            Field::Municipality => "komnavn",
            Field::BuildingType => "bygtype",
            Field::Postal => "postnr",
        }
    }
}

/// Prefix a column with a table alias when one is given
pub fn qualify(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(alias) => format!("{}.{}", alias, column),
        None => column.to_string(),
    }
}
