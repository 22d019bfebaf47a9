/// Data layer: core types, loading, and dtype optimisation.
///
/// Architecture:
/// ```text
///  .csv / .txt / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (one entry)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    model      │  Table = Vec<Column>, Column = dtype + values
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ optimize  │  downcast dtypes after computations
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod optimize;
