/// Data layer: core types, loading, filtering, reshaping and joining.
///
/// Architecture:
/// ```text
///  prices .csv / .parquet     target ZIPs .csv      distance matrix .csv
///        │                          │                      │
///        ▼                          ▼                      ▼
///   ┌──────────┐              ┌──────────┐           ┌──────────┐
///   │  loader   │─────────────▶│  filter   │           │ distance  │  pivot → DistanceTable
///   └──────────┘              └──────────┘           └──────────┘
///                                   │                      │
///                                   ▼                      │
///                             ┌──────────┐                 │
///                             │ reshape   │  wide → long   │
///                             └──────────┘                 │
///                                   │ growth (crate::growth)│
///                                   ▼                      ▼
///                             ┌────────────────────────────────┐
///                             │ join  → StudyFrame              │
///                             └────────────────────────────────┘
/// ```

pub mod distance;
pub mod filter;
pub mod join;
pub mod loader;
pub mod model;
pub mod reshape;
