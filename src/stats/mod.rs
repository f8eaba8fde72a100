/// Statistics layer: least squares and the distribution tails behind its p-values.
///
/// ```text
///   Sample (y, X)
///        │
///        ▼
///   ┌──────────┐
///   │   ols    │  normal equations → OlsFit
///   └──────────┘
///        │ t, F statistics
///        ▼
///   ┌──────────┐
///   │   dist   │  incomplete beta → p-values
///   └──────────┘
/// ```

pub mod dist;
pub mod ols;
