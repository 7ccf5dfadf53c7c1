//! Generic data structures used by the analyses.

mod unionfind;

pub use unionfind::UnionFind;
