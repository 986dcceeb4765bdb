pub mod cfg;
pub mod depgraph;
pub mod reach;
