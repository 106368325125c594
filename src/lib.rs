pub mod columns;
pub mod config;
pub mod error;
pub mod matchups;
pub mod normalize;
pub mod pipeline;
pub mod ranking_export;
pub mod risk;
pub mod shortlist;
pub mod state;
pub mod workbook;
