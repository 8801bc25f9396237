//! FAI検査表とMaterial CoC証明書PDFの照合・ハイライト
//!
//! 検査表の各行を証明書PDFと照合し、PDF内の品番をハイライトして結果を集約する。

pub mod annotator;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod matcher;
pub mod orchestrator;
pub mod recognizer;
pub mod scanner;
pub mod table;
