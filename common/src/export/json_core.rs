//! JSON生成（共通ライブラリ）

use crate::error::Result;
use crate::types::OutcomeRecord;

/// 結果レコードを整形済みJSON配列にする
pub fn generate_json(records: &[&OutcomeRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
