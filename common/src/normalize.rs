//! 識別子の正規化
//!
//! 検査表・ファイル名・PDF本文で表記がぶれる識別子を比較可能な形に揃える。
//!
//! - `clean_text`: 改行・連続空白を畳み込む（大文字小文字は保持）
//! - `match_key`: 大文字小文字を無視した比較用
//! - `compact_key`: 記号・空白を除去した比較用（ファイル名照合の第3ルール）
//! - `token_key`: 認識トークン同士の比較用（前後の句読点を除去）

/// 前後から取り除く句読点（`+` `-` `/` は品番の一部になり得るので残す）
const EDGE_PUNCTUATION: &[char] = &[',', ';', ':', '.', '(', ')', '[', ']', '{', '}', '"', '\''];

/// セル値・識別子を整形
///
/// 改行を空白に置換し、連続する空白を1つにまとめて前後を除去する。
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 大文字小文字を無視した比較キー
pub fn match_key(value: &str) -> String {
    clean_text(value).to_lowercase()
}

/// 英数字のみを残した比較キー
///
/// # Examples
/// ```
/// use fai_coc_common::normalize::compact_key;
///
/// assert_eq!(compact_key("139-3040_763360"), "1393040763360");
/// assert_eq!(compact_key(" KE 104A054 "), "ke104a054");
/// ```
pub fn compact_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// 認識トークンの比較キー
///
/// 空白を除去し、前後の句読点を落として小文字化する。
pub fn token_key(value: &str) -> String {
    let joined: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    joined.trim_matches(EDGE_PUNCTUATION).to_lowercase()
}
