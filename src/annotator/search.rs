use crate::recognizer::{RecognitionIndex, Rect, WordBox};
use fai_coc_common::normalize::token_key;

/// 識別子の出現位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occurrence {
    pub page: u32,
    pub rect: Rect,
}

/// 索引全体から識別子を探す（ページ順）
pub fn find_occurrences(index: &RecognitionIndex, identifier: &str) -> Vec<Occurrence> {
    index
        .pages
        .iter()
        .flat_map(|page| {
            find_in_words(&page.words, identifier)
                .into_iter()
                .map(move |rect| Occurrence { page: page.page, rect })
        })
        .collect()
}

/// 連続する単語を連結して識別子と一致する範囲を探す
///
/// 認識結果では `KE 104A054-130E+` が `KE` と `104A054-130E+` に分かれたり、
/// 逆に空白が消えたりするため、空白を無視して比較する。
/// 一致した単語群の外接矩形を返す。重なる一致は数えない。
pub fn find_in_words(words: &[WordBox], identifier: &str) -> Vec<Rect> {
    let target = token_key(identifier);
    if target.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let mut joined = String::new();
        let mut rect: Option<Rect> = None;
        let mut matched_end = None;

        for (offset, word) in words[start..].iter().enumerate() {
            let key = token_key(&word.text);
            if key.is_empty() {
                if rect.is_none() {
                    break;
                }
                continue;
            }

            joined.push_str(&key);
            rect = Some(rect.map_or(word.rect, |r| r.union(&word.rect)));

            if joined == target {
                matched_end = Some(start + offset);
                break;
            }
            if !target.starts_with(&joined) {
                break;
            }
        }

        match (matched_end, rect) {
            (Some(end), Some(rect)) => {
                found.push(rect);
                start = end + 1;
            }
            _ => start += 1,
        }
    }

    found
}
