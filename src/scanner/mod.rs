//! フォルダ探索モジュール
//!
//! ルート配下（深さ3まで）から FAI フォルダを探し、対応する
//! Material CoC フォルダと組にする。

use crate::config::SEARCH_DEPTH;
use crate::error::{CocError, Result};
use fai_coc_common::normalize::match_key;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 検査表フォルダと証明書フォルダの組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePair {
    pub inspection: PathBuf,
    /// フォルダ名から取り出したFAI番号
    pub inspection_number: String,
    /// 見つからなければNone（行はすべてDocument Not Foundになる）
    pub certificate: Option<PathBuf>,
    /// ルート直下を0とした深さ
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct SourceTree {
    pub root: PathBuf,
    pub pairs: Vec<SourcePair>,
}

impl SourceTree {
    pub fn paired_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.certificate.is_some()).count()
    }
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

const CERTIFICATE_KEYWORDS: &[&str] = &["coc", "material"];

/// ルートの存在確認（実行前の致命的エラー）
pub fn validate_root(root: &Path) -> Result<()> {
    if !root.exists() {
        return Err(CocError::RootNotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(CocError::RootNotDirectory(root.display().to_string()));
    }
    std::fs::read_dir(root)?;
    Ok(())
}

/// FAI番号を取り出す（`FAI 127K667G02` → `127K667G02`）
pub fn extract_inspection_number(folder_name: &str) -> String {
    lazy_static::lazy_static! {
        static ref FAI_RE: Regex = Regex::new(r"(?i)^FAI\s+(.+)$").unwrap();
    }

    FAI_RE
        .captures(folder_name.trim())
        .map(|cap| cap[1].trim().to_string())
        .unwrap_or_else(|| folder_name.trim().to_string())
}

pub fn is_inspection_folder(name: &str) -> bool {
    name.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("fai"))
}

fn is_certificate_folder_for(name: &str, number: &str) -> bool {
    let key = match_key(name);
    CERTIFICATE_KEYWORDS.iter().any(|k| key.contains(k)) && key.contains(&match_key(number))
}

/// ルート配下のフォルダ組を探索
///
/// 一致するフォルダがなければ空の結果を返す（エラーではない）。
/// `output_folder_name` の出力フォルダには降りない。
pub fn locate_sources(root: &Path, output_folder_name: &str) -> Result<SourceTree> {
    validate_root(root)?;

    let mut pairs = Vec::new();

    let output_dir = root.join(output_folder_name);
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(SEARCH_DEPTH + 1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != output_dir);

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !is_inspection_folder(&name) {
            continue;
        }

        let inspection = entry.path().to_path_buf();
        let inspection_number = extract_inspection_number(&name);
        let certificate = find_certificate_folder(root, &output_dir, &inspection, &inspection_number);

        match &certificate {
            Some(coc) => tracing::debug!(fai = %inspection.display(), coc = %coc.display(), "フォルダ組を検出"),
            None => tracing::warn!(fai = %inspection.display(), "Material CoC フォルダが見つかりません"),
        }

        pairs.push(SourcePair {
            inspection,
            inspection_number,
            certificate,
            depth: entry.depth() - 1,
        });
    }

    Ok(SourceTree {
        root: root.to_path_buf(),
        pairs,
    })
}

/// FAIフォルダに対応する証明書フォルダを探す
///
/// 1. 同じ階層の `Material CoC <番号>`
/// 2. 同じ階層でキーワードと番号を含むフォルダ
/// 3. 親フォルダ配下の `Material CoC <番号>`（ルートから深さ3まで）
///
/// 出力フォルダ `output_dir` の中は探さない。
pub fn find_certificate_folder(
    root: &Path,
    output_dir: &Path,
    inspection: &Path,
    number: &str,
) -> Option<PathBuf> {
    let parent = inspection.parent()?;
    let target = match_key(&format!("Material CoC {}", number));

    let mut siblings: Vec<PathBuf> = std::fs::read_dir(parent)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.as_path() != inspection && p.as_path() != output_dir)
        .collect();
    siblings.sort();

    let folder_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    if let Some(exact) = siblings.iter().find(|p| match_key(&folder_name(p)) == target) {
        return Some(exact.clone());
    }

    if let Some(loose) = siblings
        .iter()
        .find(|p| !is_inspection_folder(&folder_name(p)) && is_certificate_folder_for(&folder_name(p), number))
    {
        return Some(loose.clone());
    }

    // 残りの深さ（ルート直下のエントリを1として SEARCH_DEPTH + 1 まで）
    let budget = (SEARCH_DEPTH + 1).saturating_sub(depth_below(root, parent));
    if budget < 2 {
        return None;
    }

    WalkDir::new(parent)
        .min_depth(2)
        .max_depth(budget)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.path() != output_dir)
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_dir() && match_key(&e.file_name().to_string_lossy()) == target)
        .map(|e| e.into_path())
}

/// `root` から見た `path` の階層数（ルート自身は0）
fn depth_below(root: &Path, path: &Path) -> usize {
    path.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0)
}

/// FAIフォルダ直下のスプレッドシート（ファイル名順、ロックファイル除外）
pub fn list_spreadsheets(folder: &Path) -> Vec<PathBuf> {
    list_files(folder, SPREADSHEET_EXTENSIONS)
}

/// 証明書フォルダ直下のPDF（ファイル名順）
pub fn list_certificates(folder: &Path) -> Vec<PathBuf> {
    list_files(folder, &["pdf"])
}

fn list_files(folder: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1) // 直下のみ
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let lock_file = p
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("~$"));
            !lock_file && has_extension(p, extensions)
        })
        .collect();

    files.sort();
    files
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_extract_inspection_number() {
        assert_eq!(extract_inspection_number("FAI 127K667G02"), "127K667G02");
        assert_eq!(extract_inspection_number("fai   ABC 1"), "ABC 1");
        assert_eq!(extract_inspection_number("FAI-001"), "FAI-001");
    }

    #[test]
    fn test_is_inspection_folder() {
        assert!(is_inspection_folder("FAI 1"));
        assert!(is_inspection_folder("fai_reports"));
        assert!(!is_inspection_folder("Material CoC 1"));
        assert!(!is_inspection_folder("FA"));
    }

    #[test]
    fn test_validate_root_errors() {
        let dir = tempdir().expect("Failed to create temp dir");
        let file = dir.path().join("root.txt");
        File::create(&file).unwrap();

        assert!(matches!(
            validate_root(&dir.path().join("missing")),
            Err(CocError::RootNotFound(_))
        ));
        assert!(matches!(validate_root(&file), Err(CocError::RootNotDirectory(_))));
        assert!(validate_root(dir.path()).is_ok());
    }

    #[test]
    fn test_list_spreadsheets_skips_lock_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        for name in ["b.xlsx", "a.XLS", "~$b.xlsx", "notes.txt", "c.xlsm"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.xlsx")).unwrap();

        let names: Vec<String> = list_spreadsheets(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.XLS", "b.xlsx", "c.xlsm"]);
    }

    #[test]
    fn test_loose_certificate_name() {
        let dir = tempdir().expect("Failed to create temp dir");
        let fai = dir.path().join("FAI 42");
        fs::create_dir(&fai).unwrap();
        fs::create_dir(dir.path().join("CoC docs 42")).unwrap();

        let output = dir.path().join("highlighted_pdfs");
        let found = find_certificate_folder(dir.path(), &output, &fai, "42").unwrap();
        assert_eq!(found, dir.path().join("CoC docs 42"));
    }

    #[test]
    fn test_certificate_fallback_skips_output_folder() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let fai = root.join("FAI 100");
        fs::create_dir(&fai).unwrap();
        // 前回の安全モードの出力だけが同名のフォルダを持つ
        let output = root.join("highlighted_pdfs");
        fs::create_dir_all(output.join("Material CoC 100")).unwrap();

        assert_eq!(find_certificate_folder(root, &output, &fai, "100"), None);

        let tree = locate_sources(root, "highlighted_pdfs").unwrap();
        assert_eq!(tree.pairs.len(), 1);
        assert_eq!(tree.pairs[0].certificate, None);
    }

    #[test]
    fn test_certificate_fallback_respects_depth_limit() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let output = root.join("highlighted_pdfs");
        let fai = root.join("a").join("FAI 7");
        fs::create_dir_all(&fai).unwrap();
        // ルートから深さ4（許容）と深さ5（範囲外）
        let near = root.join("a").join("b").join("c").join("Material CoC 7");
        let far = root.join("a").join("x").join("y").join("z").join("Material CoC 7");
        fs::create_dir_all(&far).unwrap();

        assert_eq!(find_certificate_folder(root, &output, &fai, "7"), None);

        fs::create_dir_all(&near).unwrap();
        assert_eq!(find_certificate_folder(root, &output, &fai, "7"), Some(near));
    }

    #[test]
    fn test_locate_sources_stops_at_depth_three() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let level3 = root.join("a").join("b").join("c").join("FAI 3");
        let level4 = root.join("a").join("b").join("c").join("d").join("FAI 4");
        fs::create_dir_all(&level3).unwrap();
        fs::create_dir_all(&level4).unwrap();
        fs::create_dir_all(root.join("highlighted_pdfs").join("FAI 9")).unwrap();

        let tree = locate_sources(root, "highlighted_pdfs").unwrap();

        let found: Vec<(&Path, usize)> = tree.pairs.iter().map(|p| (p.inspection.as_path(), p.depth)).collect();
        assert_eq!(found, vec![(level3.as_path(), 3)]);
    }
}
