use crate::error::{CocError, Result};
use fai_coc_common::{MatchRule, OutputMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 探索深さ（ルート直下を0として3まで）
pub const SEARCH_DEPTH: usize = 3;

/// 同時実行ジョブ数の上限
pub const MAX_CONCURRENT_JOBS: usize = 8;

/// 認識エンジンのパスを上書きする環境変数
pub const TESSERACT_ENV: &str = "FAI_COC_TESSERACT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tesseract_path: String,
    pub pdftoppm_path: String,
    pub pdftotext_path: String,
    pub ocr_language: String,
    pub ocr_dpi: u32,
    /// これ未満の文字数しかないページはテキストなしとみなす
    pub min_native_chars: usize,
    pub output_folder_name: String,
    /// 認識テキストを不可視レイヤーとして埋め込む
    pub embed_text_layer: bool,
    /// 品番が見つからなかったPDFも書き出す
    pub write_unmatched: bool,
    pub match_rules: Vec<MatchRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".into(),
            pdftoppm_path: "pdftoppm".into(),
            pdftotext_path: "pdftotext".into(),
            ocr_language: "eng".into(),
            ocr_dpi: 200,
            min_native_chars: 50,
            output_folder_name: "highlighted_pdfs".into(),
            embed_text_layer: true,
            write_unmatched: false,
            match_rules: MatchRule::default_rules(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_json::from_str::<Config>(&content)?
        } else {
            Self::default()
        };

        // 環境変数を優先
        if let Ok(path) = std::env::var(TESSERACT_ENV) {
            if !path.trim().is_empty() {
                config.tesseract_path = path;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 読めない設定は既定値で代用する（config コマンドで作り直すため）
    pub fn load_or_default() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from_or_default(&path),
            Err(e) => {
                tracing::warn!(error = %e, "設定ファイルの場所を決められないため既定値を使います");
                Self::default()
            }
        }
    }

    pub fn load_from_or_default(config_path: &Path) -> Self {
        Self::load_from(config_path).unwrap_or_else(|e| {
            tracing::warn!(path = %config_path.display(), error = %e, "設定ファイルを読み込めないため既定値を使います");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CocError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("fai-coc").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.match_rules.is_empty() {
            return Err(CocError::Config("照合ルールが空です".into()));
        }
        if self.ocr_dpi == 0 {
            return Err(CocError::Config("ocr_dpi は1以上を指定してください".into()));
        }
        if self.output_folder_name.trim().is_empty() {
            return Err(CocError::Config("出力フォルダ名が空です".into()));
        }
        Ok(())
    }
}

/// 1回の実行パラメータ
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub root_path: PathBuf,
    /// テキストの有無にかかわらず全ページを認識にかける
    pub force_recognition: bool,
    pub output_mode: OutputMode,
}

impl RunParameters {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            force_recognition: true,
            output_mode: OutputMode::Safe,
        }
    }

    pub fn with_force_recognition(mut self, force: bool) -> Self {
        self.force_recognition = force;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.match_rules, MatchRule::default_rules());
        assert_eq!(config.output_folder_name, "highlighted_pdfs");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"ocr_dpi": 300, "match_rules": ["both-identifiers", "primary-exact"]}"#)
                .unwrap();
        assert_eq!(config.ocr_dpi, 300);
        assert_eq!(config.match_rules[0], MatchRule::BothIdentifiers);
        assert_eq!(config.tesseract_path, "tesseract");
    }

    #[test]
    fn test_empty_rules_rejected() {
        let config = Config {
            match_rules: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CocError::Config(_))));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load_from(&path), Err(CocError::JsonParse(_))));
        let config = Config::load_from_or_default(&path);
        assert_eq!(config.output_folder_name, "highlighted_pdfs");
        assert_eq!(config.ocr_dpi, 200);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ocr_dpi": 0}"#).unwrap();

        assert!(matches!(Config::load_from(&path), Err(CocError::Config(_))));
        assert_eq!(Config::load_from_or_default(&path).ocr_dpi, 200);
    }

    #[test]
    fn test_run_parameters_defaults() {
        let params = RunParameters::new("/tmp/root");
        assert!(params.force_recognition);
        assert_eq!(params.output_mode, OutputMode::Safe);
    }
}
