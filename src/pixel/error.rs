//! 画素バッファ変換のエラー定義

/// 画像 → モデル入力バッファ変換で発生するエラー
///
/// どの分岐もプロセスを落とさない。呼び出し側は「この画像では推論しない」として扱う。
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("画像サイズが不正です: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("行アラインメントは2の累乗である必要があります: {0}")]
    UnsupportedRowAlignment(usize),

    #[error("バッファサイズの計算がオーバーフローしました: {width}x{height}")]
    SizeOverflow { width: u32, height: u32 },

    #[error("画素バッファの確保に失敗しました（{bytes} バイト）")]
    AllocationFailed { bytes: usize },

    #[error("bytes_per_row が不整合です: {bytes_per_row} (幅 {width}, 高さ {height}, メモリ {len} バイト)")]
    InconsistentBytesPerRow {
        bytes_per_row: usize,
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("描画サーフェスを作成できません: {0}")]
    UnsupportedSurface(String),

    #[error("座標変換行列が特異です")]
    SingularTransform,
}

impl ConversionError {
    /// バッファ確保段階の失敗かどうか
    pub fn is_allocation_failure(&self) -> bool {
        matches!(
            self,
            ConversionError::InvalidDimensions { .. }
                | ConversionError::UnsupportedRowAlignment(_)
                | ConversionError::SizeOverflow { .. }
                | ConversionError::AllocationFailed { .. }
        )
    }
}

impl From<ConversionError> for String {
    fn from(error: ConversionError) -> Self {
        error.to_string()
    }
}
