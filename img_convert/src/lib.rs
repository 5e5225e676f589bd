pub mod formats;
pub mod gif_palette;
pub mod path_normalizer;
pub mod strategy;

pub mod conversion_api;

pub use formats::{
    normalized_extension, supported_input_extensions, ColorMode, ImageHandle, OutputFormat,
};
pub use gif_palette::{IndexedImage, TRANSPARENT_INDEX};
pub use path_normalizer::{
    normalize_drop_payload, normalize_drop_payload_with_style, normalize_drop_payloads, PathStyle,
};
pub use strategy::{strategy_for, FormatStrategy, PixelTransform, PreparedImage};

pub use conversion_api::{
    convert_all, convert_all_with_progress, convert_one, decode, output_path_for, BatchReport,
    ConversionOutcome, ConversionRequest, ConvertOptions, ReportEntry,
};

pub use shared_utils::img_errors::{ConvertError, Result};
