//! End-to-end conversion behavior against real files in temp directories.

use image::{DynamicImage, GenericImageView, GrayAlphaImage, LumaA, Rgba, RgbaImage};
use img_convert::{
    convert_all, normalize_drop_payload, strategy_for, ConversionOutcome, ConvertError,
    ConvertOptions, ImageHandle, OutputFormat, PreparedImage, TRANSPARENT_INDEX,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 4x4 RGBA with fully transparent, faint, half and opaque pixels.
fn alpha_pattern() -> RgbaImage {
    RgbaImage::from_fn(4, 4, |x, y| {
        let alpha = match (x + y * 4) % 4 {
            0 => 0,
            1 => 1,
            2 => 128,
            _ => 255,
        };
        Rgba([(x * 60) as u8, (y * 60) as u8, 200, alpha])
    })
}

fn write_png(dir: &Path, name: &str, img: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

fn dir_snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| {
            let bytes = fs::read(&p).unwrap();
            (p, bytes)
        })
        .collect();
    entries.sort();
    entries
}

fn alpha_channel(img: &RgbaImage) -> Vec<u8> {
    img.pixels().map(|p| p[3]).collect()
}

fn convert_single(input: &Path, options: &ConvertOptions) -> ConversionOutcome {
    convert_all(&[input], options).pop().unwrap()
}

#[test]
fn same_format_leaves_directory_untouched() {
    let dir = TempDir::new().unwrap();
    write_png(dir.path(), "keep.png", &alpha_pattern());
    let jpeg = dir.path().join("photo.jpeg");
    DynamicImage::new_rgb8(2, 2).save_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();
    let before = dir_snapshot(dir.path());

    let outcomes = convert_all(
        &[dir.path().join("keep.png")],
        &ConvertOptions::new(OutputFormat::Png),
    );
    assert!(matches!(outcomes[0], ConversionOutcome::SkippedSameFormat));

    let outcomes = convert_all(&[&jpeg], &ConvertOptions::new(OutputFormat::Jpg));
    assert!(matches!(outcomes[0], ConversionOutcome::SkippedSameFormat));

    assert_eq!(dir_snapshot(dir.path()), before);
}

#[test]
fn jpeg_alias_maps_to_canonical_output_name() {
    let dir = TempDir::new().unwrap();
    let jpeg = dir.path().join("photo.jpeg");
    DynamicImage::new_rgb8(3, 2).save_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();

    let outcome = convert_single(&jpeg, &ConvertOptions::new(OutputFormat::Png));

    let expected = dir.path().join("photo.png");
    assert!(matches!(outcome, ConversionOutcome::Converted(ref p) if *p == expected));
    assert_eq!(image::open(&expected).unwrap().dimensions(), (3, 2));
    assert!(jpeg.exists());
}

#[test]
fn lossless_targets_keep_alpha_exactly() {
    let src = alpha_pattern();

    for format in [OutputFormat::Png, OutputFormat::Webp, OutputFormat::Tiff] {
        let dir = TempDir::new().unwrap();
        // PNG into PNG is a same-format skip, so feed that one a TIFF
        let source_name = if format == OutputFormat::Png { "src.tiff" } else { "src.png" };
        let input = dir.path().join(source_name);
        src.save(&input).unwrap();

        let outcome = convert_single(&input, &ConvertOptions::new(format));
        let output = match outcome {
            ConversionOutcome::Converted(p) => p,
            other => panic!("{}: unexpected outcome {:?}", format, other),
        };
        assert_eq!(output.extension().unwrap(), format.extension());

        let decoded = image::open(&output).unwrap().to_rgba8();
        assert_eq!(alpha_channel(&decoded), alpha_channel(&src), "{} alpha", format);
        if format != OutputFormat::Webp {
            assert_eq!(decoded, src, "{} pixels", format);
        }
    }
}

#[test]
fn gray_alpha_survives_tiff() {
    let dir = TempDir::new().unwrap();
    let mut img = GrayAlphaImage::new(2, 1);
    img.put_pixel(0, 0, LumaA([10, 0]));
    img.put_pixel(1, 0, LumaA([200, 77]));
    let input = dir.path().join("gray.png");
    img.save(&input).unwrap();

    let outcome = convert_single(&input, &ConvertOptions::new(OutputFormat::Tiff));

    let output = outcome.output_path().unwrap().to_path_buf();
    let decoded = image::open(output).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    assert_eq!(decoded.get_pixel(1, 0), &Rgba([200, 200, 200, 77]));
}

#[test]
fn avif_keeps_alpha_in_encoder_buffer_and_writes_avif() {
    let src = alpha_pattern();
    let prepared = strategy_for(OutputFormat::Avif).apply(
        ImageHandle::new(DynamicImage::ImageRgba8(src.clone())),
        OutputFormat::Avif,
    );
    match prepared {
        PreparedImage::Raster(handle) => assert_eq!(handle.into_pixels().to_rgba8(), src),
        PreparedImage::Indexed(_) => panic!("AVIF must stay a raster"),
    }

    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "clip.png", &src);
    let outcome = convert_single(&input, &ConvertOptions::new(OutputFormat::Avif));

    let output = outcome.output_path().unwrap().to_path_buf();
    assert!(outcome.is_converted());
    let bytes = fs::read(output).unwrap();
    assert_eq!(&bytes[4..12], b"ftypavif");
}

#[test]
fn gif_maps_exactly_the_transparent_pixels_to_index_zero() {
    let dir = TempDir::new().unwrap();
    let src = alpha_pattern();
    let input = write_png(dir.path(), "sprite.png", &src);

    let outcome = convert_single(&input, &ConvertOptions::new(OutputFormat::Gif));
    let output = outcome.output_path().unwrap().to_path_buf();

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(fs::File::open(output).unwrap()).unwrap();
    let frame = decoder.read_next_frame().unwrap().unwrap();

    assert_eq!(frame.transparent, Some(TRANSPARENT_INDEX));
    assert_eq!(frame.buffer.len(), 16);
    for (px, &index) in src.pixels().zip(frame.buffer.iter()) {
        assert_eq!(px[3] == 0, index == TRANSPARENT_INDEX, "pixel {:?} -> {}", px, index);
    }
}

#[test]
fn jpg_and_bmp_outputs_have_no_alpha() {
    for format in [OutputFormat::Jpg, OutputFormat::Bmp] {
        let dir = TempDir::new().unwrap();
        let input = write_png(dir.path(), "a.png", &alpha_pattern());

        let outcome = convert_single(&input, &ConvertOptions::new(format));
        let output = outcome.output_path().unwrap().to_path_buf();

        let decoded = image::open(&output).unwrap();
        assert!(!decoded.color().has_alpha(), "{} has alpha", format);
        assert_eq!(decoded.dimensions(), (4, 4));
    }
}

#[test]
fn overwrite_off_keeps_existing_bytes() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "x.png", &alpha_pattern());
    let existing = dir.path().join("x.bmp");
    fs::write(&existing, b"user data").unwrap();

    let options = ConvertOptions::new(OutputFormat::Bmp).with_overwrite(false);
    let outcome = convert_single(&input, &options);

    assert!(matches!(outcome, ConversionOutcome::SkippedExists(ref p) if *p == existing));
    assert_eq!(fs::read(&existing).unwrap(), b"user data");
}

#[test]
fn overwrite_on_replaces_content() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "x.png", &alpha_pattern());
    let existing = dir.path().join("x.bmp");
    fs::write(&existing, b"stale").unwrap();

    let outcome = convert_single(&input, &ConvertOptions::new(OutputFormat::Bmp));

    assert!(outcome.is_converted());
    let bytes = fs::read(&existing).unwrap();
    assert!(bytes.starts_with(b"BM"));
    assert_eq!(image::open(&existing).unwrap().dimensions(), (4, 4));
}

#[test]
fn brace_payload_normalizes_to_one_path() {
    assert_eq!(
        normalize_drop_payload(r"{C:\My Photos\pic one.png}"),
        vec![r"C:\My Photos\pic one.png".to_string()]
    );
}

#[test]
fn missing_then_valid_keeps_order() {
    let dir = TempDir::new().unwrap();
    let valid = write_png(dir.path(), "real.png", &alpha_pattern());
    let missing = dir.path().join("missing.png");

    let outcomes = convert_all(&[missing, valid], &ConvertOptions::new(OutputFormat::Webp));

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], ConversionOutcome::SkippedNotFound));
    assert!(
        matches!(outcomes[1], ConversionOutcome::Converted(ref p) if p.ends_with("real.webp"))
    );
}

#[test]
fn drop_payload_feeds_the_engine() {
    let dir = TempDir::new().unwrap();
    let spaced = dir.path().join("my pic.png");
    alpha_pattern().save(&spaced).unwrap();

    let payload = format!("{{{}}}", spaced.display());
    let paths = normalize_drop_payload(&payload);
    let outcomes = convert_all(&paths, &ConvertOptions::new(OutputFormat::Tiff));

    assert!(outcomes[0].is_converted());
    assert!(dir.path().join("my pic.tiff").exists());
}

#[test]
fn corrupt_input_fails_without_stopping_batch() {
    let dir = TempDir::new().unwrap();
    let corrupt = dir.path().join("bad.gif");
    fs::write(&corrupt, b"GIF89a\x01\x00garbage").unwrap();
    let good = write_png(dir.path(), "good.png", &alpha_pattern());

    let options = ConvertOptions::new(OutputFormat::Png).with_jobs(1);
    let outcomes = convert_all(&[corrupt, good], &options);

    assert!(matches!(
        outcomes[0],
        ConversionOutcome::Failed(ConvertError::DecodeFailure { .. })
    ));
    assert!(matches!(outcomes[1], ConversionOutcome::SkippedSameFormat));
    assert!(!dir.path().join("bad.png").exists());
}

#[test]
fn parallel_batch_keeps_order_and_serializes_shared_outputs() {
    let dir = TempDir::new().unwrap();
    let mut inputs = Vec::new();
    for i in 0..6 {
        inputs.push(write_png(dir.path(), &format!("img{}.png", i), &alpha_pattern()));
    }
    // two inputs that both map to shared.tiff
    let first = dir.path().join("shared.bmp");
    DynamicImage::new_rgb8(2, 2).save(&first).unwrap();
    let second = dir.path().join("shared.gif");
    DynamicImage::new_rgba8(2, 2).save(&second).unwrap();
    inputs.push(first);
    inputs.push(dir.path().join("ghost.png"));
    inputs.push(second);

    let options = ConvertOptions::new(OutputFormat::Tiff)
        .with_overwrite(false)
        .with_jobs(4);
    let outcomes = convert_all(&inputs, &options);

    assert_eq!(outcomes.len(), inputs.len());
    for (i, outcome) in outcomes.iter().take(6).enumerate() {
        let expected = dir.path().join(format!("img{}.tiff", i));
        assert!(matches!(outcome, ConversionOutcome::Converted(p) if *p == expected));
    }
    let shared = dir.path().join("shared.tiff");
    assert!(matches!(outcomes[6], ConversionOutcome::Converted(ref p) if *p == shared));
    assert!(matches!(outcomes[7], ConversionOutcome::SkippedNotFound));
    assert!(matches!(outcomes[8], ConversionOutcome::SkippedExists(ref p) if *p == shared));

    // the BMP source was opaque RGB, the GIF one would have carried alpha
    assert!(!image::open(&shared).unwrap().color().has_alpha());
}

#[test]
fn parallel_and_sequential_agree() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..5)
        .map(|i| write_png(dir.path(), &format!("p{}.png", i), &alpha_pattern()))
        .collect();

    let sequential = convert_all(&inputs, &ConvertOptions::new(OutputFormat::Bmp));
    let parallel = convert_all(&inputs, &ConvertOptions::new(OutputFormat::Bmp).with_jobs(0));

    let labels = |v: &[ConversionOutcome]| v.iter().map(|o| o.label()).collect::<Vec<_>>();
    assert_eq!(labels(&sequential), labels(&parallel));
    assert!(parallel.iter().all(|o| o.is_converted()));
}
