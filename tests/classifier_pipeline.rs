// End-to-end: encoded image -> loader -> classifier preprocessing -> tensor
use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use vision_pipeline::preprocess::{IMAGENET_MEAN, IMAGENET_STD};
use vision_pipeline::{ImageLoader, ImageSource, PreprocessConfig, Preprocessor, Raster};

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width) as u8,
            (y * 255 / height) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode test png");
    bytes.into_inner()
}

async fn load_test_image() -> Raster {
    ImageLoader::default()
        .load(ImageSource::Bytes(gradient_png(512, 384)))
        .await
        .expect("load test image")
}

fn classifier_config(resize_longer: bool, square: bool) -> PreprocessConfig {
    // 非方形的长边缩放需要填充回 224
    let json = format!(
        r#"{{
            "do_resize": true,
            "size": 224,
            "do_square": {square},
            "resize_longer": {resize_longer},
            "do_pad": {pad},
            "pad_size": 224,
            "do_normalize": true,
            "image_mean": [0.485, 0.456, 0.406],
            "image_std": [0.229, 0.224, 0.225]
        }}"#,
        square = square,
        resize_longer = resize_longer,
        pad = !square,
    );
    PreprocessConfig::from_json_str(&json).expect("valid classifier config")
}

fn normalized_bounds() -> (f32, f32) {
    let lower = (0..3)
        .map(|c| IMAGENET_MEAN[c] / IMAGENET_STD[c])
        .fold(f32::NEG_INFINITY, f32::max);
    let upper = (0..3)
        .map(|c| (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
        .fold(f32::NEG_INFINITY, f32::max);
    (-lower, upper)
}

#[tokio::test]
async fn classifier_tensor_shape_ignores_resize_longer() {
    let image = load_test_image().await;
    assert_eq!(image.dimensions(), (512, 384));

    let (lower, upper) = normalized_bounds();
    for (resize_longer, square) in [(false, true), (true, true), (true, false)] {
        let output = Preprocessor::new(classifier_config(resize_longer, square))
            .process(&image)
            .expect("preprocess should succeed");

        assert_eq!(output.tensor.shape(), &[1, 3, 224, 224]);
        assert!(
            output
                .tensor
                .data()
                .iter()
                .all(|&v| v >= lower - 1e-4 && v <= upper + 1e-4),
            "values out of normalized range (resize_longer={})",
            resize_longer
        );
    }
}

#[tokio::test]
async fn classifier_preset_matches_explicit_config() {
    let image = load_test_image().await;

    let preset = Preprocessor::new(PreprocessConfig::classifier_default())
        .process(&image)
        .expect("preset should succeed");
    let explicit = Preprocessor::new(classifier_config(false, true))
        .process(&image)
        .expect("explicit config should succeed");

    assert_eq!(preset.tensor, explicit.tensor);
}

#[tokio::test]
async fn batch_of_loaded_images_is_stacked() {
    let image = load_test_image().await;
    let batch = Preprocessor::new(PreprocessConfig::classifier_default())
        .prepare_batch(&[image.clone(), image])
        .expect("batch should succeed");

    assert_eq!(batch.shape(), &[2, 3, 224, 224]);
}
