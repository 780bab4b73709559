// Two-stage segmentation against fake encoder/decoder engines
use std::sync::{Arc, Mutex};

use vision_pipeline::segment::{
    DECODER_MASKS, DECODER_ORIG_SIZE, DECODER_POINT_COORDS, DECODER_POINT_LABELS,
    EmptyPromptPolicy, LABEL_PADDING, LABEL_POSITIVE, PromptOptions, SegmentOptions, SessionState,
};
use vision_pipeline::{
    EngineError, Feeds, InferenceEngine, PipelineError, Point, Raster, SegmentSession,
    SegmentationPrompt, Tensor,
};

#[derive(Clone, Default)]
struct FakeEncoder {
    calls: Arc<Mutex<usize>>,
    fail: bool,
}

impl FakeEncoder {
    fn calls(&self) -> usize {
        *self.calls.lock().expect("lock calls")
    }
}

impl InferenceEngine for FakeEncoder {
    async fn run(&self, feeds: Feeds) -> Result<Feeds, EngineError> {
        *self.calls.lock().expect("lock calls") += 1;
        if self.fail {
            return Err("encoder unavailable".into());
        }
        let input = feeds.get("x").ok_or("missing x")?;
        assert_eq!(input.shape(), &[1, 3, 1024, 1024]);

        // 用输入的第一个值填充，方便区分不同图片的嵌入
        let marker = input.data()[0];
        let embedding =
            Tensor::filled(vec![1, 256, 64, 64], marker).map_err(|e| e.to_string())?;
        let mut out = Feeds::new();
        out.insert("embeddings".to_string(), embedding);
        Ok(out)
    }

    fn output_names(&self) -> Vec<String> {
        vec!["embeddings".to_string()]
    }
}

/// 记录收到的输入，并在 (10..=12, 10..=12) 输出前景块。
#[derive(Clone, Default)]
struct RecordingDecoder {
    last_feeds: Arc<Mutex<Option<Feeds>>>,
}

impl RecordingDecoder {
    fn last(&self) -> Feeds {
        self.last_feeds
            .lock()
            .expect("lock feeds")
            .clone()
            .expect("decoder was called")
    }
}

impl InferenceEngine for RecordingDecoder {
    async fn run(&self, feeds: Feeds) -> Result<Feeds, EngineError> {
        let size = feeds.get(DECODER_ORIG_SIZE).ok_or("missing orig_im_size")?;
        let (h, w) = (size.data()[0] as usize, size.data()[1] as usize);

        let mut logits = vec![-4.0; h * w];
        for y in 10..=12.min(h - 1) {
            for x in 10..=12.min(w - 1) {
                logits[y * w + x] = 2.5;
            }
        }
        *self.last_feeds.lock().expect("lock feeds") = Some(feeds);

        let mut out = Feeds::new();
        out.insert(
            DECODER_MASKS.to_string(),
            Tensor::new(logits, vec![1, 1, h, w]).map_err(|e| e.to_string())?,
        );
        Ok(out)
    }

    fn output_names(&self) -> Vec<String> {
        vec![DECODER_MASKS.to_string(), "iou_predictions".to_string()]
    }
}

fn session() -> (
    SegmentSession<FakeEncoder, RecordingDecoder>,
    FakeEncoder,
    RecordingDecoder,
) {
    let encoder = FakeEncoder::default();
    let decoder = RecordingDecoder::default();
    let session = SegmentSession::new(encoder.clone(), decoder.clone(), SegmentOptions::default());
    (session, encoder, decoder)
}

#[tokio::test]
async fn click_is_mapped_into_model_space() {
    let (mut session, _, decoder) = session();
    session.load_image(Raster::filled(2000, 1000, [40, 40, 40, 255]));

    let prompt = SegmentationPrompt::new().with_point(Point::positive(1000.0, 500.0));
    let result = session.segment(&prompt).await.expect("segment should succeed");

    let feeds = decoder.last();
    let coords = feeds[DECODER_POINT_COORDS].data();
    assert!((coords[0] - 512.0).abs() < 1e-3);
    assert!((coords[1] - 256.0).abs() < 1e-3);
    assert_eq!(feeds[DECODER_POINT_LABELS].data(), &[LABEL_POSITIVE, LABEL_PADDING]);
    assert_eq!(feeds[DECODER_ORIG_SIZE].data(), &[1000.0, 2000.0]);

    assert_eq!((result.mask.width(), result.mask.height()), (2000, 1000));
    assert_eq!(result.mask.foreground_count(), 9);
    let bbox = result.mask.bbox();
    assert_eq!((bbox.top_left.x, bbox.top_left.y), (10.0, 10.0));
    assert_eq!((bbox.bottom_right.x, bbox.bottom_right.y), (12.0, 12.0));
}

#[tokio::test]
async fn repeated_prompts_reuse_cached_embedding() {
    let (mut session, encoder, _) = session();
    session.load_image(Raster::filled(300, 200, [0, 0, 0, 255]));

    session.embed().await.expect("first embed");
    session.embed().await.expect("second embed");
    for x in [10.0, 50.0, 90.0] {
        let prompt = SegmentationPrompt::new().with_point(Point::positive(x, 20.0));
        session.segment(&prompt).await.expect("segment should succeed");
    }

    assert_eq!(encoder.calls(), 1);
    assert_eq!(session.state(), SessionState::Masked);
}

#[tokio::test]
async fn loading_new_image_invalidates_embedding() {
    let (mut session, encoder, _) = session();
    let first = session.load_image(Raster::filled(64, 64, [0, 0, 0, 255]));
    let first_embedding = session.embed().await.expect("embed first").clone();

    let second = session.load_image(Raster::filled(64, 64, [255, 255, 255, 255]));
    assert_ne!(first, second);
    assert!(session.embedding().is_none());
    assert!(session.last_mask().is_none());
    assert_eq!(session.state(), SessionState::Unloaded);

    let second_embedding = session.embed().await.expect("embed second").clone();
    assert_eq!(encoder.calls(), 2);
    assert_ne!(first_embedding, second_embedding);
}

#[tokio::test]
async fn prompt_for_replaced_image_is_stale() {
    let (mut session, _, _) = session();
    let first = session.load_image(Raster::filled(32, 32, [0, 0, 0, 255]));
    let second = session.load_image(Raster::filled(32, 32, [0, 0, 0, 255]));

    let prompt = SegmentationPrompt::new()
        .for_image(first)
        .with_point(Point::positive(1.0, 1.0));
    let err = session.segment(&prompt).await.expect_err("stale prompt");

    match err {
        PipelineError::StaleImage { requested, current } => {
            assert_eq!(requested, first.value());
            assert_eq!(current, second.value());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn encoder_failure_propagates_without_caching() {
    let encoder = FakeEncoder {
        fail: true,
        ..FakeEncoder::default()
    };
    let mut session =
        SegmentSession::new(encoder.clone(), RecordingDecoder::default(), SegmentOptions::default());
    session.load_image(Raster::filled(16, 16, [0, 0, 0, 255]));

    let err = session
        .segment(&SegmentationPrompt::new())
        .await
        .expect_err("encoder should fail");

    assert!(matches!(err, PipelineError::InferenceEngine(_)));
    assert!(err.to_string().contains("encoder unavailable"));
    assert!(session.embedding().is_none());
    assert!(session.last_mask().is_none());
    assert_eq!(encoder.calls(), 1);
}

#[tokio::test]
async fn empty_prompt_is_rejected_when_fallback_disabled() {
    let options = SegmentOptions {
        prompt: PromptOptions {
            empty_prompt: EmptyPromptPolicy::Reject,
            ..PromptOptions::default()
        },
        ..SegmentOptions::default()
    };
    let encoder = FakeEncoder::default();
    let mut session = SegmentSession::new(encoder.clone(), RecordingDecoder::default(), options);
    session.load_image(Raster::filled(16, 16, [0, 0, 0, 255]));

    let err = session
        .segment(&SegmentationPrompt::new())
        .await
        .expect_err("empty prompt rejected");

    assert!(matches!(err, PipelineError::MissingPrompt));
    // 提示先于编码校验，无效提示不会启动编码器
    assert_eq!(encoder.calls(), 0);
    assert!(session.embedding().is_none());
    assert_eq!(session.state(), SessionState::Unloaded);
}

#[tokio::test]
async fn empty_prompt_submits_neutral_point_by_default() {
    let (mut session, _, decoder) = session();
    session.load_image(Raster::filled(16, 16, [0, 0, 0, 255]));

    session
        .segment(&SegmentationPrompt::new())
        .await
        .expect("neutral prompt should decode");

    let feeds = decoder.last();
    assert_eq!(feeds[DECODER_POINT_COORDS].data(), &[0.0, 0.0]);
    assert_eq!(feeds[DECODER_POINT_LABELS].data(), &[LABEL_PADDING]);
}

#[tokio::test]
async fn segment_without_image_fails() {
    let (mut session, encoder, _) = session();
    let err = session
        .segment(&SegmentationPrompt::new())
        .await
        .expect_err("no image loaded");

    assert!(matches!(err, PipelineError::NoImageLoaded));
    assert_eq!(encoder.calls(), 0);
}

/// 无论原图多大都输出 256x256 的低分辨率 logits。
struct LowResDecoder;

impl InferenceEngine for LowResDecoder {
    async fn run(&self, _feeds: Feeds) -> Result<Feeds, EngineError> {
        let mut out = Feeds::new();
        out.insert(
            DECODER_MASKS.to_string(),
            Tensor::filled(vec![1, 1, 256, 256], 1.0).map_err(|e| e.to_string())?,
        );
        Ok(out)
    }

    fn output_names(&self) -> Vec<String> {
        vec![DECODER_MASKS.to_string()]
    }
}

/// 输出元素数不对的嵌入。
struct TruncatedEncoder;

impl InferenceEngine for TruncatedEncoder {
    async fn run(&self, _feeds: Feeds) -> Result<Feeds, EngineError> {
        let mut out = Feeds::new();
        out.insert(
            "embeddings".to_string(),
            Tensor::zeros(vec![1, 256, 64, 63]).map_err(|e| e.to_string())?,
        );
        Ok(out)
    }

    fn output_names(&self) -> Vec<String> {
        vec!["embeddings".to_string()]
    }
}

#[tokio::test]
async fn decoder_output_at_wrong_resolution_is_rejected() {
    let mut session = SegmentSession::new(
        FakeEncoder::default(),
        LowResDecoder,
        SegmentOptions::default(),
    );
    session.load_image(Raster::filled(40, 30, [0, 0, 0, 255]));

    let err = session
        .segment(&SegmentationPrompt::new().with_point(Point::positive(5.0, 5.0)))
        .await
        .expect_err("256x256 logits do not match a 40x30 image");

    assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    assert_eq!(session.state(), SessionState::Embedded);
    assert!(session.embedding().is_some());
    assert!(session.last_mask().is_none());
}

#[tokio::test]
async fn encoder_output_with_wrong_length_is_not_cached() {
    let mut session = SegmentSession::new(
        TruncatedEncoder,
        RecordingDecoder::default(),
        SegmentOptions::default(),
    );
    session.load_image(Raster::filled(40, 30, [0, 0, 0, 255]));

    let err = session
        .segment(&SegmentationPrompt::new())
        .await
        .expect_err("truncated embedding");

    assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    assert!(session.embedding().is_none());
    assert_eq!(session.state(), SessionState::Unloaded);
}
