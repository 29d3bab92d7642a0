use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::*;
use crate::{
    landmarks::source::{Face, NormalizedLandmark, StaticLandmarks},
    render::frame::FrameView,
};

const W: u32 = 100;
const H: u32 = 100;

/// Landmark 0 moves onto landmark 1; landmark 2 onto landmark 3.
const TWO_GROUPS: &str = "\
# group, controlled, a0, a1, a2, wa, wb, wc
0, 0, 1, 1, 1, 1.0, 0.0, 0.0
1, 2, 3, 3, 3, 1.0, 0.0, 0.0
";

fn frame_bytes(stride: usize) -> Vec<u8> {
    let mut buf = vec![0xABu8; stride * H as usize];
    for y in 0..H as usize {
        for x in 0..W as usize {
            let o = y * stride + x * 4;
            buf[o..o + 4].copy_from_slice(&[(2 * x) as u8, (2 * y) as u8, 77, (x + y) as u8]);
        }
    }
    buf
}

fn engine(intensity: f64) -> DeformEngine {
    let config = EngineConfig {
        intensity,
        ..EngineConfig::default()
    };
    DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap()
}

fn single_control() -> Vec<Point> {
    vec![Point::new(40.0, 50.0), Point::new(50.0, 50.0)]
}

fn pixel(buf: &[u8], stride: usize, x: usize, y: usize) -> [u8; 4] {
    let o = y * stride + x * 4;
    [buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]
}

#[test]
fn zero_intensity_is_bit_identical() {
    let mut buf = frame_bytes(W as usize * 4);
    let before = buf.clone();
    let mut eng = engine(0.0);
    let outcome = {
        let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
        eng.process_landmarks(&mut frame, &single_control()).unwrap()
    };
    assert!(outcome.is_warped());
    assert_eq!(buf, before);
}

#[test]
fn warp_pulls_pixels_and_stays_inside_region() {
    let stride = W as usize * 4 + 12;
    let mut buf = frame_bytes(stride);
    let before = buf.clone();
    let mut eng = engine(1.0);
    let outcome = {
        let mut frame = FrameMut::new(&mut buf, W, H, stride, PixelFormat::Rgba8).unwrap();
        eng.process_landmarks(&mut frame, &single_control()).unwrap()
    };
    let report = outcome.report().unwrap();
    assert_eq!(report.control_points, 1);
    assert_eq!(report.regions.len(), 1);
    assert!(report.groups.is_empty());
    let region = report.regions[0];

    // Pixels at the destination come from near the source: red = 2x drops.
    let red = pixel(&buf, stride, 50, 50)[0];
    assert!(red < 92, "red at destination is {red}");

    for y in 0..H as usize {
        for x in 0..W as usize {
            let (a, b) = (pixel(&buf, stride, x, y), pixel(&before, stride, x, y));
            assert_eq!(a[3], b[3], "alpha changed at ({x},{y})");
            if !region.contains_pixel(x as u32, y as u32) {
                assert_eq!(a, b, "pixel outside region changed at ({x},{y})");
            }
        }
        let pad = y * stride + W as usize * 4;
        assert_eq!(&buf[pad..pad + 12], &before[pad..pad + 12]);
    }
}

#[test]
fn per_group_mode_warps_each_group_separately() {
    let landmarks = vec![
        Point::new(20.0, 20.0),
        Point::new(25.0, 20.0),
        Point::new(80.0, 80.0),
        Point::new(85.0, 80.0),
    ];
    let mut config = EngineConfig::default();
    config.region.mode = RegionMode::PerGroup;
    config.debug_overlay = true;
    let mut eng = DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap();
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    let report = eng
        .process_landmarks(&mut frame, &landmarks)
        .unwrap()
        .report()
        .cloned()
        .unwrap();
    assert_eq!(report.regions.len(), 2);
    assert_eq!(report.groups.len(), 2);
    assert!(!report.regions[0].contains_pixel(80, 80));

    let mut eng = engine(1.0);
    let report = eng
        .process_landmarks(&mut frame, &landmarks)
        .unwrap()
        .report()
        .cloned()
        .unwrap();
    assert_eq!(report.regions.len(), 1);
    assert!(report.regions[0].contains_inclusive(20, 20, 85, 80));
}

#[test]
fn short_landmark_array_passes_through() {
    let mut buf = frame_bytes(W as usize * 4);
    let before = buf.clone();
    let mut eng = engine(1.0);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    let outcome = eng
        .process_landmarks(&mut frame, &[Point::new(10.0, 10.0)])
        .unwrap();
    assert_eq!(outcome, FrameOutcome::PassThrough(SkipReason::TopologyMismatch));
    assert_eq!(buf, before);
}

struct WarnCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn topology_mismatch_warns_on_every_frame_even_unthrottled() {
    use tracing_subscriber::layer::SubscriberExt as _;

    let warns = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(warns.clone()));
    let config = EngineConfig {
        log_every: 0,
        ..EngineConfig::default()
    };
    let mut eng = DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap();
    let mut buf = frame_bytes(W as usize * 4);
    tracing::subscriber::with_default(subscriber, || {
        let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
        for _ in 0..3 {
            let outcome = eng
                .process_landmarks(&mut frame, &[Point::new(10.0, 10.0)])
                .unwrap();
            assert_eq!(outcome, FrameOutcome::PassThrough(SkipReason::TopologyMismatch));
        }
    });
    assert_eq!(warns.load(Ordering::SeqCst), 3);
}

#[test]
fn empty_rule_set_passes_through() {
    let mut eng = DeformEngine::from_rules(EngineConfig::default(), RuleSet::default()).unwrap();
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    assert_eq!(
        eng.process_landmarks(&mut frame, &single_control()).unwrap(),
        FrameOutcome::PassThrough(SkipReason::NoRules)
    );

    let strict = EngineConfig {
        strict_rules: true,
        ..EngineConfig::default()
    };
    assert!(DeformEngine::from_rules(strict, RuleSet::default()).is_err());
}

#[test]
fn landmarks_off_frame_give_region_out_of_bounds() {
    let mut eng = engine(1.0);
    let far = vec![Point::new(500.0, 500.0), Point::new(520.0, 500.0)];
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    assert_eq!(
        eng.process_landmarks(&mut frame, &far).unwrap(),
        FrameOutcome::PassThrough(SkipReason::RegionOutOfBounds)
    );
}

fn face(points: &[(f64, f64)]) -> Face {
    Face {
        landmarks: points
            .iter()
            .map(|&(x, y)| NormalizedLandmark { x, y, z: 0.0 })
            .collect(),
    }
}

#[test]
fn no_face_drops_or_passes_through() {
    let mut none = StaticLandmarks::default();
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();

    let mut eng = engine(1.0);
    assert_eq!(
        eng.process_frame(&mut frame, 0, &mut none).unwrap(),
        FrameOutcome::PassThrough(SkipReason::NoFace)
    );

    let config = EngineConfig {
        drop_when_no_face: true,
        ..EngineConfig::default()
    };
    let mut eng = DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap();
    assert_eq!(eng.process_frame(&mut frame, 0, &mut none).unwrap(), FrameOutcome::Drop);
}

#[test]
fn first_face_is_converted_to_pixels() {
    let mut source = StaticLandmarks::new(vec![
        face(&[(0.4, 0.5), (0.5, 0.5)]),
        face(&[(0.9, 0.9)]),
    ]);
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    let mut eng = engine(1.0);
    let outcome = eng.process_frame(&mut frame, 40_000, &mut source).unwrap();
    assert_eq!(outcome.report().map(|r| r.control_points), Some(1));
    assert_eq!(eng.frames_processed(), 1);
}

struct Failing;

impl LandmarkSource for Failing {
    fn detect(&mut self, _: &FrameView<'_>, _: i64) -> WarpResult<Vec<Face>> {
        Err(WarpError::validation("model not loaded"))
    }
}

#[derive(Default)]
struct Recording(Vec<i64>);

impl LandmarkSource for Recording {
    fn detect(&mut self, _: &FrameView<'_>, ts: i64) -> WarpResult<Vec<Face>> {
        self.0.push(ts);
        Ok(Vec::new())
    }
}

#[test]
fn detector_failure_is_not_an_error() {
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    let mut eng = engine(1.0);
    assert_eq!(
        eng.process_frame(&mut frame, 0, &mut Failing).unwrap(),
        FrameOutcome::PassThrough(SkipReason::DetectorFailed)
    );
}

#[test]
fn timestamps_can_be_ignored() {
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    let mut rec = Recording::default();

    let mut eng = engine(1.0);
    eng.process_frame(&mut frame, 1234, &mut rec).unwrap();

    let config = EngineConfig {
        ignore_timestamps: true,
        ..EngineConfig::default()
    };
    let mut eng = DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap();
    eng.process_frame(&mut frame, 1234, &mut rec).unwrap();
    assert_eq!(rec.0, vec![1234, 0]);
}

#[derive(Default)]
struct ModelSource {
    loaded: Vec<std::path::PathBuf>,
    fail: bool,
}

impl LandmarkSource for ModelSource {
    fn detect(&mut self, _: &FrameView<'_>, _: i64) -> WarpResult<Vec<Face>> {
        Ok(Vec::new())
    }

    fn load_model(&mut self, path: &std::path::Path) -> WarpResult<()> {
        if self.fail {
            return Err(WarpError::validation("bad model"));
        }
        self.loaded.push(path.to_path_buf());
        Ok(())
    }
}

#[test]
fn model_path_is_handed_to_the_source() {
    let mut source = ModelSource::default();
    engine(1.0).prepare_source(&mut source).unwrap();
    assert!(source.loaded.is_empty());

    let config = EngineConfig {
        model_path: Some("models/face_landmarker.task".into()),
        ..EngineConfig::default()
    };
    let eng = DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).unwrap();
    eng.prepare_source(&mut source).unwrap();
    assert_eq!(
        source.loaded,
        vec![std::path::PathBuf::from("models/face_landmarker.task")]
    );

    let mut failing = ModelSource {
        fail: true,
        ..ModelSource::default()
    };
    assert!(matches!(
        eng.prepare_source(&mut failing),
        Err(WarpError::Validation(_))
    ));
}

#[derive(Default)]
struct Counting {
    controls: usize,
    fields: usize,
    patches: usize,
    max_node_shift: f64,
}

impl WarpDiagnostics for Arc<std::sync::Mutex<Counting>> {
    fn on_controls(&mut self, _: &Region, src: &[Point], dst: &[Point]) {
        assert_eq!(src.len(), dst.len());
        self.lock().unwrap().controls += 1;
    }

    fn on_field(&mut self, field: &DisplacementField) {
        let ((min_dx, max_dx), _) = field.min_max();
        let mut c = self.lock().unwrap();
        c.fields += 1;
        c.max_node_shift = c.max_node_shift.max(min_dx.abs()).max(max_dx.abs());
    }

    fn on_patch(&mut self, _: &Region, before: &Patch, after: &Patch) {
        assert_eq!(before.data().len(), after.data().len());
        self.lock().unwrap().patches += 1;
    }
}

#[test]
fn diagnostics_see_every_stage() {
    let counts = Arc::new(std::sync::Mutex::new(Counting::default()));
    let mut eng = DeformEngine::with_rules(
        EngineConfig::default(),
        RuleSet::parse(TWO_GROUPS),
        Box::new(counts.clone()),
    )
    .unwrap();
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    eng.process_landmarks(&mut frame, &single_control()).unwrap();

    let c = counts.lock().unwrap();
    assert_eq!((c.controls, c.fields, c.patches), (1, 1, 1));
    assert!(c.max_node_shift > 1.0);
}

#[test]
fn missing_rule_file_depends_on_strictness() {
    let missing = std::path::PathBuf::from("tests/data/no-such-file.dfm");
    let lenient = EngineConfig {
        rules_path: Some(missing.clone()),
        ..EngineConfig::default()
    };
    let eng = DeformEngine::new(lenient, Box::new(NoDiagnostics)).unwrap();
    assert!(eng.rules().is_none());

    let strict = EngineConfig {
        rules_path: Some(missing),
        strict_rules: true,
        ..EngineConfig::default()
    };
    let err = DeformEngine::new(strict, Box::new(NoDiagnostics)).unwrap_err();
    assert!(matches!(err, WarpError::RuleFileNotFound(_)));
}

#[test]
fn rule_file_without_rules_is_unparseable_when_strict() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("target/unit-engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("comments-only.dfm");
    std::fs::write(&path, "# nothing here\n\n1,2,3\n").unwrap();

    let strict = EngineConfig {
        rules_path: Some(path.clone()),
        strict_rules: true,
        ..EngineConfig::default()
    };
    let err = DeformEngine::new(strict, Box::new(NoDiagnostics)).unwrap_err();
    assert!(matches!(err, WarpError::RuleFileUnparseable(_)));

    let lenient = EngineConfig {
        rules_path: Some(path),
        ..EngineConfig::default()
    };
    let mut eng = DeformEngine::new(lenient, Box::new(NoDiagnostics)).unwrap();
    let mut buf = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut buf, W, H, PixelFormat::Rgba8).unwrap();
    assert_eq!(
        eng.process_landmarks(&mut frame, &single_control()).unwrap(),
        FrameOutcome::PassThrough(SkipReason::NoRules)
    );
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let config = EngineConfig {
        intensity: 42.0,
        ..EngineConfig::default()
    };
    assert!(DeformEngine::from_rules(config, RuleSet::parse(TWO_GROUPS)).is_err());
}

#[test]
fn log_throttle_fires_on_first_and_every_nth_frame() {
    let due: Vec<u64> = (1..=10).filter(|&f| log_due(f, 4)).collect();
    assert_eq!(due, vec![1, 5, 9]);
    assert!(!log_due(1, 0));
    assert!(log_due(7, 1));
}

#[test]
fn scratch_buffers_follow_frame_size() {
    let mut eng = engine(1.0);
    let mut big = frame_bytes(W as usize * 4);
    let mut frame = FrameMut::packed(&mut big, W, H, PixelFormat::Rgba8).unwrap();
    eng.process_landmarks(&mut frame, &single_control()).unwrap();

    let mut small = vec![128u8; 30 * 30 * 4];
    let mut frame = FrameMut::packed(&mut small, 30, 30, PixelFormat::Rgba8).unwrap();
    let lm = vec![Point::new(10.0, 15.0), Point::new(15.0, 15.0)];
    let report = eng.process_landmarks(&mut frame, &lm).unwrap();
    assert!(report.report().unwrap().regions[0].fits(30, 30));
    // flat image stays flat whatever the warp
    assert!(small.iter().all(|&b| b == 128));
}
