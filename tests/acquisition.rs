use std::io::Write;
use std::time::{Duration, Instant};

use hexscope::drivers::{
    shared_store, AcquisitionSession, LineLayout, ManualTransport, PlotGroup, PlotStyle,
    PumpOutcome, RedrawScheduler, Renderer, SessionState, SimulatedTransport, SnapshotRenderer,
    Transport,
};
use hexscope::AcquisitionConfig;

fn simulated(config: &AcquisitionConfig, corruption: f64) -> Box<dyn Transport> {
    Box::new(SimulatedTransport::new(LineLayout::from_config(config), 42, 0).with_corruption(corruption))
}

#[test]
fn simulated_stream_fills_window_and_redraws() {
    let config = AcquisitionConfig {
        analog_capacity: 200,
        digital_capacity: 200,
        digital_decimation: 2,
        ..Default::default()
    };
    let store = shared_store(&config);
    let mut session = AcquisitionSession::new(config.clone(), store.clone());
    session.connect(|c| Ok(simulated(c, 0.1))).unwrap();

    let mut accepted = 0;
    let mut rejected = 0;
    while accepted + rejected < 300 {
        if let PumpOutcome::Progress { accepted: a, rejected: r } = session.pump().unwrap() {
            accepted += a;
            rejected += r;
        }
    }
    assert!(rejected > 0, "corruption should produce short lines");
    let lines = accepted + rejected;
    {
        let store = store.read().unwrap();
        let analog = store.group(PlotGroup::Analog);
        assert_eq!(analog.cursor(), lines % 200);
        assert_eq!(store.group(PlotGroup::Digital).cursor(), lines % 200);
    }

    let mut scheduler = RedrawScheduler::new(&config);
    let mut view = SnapshotRenderer::new(PlotStyle {
        width: 200,
        height: 100,
        labels: false,
        ..Default::default()
    });
    let t0 = Instant::now();
    for i in 0..4 {
        scheduler.poll(t0 + Duration::from_millis(40 * i), &store, &mut view);
    }
    let frame = view.frame(PlotGroup::Analog).unwrap();
    assert_eq!(frame.capacity, 200);
    assert_eq!(frame.labels, vec!["A0", "A1"]);
    assert!(frame.point_count() > 0);
    assert_eq!(view.y_range(PlotGroup::Analog), Some((0.0, 5.0)));
    assert_eq!(view.frame(PlotGroup::Digital).unwrap().labels[0], "A5");
    assert!(view.render_png(PlotGroup::Digital).is_ok());

    let summary = session.disconnect();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(summary.rejected as usize, rejected);
}

#[test]
fn config_file_drives_line_layout() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "analog_channels": 1,
            "voltage_scale": [3.3],
            "digital_channels": 8,
            "digital_width_bits": 8,
            "bit_order": "lsb_first",
            "analog_capacity": 16,
            "digital_capacity": 16
        }}"#
    )
    .unwrap();
    let config = AcquisitionConfig::from_json_file(file.path()).unwrap();
    let store = shared_store(&config);
    let mut session = AcquisitionSession::new(config, store.clone());
    session
        .connect(|_| {
            Ok(Box::new(ManualTransport::from_chunks(["ff01\n", "00000000\n"])) as Box<dyn Transport>)
        })
        .unwrap();
    session.run().unwrap();

    let store = store.read().unwrap();
    let analog = store.group(PlotGroup::Analog);
    assert_eq!(analog.cursor(), 2);
    assert!((analog.series()[0].y()[0].unwrap() - 3.3).abs() < 1e-9);
    assert_eq!(analog.series()[0].y()[1], None, "eight characters is the wrong width here");
    let digital = store.group(PlotGroup::Digital);
    assert_eq!(digital.series()[0].y()[0], Some(1.0));
    assert_eq!(digital.series()[7].y()[0], Some(0.0));
}

struct CountingRenderer(usize);

impl Renderer for CountingRenderer {
    fn update_series(&mut self, _group: PlotGroup, _frame: &hexscope::drivers::GroupFrame) {
        self.0 += 1;
    }

    fn update_range(&mut self, _group: PlotGroup, _x: (f64, f64), _y: (f64, f64)) {}
}

#[test]
fn resize_during_stream_restarts_window() {
    let config = AcquisitionConfig {
        analog_capacity: 64,
        digital_capacity: 64,
        ..Default::default()
    };
    let store = shared_store(&config);
    let mut session = AcquisitionSession::new(config.clone(), store.clone());
    session.connect(|c| Ok(simulated(c, 0.0))).unwrap();
    for _ in 0..20 {
        session.pump().unwrap();
    }
    let mut scheduler = RedrawScheduler::new(&config);
    scheduler.resize_window(PlotGroup::Analog, 32, &store);
    {
        let store = store.read().unwrap();
        assert_eq!(store.group(PlotGroup::Analog).capacity(), 32);
        assert_eq!(store.group(PlotGroup::Analog).cursor(), 0);
    }
    for _ in 0..20 {
        session.pump().unwrap();
    }
    let mut renderer = CountingRenderer(0);
    assert!(scheduler.poll(Instant::now(), &store, &mut renderer));
    assert_eq!(renderer.0, 2);
    assert!(store.read().unwrap().group(PlotGroup::Analog).cursor() < 32);
}
