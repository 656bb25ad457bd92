use std::time::{Duration, Instant};

use crate::config::AcquisitionConfig;
use crate::drivers::session::write_store;
use crate::drivers::store::{PlotGroup, SeriesGroup, SharedStore};

/// Vertical space given to one digital channel; a high bit sits at 1.0.
pub const DIGITAL_LANE_HEIGHT: f64 = 1.5;

/// Drawable copy of one group, taken under the store lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupFrame {
    pub labels: Vec<String>,
    /// Per channel, runs of present points in slot order.
    pub segments: Vec<Vec<Vec<[f64; 2]>>>,
    pub cursor: usize,
    pub capacity: usize,
}

impl GroupFrame {
    pub fn capture(group: &SeriesGroup) -> Self {
        Self {
            labels: group.labels(),
            segments: group.series().iter().map(|s| s.segments()).collect(),
            cursor: group.cursor(),
            capacity: group.capacity(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.segments
            .iter()
            .flat_map(|channel| channel.iter())
            .map(Vec::len)
            .sum()
    }
}

/// Whatever draws the traces. The scheduler only pushes, it never reads back.
pub trait Renderer {
    fn update_series(&mut self, group: PlotGroup, frame: &GroupFrame);
    /// `y` is the full-scale range for analog and the per-lane range for digital.
    fn update_range(&mut self, group: PlotGroup, x: (f64, f64), y: (f64, f64));
}

/// Timer-driven redraw: analog every tick, digital every `decimation` ticks.
#[derive(Debug)]
pub struct RedrawScheduler {
    interval: Duration,
    decimation: u32,
    analog_y: (f64, f64),
    last_tick: Option<Instant>,
    ticks: u64,
    frozen_analog: bool,
    frozen_digital: bool,
    layout_dirty: bool,
}

impl RedrawScheduler {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self {
            interval: config.redraw_interval(),
            decimation: config.digital_decimation.max(1),
            analog_y: (0.0, config.analog_full_scale()),
            last_tick: None,
            ticks: 0,
            frozen_analog: false,
            frozen_digital: false,
            layout_dirty: true,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_frozen(&self, group: PlotGroup) -> bool {
        match group {
            PlotGroup::Analog => self.frozen_analog,
            PlotGroup::Digital => self.frozen_digital,
        }
    }

    /// Ranges are pushed again on the next tick.
    pub fn mark_layout_dirty(&mut self) {
        self.layout_dirty = true;
    }

    /// Runs a tick if the interval has elapsed since the last one.
    /// Returns whether anything was pushed.
    pub fn poll(&mut self, now: Instant, store: &SharedStore, renderer: &mut dyn Renderer) -> bool {
        if let Some(last) = self.last_tick {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_tick = Some(now);
        self.tick(store, renderer);
        true
    }

    fn tick(&mut self, store: &SharedStore, renderer: &mut dyn Renderer) {
        let digital_due = self.ticks % u64::from(self.decimation) == 0;
        self.ticks += 1;
        if self.layout_dirty {
            self.push_layout(store, renderer);
        }
        if !self.frozen_analog {
            redraw(PlotGroup::Analog, store, renderer);
        }
        if !self.frozen_digital && digital_due {
            redraw(PlotGroup::Digital, store, renderer);
        }
    }

    fn push_layout(&mut self, store: &SharedStore, renderer: &mut dyn Renderer) {
        let (analog_cap, digital_cap) = {
            let store = store.read().unwrap_or_else(|p| p.into_inner());
            (
                store.group(PlotGroup::Analog).capacity(),
                store.group(PlotGroup::Digital).capacity(),
            )
        };
        renderer.update_range(PlotGroup::Analog, (0.0, analog_cap as f64), self.analog_y);
        renderer.update_range(
            PlotGroup::Digital,
            (0.0, digital_cap as f64),
            (0.0, DIGITAL_LANE_HEIGHT),
        );
        self.layout_dirty = false;
    }

    /// Flips the freeze flag of one group and redraws it once.
    pub fn toggle_freeze(
        &mut self,
        group: PlotGroup,
        store: &SharedStore,
        renderer: &mut dyn Renderer,
    ) -> bool {
        let frozen = !self.is_frozen(group);
        self.set_frozen(group, frozen);
        redraw(group, store, renderer);
        frozen
    }

    pub fn freeze_both(&mut self, frozen: bool, store: &SharedStore, renderer: &mut dyn Renderer) {
        for group in [PlotGroup::Analog, PlotGroup::Digital] {
            if self.is_frozen(group) != frozen {
                self.set_frozen(group, frozen);
                redraw(group, store, renderer);
            }
        }
    }

    /// Changes the window of one group. Its samples are discarded.
    pub fn resize_window(&mut self, group: PlotGroup, capacity: usize, store: &SharedStore) {
        write_store(store).resize(group, capacity);
        self.layout_dirty = true;
    }

    fn set_frozen(&mut self, group: PlotGroup, frozen: bool) {
        match group {
            PlotGroup::Analog => self.frozen_analog = frozen,
            PlotGroup::Digital => self.frozen_digital = frozen,
        }
    }
}

fn redraw(group: PlotGroup, store: &SharedStore, renderer: &mut dyn Renderer) {
    let frame = {
        let mut store = write_store(store);
        let series = store.group_mut(group);
        series.clear_lookahead();
        GroupFrame::capture(series)
    };
    renderer.update_series(group, &frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::store::shared_store;

    /// Keeps every push for inspection.
    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<(PlotGroup, GroupFrame)>,
        ranges: Vec<(PlotGroup, (f64, f64), (f64, f64))>,
    }

    impl RecordingRenderer {
        fn count(&self, group: PlotGroup) -> usize {
            self.frames.iter().filter(|(g, _)| *g == group).count()
        }
    }

    impl Renderer for RecordingRenderer {
        fn update_series(&mut self, group: PlotGroup, frame: &GroupFrame) {
            self.frames.push((group, frame.clone()));
        }

        fn update_range(&mut self, group: PlotGroup, x: (f64, f64), y: (f64, f64)) {
            self.ranges.push((group, x, y));
        }
    }

    fn setup(decimation: u32) -> (AcquisitionConfig, SharedStore) {
        let config = AcquisitionConfig {
            analog_capacity: 100,
            digital_capacity: 50,
            digital_decimation: decimation,
            ..Default::default()
        };
        let store = shared_store(&config);
        (config, store)
    }

    #[test]
    fn digital_redraws_every_nth_tick() {
        let (config, store) = setup(4);
        let mut scheduler = RedrawScheduler::new(&config);
        let mut renderer = RecordingRenderer::default();
        let t0 = Instant::now();
        for i in 0..8 {
            assert!(scheduler.poll(t0 + scheduler.interval() * i, &store, &mut renderer));
        }
        assert_eq!(renderer.count(PlotGroup::Analog), 8);
        assert_eq!(renderer.count(PlotGroup::Digital), 2);
    }

    #[test]
    fn poll_waits_for_interval() {
        let (config, store) = setup(1);
        let mut scheduler = RedrawScheduler::new(&config);
        let mut renderer = RecordingRenderer::default();
        let t0 = Instant::now();
        assert!(scheduler.poll(t0, &store, &mut renderer));
        assert!(!scheduler.poll(t0 + Duration::from_millis(10), &store, &mut renderer));
        assert!(scheduler.poll(t0 + Duration::from_millis(40), &store, &mut renderer));
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn layout_pushed_once_until_dirty() {
        let (config, store) = setup(1);
        let mut scheduler = RedrawScheduler::new(&config);
        let mut renderer = RecordingRenderer::default();
        let t0 = Instant::now();
        scheduler.poll(t0, &store, &mut renderer);
        scheduler.poll(t0 + Duration::from_secs(1), &store, &mut renderer);
        assert_eq!(renderer.ranges.len(), 2);
        assert_eq!(renderer.ranges[0], (PlotGroup::Analog, (0.0, 100.0), (0.0, 5.0)));
        assert_eq!(
            renderer.ranges[1],
            (PlotGroup::Digital, (0.0, 50.0), (0.0, DIGITAL_LANE_HEIGHT))
        );

        scheduler.resize_window(PlotGroup::Analog, 200, &store);
        scheduler.poll(t0 + Duration::from_secs(2), &store, &mut renderer);
        assert_eq!(renderer.ranges.len(), 4);
        assert_eq!(renderer.ranges[2].1, (0.0, 200.0));
    }

    #[test]
    fn frozen_group_is_not_redrawn() {
        let (config, store) = setup(1);
        let mut scheduler = RedrawScheduler::new(&config);
        let mut renderer = RecordingRenderer::default();
        assert!(scheduler.toggle_freeze(PlotGroup::Analog, &store, &mut renderer));
        assert_eq!(renderer.count(PlotGroup::Analog), 1);
        let t0 = Instant::now();
        scheduler.poll(t0, &store, &mut renderer);
        assert_eq!(renderer.count(PlotGroup::Analog), 1);
        assert_eq!(renderer.count(PlotGroup::Digital), 1);

        scheduler.freeze_both(true, &store, &mut renderer);
        assert!(scheduler.is_frozen(PlotGroup::Digital));
        assert_eq!(renderer.count(PlotGroup::Analog), 1, "already frozen");
        assert_eq!(renderer.count(PlotGroup::Digital), 2);

        scheduler.freeze_both(false, &store, &mut renderer);
        assert!(!scheduler.is_frozen(PlotGroup::Analog));
        assert_eq!(renderer.count(PlotGroup::Analog), 2);
    }

    #[test]
    fn redraw_clears_lookahead_before_capture() {
        let (config, store) = setup(1);
        {
            let mut s = write_store(&store);
            let sample = crate::drivers::Sample {
                analog: vec![1.0, 2.0],
                digital: vec![0; 16],
            };
            for _ in 0..150 {
                s.record(Some(&sample));
            }
        }
        let mut scheduler = RedrawScheduler::new(&config);
        let mut renderer = RecordingRenderer::default();
        scheduler.poll(Instant::now(), &store, &mut renderer);
        let (_, frame) = &renderer.frames[0];
        assert_eq!(frame.cursor, 50);
        // Slots 51 and 52 are blanked, splitting the lap into two runs.
        let runs = &frame.segments[0];
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 51);
        assert_eq!(runs[1].len(), 47);
        assert_eq!(runs[1][0][0], 53.0);
        assert_eq!(frame.point_count(), 2 * 98);
    }
}
