use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;

use crate::drivers::error::ScopeError;
use crate::drivers::redraw::{GroupFrame, Renderer, DIGITAL_LANE_HEIGHT};
use crate::drivers::store::PlotGroup;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
    /// Caption, axis labels and legend. Needs a system font.
    pub labels: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
            labels: true,
        }
    }
}

/// Renders one group as a PNG. Digital channels are stacked, one lane each,
/// channel 0 at the top.
pub fn render_group_png(
    group: PlotGroup,
    frame: &GroupFrame,
    y_range: (f64, f64),
    style: &PlotStyle,
) -> Result<Vec<u8>, ScopeError> {
    if frame.capacity == 0 || frame.segments.is_empty() {
        return Err(ScopeError::Plot("frame has no channels".into()));
    }
    let lanes = frame.segments.len();
    let (y_min, y_max) = match group {
        PlotGroup::Analog => y_range,
        PlotGroup::Digital => (0.0, y_range.1 * lanes as f64),
    };
    let lane_offset = |channel: usize| match group {
        PlotGroup::Analog => 0.0,
        PlotGroup::Digital => (lanes - 1 - channel) as f64 * DIGITAL_LANE_HEIGHT,
    };
    let caption = match group {
        PlotGroup::Analog => "Analog",
        PlotGroup::Digital => "Digital",
    };

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.labels {
            builder
                .caption(caption, ("sans-serif", 20).into_font().color(&WHITE))
                .set_label_area_size(LabelAreaPosition::Left, 45)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart =
            builder.build_cartesian_2d(0f64..frame.capacity as f64, y_min..y_max)?;
        if style.labels {
            chart
                .configure_mesh()
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }

        for (idx, runs) in frame.segments.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            let offset = lane_offset(idx);
            for (n, run) in runs.iter().enumerate() {
                let points = run.iter().map(|[x, y]| (*x, y + offset));
                let drawn = chart.draw_series(LineSeries::new(points, &color))?;
                // 图例每个通道只登记一次
                if n == 0 && style.labels {
                    drawn
                        .label(
                            frame
                                .labels
                                .get(idx)
                                .cloned()
                                .unwrap_or_else(|| format!("Ch {idx}")),
                        )
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
                }
            }
        }
        // Write head.
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(frame.cursor as f64, y_min), (frame.cursor as f64, y_max)],
            WHITE.mix(0.3),
        )))?;
        if style.labels {
            chart
                .configure_series_labels()
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

/// Renderer that keeps the latest frame and range of each group so they can
/// be exported as images.
#[derive(Debug)]
pub struct SnapshotRenderer {
    style: PlotStyle,
    analog: Option<(GroupFrame, (f64, f64))>,
    digital: Option<(GroupFrame, (f64, f64))>,
}

impl SnapshotRenderer {
    pub fn new(style: PlotStyle) -> Self {
        Self {
            style,
            analog: None,
            digital: None,
        }
    }

    fn slot(&mut self, group: PlotGroup) -> &mut Option<(GroupFrame, (f64, f64))> {
        match group {
            PlotGroup::Analog => &mut self.analog,
            PlotGroup::Digital => &mut self.digital,
        }
    }

    pub fn frame(&self, group: PlotGroup) -> Option<&GroupFrame> {
        let slot = match group {
            PlotGroup::Analog => &self.analog,
            PlotGroup::Digital => &self.digital,
        };
        slot.as_ref().map(|(frame, _)| frame)
    }

    pub fn y_range(&self, group: PlotGroup) -> Option<(f64, f64)> {
        let slot = match group {
            PlotGroup::Analog => &self.analog,
            PlotGroup::Digital => &self.digital,
        };
        slot.as_ref().map(|(_, y)| *y)
    }

    pub fn render_png(&self, group: PlotGroup) -> Result<Vec<u8>, ScopeError> {
        let slot = match group {
            PlotGroup::Analog => &self.analog,
            PlotGroup::Digital => &self.digital,
        };
        let (frame, y) = slot
            .as_ref()
            .ok_or_else(|| ScopeError::Plot(format!("nothing drawn yet for {group:?}")))?;
        render_group_png(group, frame, *y, &self.style)
    }
}

impl Renderer for SnapshotRenderer {
    fn update_series(&mut self, group: PlotGroup, frame: &GroupFrame) {
        let default_y = match group {
            PlotGroup::Analog => (0.0, 1.0),
            PlotGroup::Digital => (0.0, DIGITAL_LANE_HEIGHT),
        };
        let slot = self.slot(group);
        let y = slot.as_ref().map_or(default_y, |(_, y)| *y);
        *slot = Some((frame.clone(), y));
    }

    fn update_range(&mut self, group: PlotGroup, _x: (f64, f64), y: (f64, f64)) {
        let slot = self.slot(group);
        if let Some((_, range)) = slot.as_mut() {
            *range = y;
        } else {
            *slot = Some((GroupFrame::default(), y));
        }
    }
}
