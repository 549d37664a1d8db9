//! PNG rendering of chart specs with plotters.

use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::chart::{CategoryCount, ChartBody, ChartSpec, Series, TreemapNode};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
}

/// Upper bound on the RGB buffer backing one image.
const MAX_BUFFER_BYTES: usize = 1 << 30;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// d3 category10, the default qualitative palette.
const CATEGORY10: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn palette(index: usize) -> RGBColor {
    CATEGORY10[index % CATEGORY10.len()]
}

/// Sequential white-to-red shade for `value` on a 0..=max scale.
fn shade(value: u64, max: u64) -> RGBColor {
    let t = if max == 0 { 0.0 } else { value as f64 / max as f64 };
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    RGBColor(lerp(255, 165), lerp(245, 15), lerp(240, 21))
}

/// Render one chart to PNG bytes.
pub fn render_chart(chart: &ChartSpec, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 {
        anyhow::bail!("Cannot render a {}x{} image", width, height);
    }
    let size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .filter(|&n| n <= MAX_BUFFER_BYTES)
        .with_context(|| format!("Image size {}x{} is too large", width, height))?;
    let mut buffer = vec![0u8; size];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;

        let title = chart.title.as_str();
        match &chart.body {
            ChartBody::Line { points, .. } => draw_line(&root, title, points)?,
            ChartBody::Bar { bars, .. } => {
                let colors: Vec<RGBColor> = bars.iter().map(|_| palette(0)).collect();
                draw_bars(&root, title, bars, &colors)?
            }
            ChartBody::StackedBar { categories, series, .. } => {
                draw_stacked(&root, title, categories, series)?
            }
            ChartBody::Pie { slices, .. } => draw_pie(&root, title, slices)?,
            ChartBody::HorizontalBar { bars, orientation, .. } => {
                if orientation == "v" {
                    let colors: Vec<RGBColor> = bars.iter().map(|_| palette(0)).collect();
                    draw_bars(&root, title, bars, &colors)?
                } else {
                    draw_horizontal_bars(&root, title, bars)?
                }
            }
            ChartBody::Choropleth { regions, .. } => {
                let max = regions.iter().map(|r| r.count).max().unwrap_or(0);
                let colors: Vec<RGBColor> = regions.iter().map(|r| shade(r.count, max)).collect();
                draw_bars(&root, title, regions, &colors)?
            }
            ChartBody::Treemap { nodes, .. } => draw_treemap(&root, title, nodes)?,
            ChartBody::Heatmap { rows, column_labels, cells, .. } => {
                draw_heatmap(&root, title, rows, column_labels, cells)?
            }
            ChartBody::Placeholder { message } => draw_placeholder(&root, title, message)?,
        }

        root.present().context("Failed to present drawing")?;
    }
    encode_png(&buffer, width, height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }
    Ok(png_bytes)
}

fn max_count(items: &[CategoryCount]) -> f64 {
    let max = items.iter().map(|c| c.count).max().unwrap_or(0) as f64;
    (max * 1.1).max(1.0)
}

fn category_label(labels: &[String], x: f64) -> String {
    if x < 0.0 {
        return String::new();
    }
    labels.get(x as usize).cloned().unwrap_or_default()
}

fn draw_line(root: &Area<'_>, title: &str, points: &[CategoryCount]) -> Result<()> {
    let labels: Vec<String> = points.iter().map(|p| p.category.clone()).collect();
    let n = points.len();

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..n as f64, 0.0..max_count(points))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_labels(n.min(12))
        .x_label_formatter(&|x| category_label(&labels, *x))
        .draw()
        .context("Failed to draw mesh")?;

    let series: Vec<(f64, f64)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64 + 0.5, p.count as f64))
        .collect();
    chart
        .draw_series(LineSeries::new(series, palette(0).stroke_width(2)))
        .context("Failed to draw line series")?;
    Ok(())
}

fn draw_bars(root: &Area<'_>, title: &str, bars: &[CategoryCount], colors: &[RGBColor]) -> Result<()> {
    let labels: Vec<String> = bars.iter().map(|b| b.category.clone()).collect();
    let n = bars.len();

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..n as f64, 0.0..max_count(bars))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| category_label(&labels, *x))
        .draw()
        .context("Failed to draw mesh")?;

    let bar_width = 0.8;
    chart
        .draw_series(bars.iter().zip(colors).enumerate().map(|(idx, (bar, color))| {
            let x_center = idx as f64 + 0.5;
            Rectangle::new(
                [
                    (x_center - bar_width / 2.0, 0.0),
                    (x_center + bar_width / 2.0, bar.count as f64),
                ],
                color.filled(),
            )
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

fn draw_stacked(root: &Area<'_>, title: &str, categories: &[String], series: &[Series]) -> Result<()> {
    let n = categories.len();
    let max_stack = (0..n)
        .map(|i| series.iter().map(|s| s.counts[i]).sum::<u64>())
        .max()
        .unwrap_or(0) as f64;

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..n as f64, 0.0..(max_stack * 1.1).max(1.0))
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x| category_label(categories, *x))
        .draw()
        .context("Failed to draw mesh")?;

    let bar_width = 0.8;
    for cat_idx in 0..n {
        let x_center = cat_idx as f64 + 0.5;
        let mut y_cumulative = 0.0;
        for (series_idx, s) in series.iter().enumerate() {
            let y_val = s.counts[cat_idx] as f64;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [
                        (x_center - bar_width / 2.0, y_cumulative),
                        (x_center + bar_width / 2.0, y_cumulative + y_val),
                    ],
                    palette(series_idx).filled(),
                )))
                .context("Failed to draw bar")?;
            y_cumulative += y_val;
        }
    }
    Ok(())
}

fn draw_horizontal_bars(root: &Area<'_>, title: &str, bars: &[CategoryCount]) -> Result<()> {
    // Most frequent value on top.
    let labels: Vec<String> = bars.iter().rev().map(|b| b.category.clone()).collect();
    let n = bars.len();

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0.0..max_count(bars), 0.0..n as f64)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&|y| category_label(&labels, *y))
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(bars.iter().enumerate().map(|(idx, bar)| {
            let y = (n - 1 - idx) as f64;
            Rectangle::new(
                [(0.0, y + 0.1), (bar.count as f64, y + 0.9)],
                palette(0).filled(),
            )
        }))
        .context("Failed to draw bars")?;
    Ok(())
}

/// Polygon approximating a pie wedge between two angles (radians, clockwise from 12 o'clock).
fn wedge(center: (i32, i32), radius: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start) / std::f64::consts::TAU) * 90.0).ceil().max(2.0) as usize;
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for step in 0..=steps {
        let angle = start + (end - start) * step as f64 / steps as f64;
        points.push((
            center.0 + (radius * angle.sin()).round() as i32,
            center.1 - (radius * angle.cos()).round() as i32,
        ));
    }
    points
}

fn draw_pie(root: &Area<'_>, title: &str, slices: &[CategoryCount]) -> Result<()> {
    let area = root
        .titled(title, ("sans-serif", 20).into_font())
        .context("Failed to draw title")?;
    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 3, h as i32 / 2);
    let radius = (w.min(h) as f64) * 0.4;
    let total: u64 = slices.iter().map(|s| s.count).sum();
    if total == 0 {
        anyhow::bail!("Cannot draw a pie with no values");
    }

    let mut start = 0.0;
    for (idx, slice) in slices.iter().enumerate() {
        let end = start + std::f64::consts::TAU * slice.count as f64 / total as f64;
        area.draw(&Polygon::new(wedge(center, radius, start, end), palette(idx).filled()))
            .context("Failed to draw pie slice")?;
        start = end;
    }

    // Legend
    let legend_x = (w as f64 * 0.7) as i32;
    for (idx, slice) in slices.iter().enumerate().take(20) {
        let y = 20 + idx as i32 * 22;
        area.draw(&Rectangle::new([(legend_x, y), (legend_x + 14, y + 14)], palette(idx).filled()))
            .context("Failed to draw legend")?;
        let pct = 100.0 * slice.count as f64 / total as f64;
        area.draw(&Text::new(
            format!("{} ({:.1}%)", slice.category, pct),
            (legend_x + 20, y),
            ("sans-serif", 14).into_font(),
        ))
        .context("Failed to draw legend")?;
    }
    Ok(())
}

/// Split `extent` pixels after `start` into spans proportional to `values`.
fn slice_layout(values: &[f64], start: i32, extent: i32) -> Vec<(i32, i32)> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }
    let mut spans = Vec::with_capacity(values.len());
    let mut acc = 0.0;
    for v in values {
        let from = start + (extent as f64 * acc / total).round() as i32;
        acc += v;
        let to = start + (extent as f64 * acc / total).round() as i32;
        spans.push((from, to));
    }
    spans
}

fn draw_treemap(root: &Area<'_>, title: &str, nodes: &[TreemapNode]) -> Result<()> {
    let area = root
        .titled(title, ("sans-serif", 20).into_font())
        .context("Failed to draw title")?;
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);

    let top: Vec<&TreemapNode> = nodes.iter().filter(|n| n.parent.is_empty()).collect();
    let columns = slice_layout(&top.iter().map(|n| n.value).collect::<Vec<_>>(), 0, w);

    for (idx, (node, (x0, x1))) in top.iter().zip(columns).enumerate() {
        let children: Vec<&TreemapNode> = nodes.iter().filter(|n| n.parent == node.id).collect();
        let color = palette(idx);
        if children.is_empty() {
            area.draw(&Rectangle::new([(x0, 0), (x1, h)], color.filled()))
                .context("Failed to draw treemap node")?;
        } else {
            let spans = slice_layout(&children.iter().map(|n| n.value).collect::<Vec<_>>(), 0, h);
            for (child, (y0, y1)) in children.iter().zip(spans) {
                area.draw(&Rectangle::new([(x0, y0), (x1, y1)], color.mix(0.85).filled()))
                    .context("Failed to draw treemap node")?;
                area.draw(&Rectangle::new([(x0, y0), (x1, y1)], WHITE.stroke_width(1)))
                    .context("Failed to draw treemap node")?;
                if y1 - y0 > 16 {
                    area.draw(&Text::new(child.label.clone(), (x0 + 4, y0 + 4), ("sans-serif", 12).into_font()))
                        .context("Failed to draw treemap label")?;
                }
            }
        }
        area.draw(&Rectangle::new([(x0, 0), (x1, h)], WHITE.stroke_width(3)))
            .context("Failed to draw treemap node")?;
        area.draw(&Text::new(node.label.clone(), (x0 + 4, h - 20), ("sans-serif", 14).into_font()))
            .context("Failed to draw treemap label")?;
    }
    Ok(())
}

fn draw_heatmap(
    root: &Area<'_>,
    title: &str,
    rows: &[String],
    column_labels: &[String],
    cells: &[Vec<u64>],
) -> Result<()> {
    let (n_rows, n_cols) = (rows.len(), column_labels.len());
    let max = cells.iter().flatten().copied().max().unwrap_or(0);

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(120)
        .build_cartesian_2d(0.0..n_cols as f64, 0.0..n_rows as f64)
        .context("Failed to build chart")?;

    // Row 0 is drawn at the top, like an image.
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_cols)
        .y_labels(n_rows)
        .x_label_formatter(&|x| category_label(column_labels, *x))
        .y_label_formatter(&|y| {
            let flipped = n_rows as f64 - 1.0 - y.floor();
            category_label(rows, flipped)
        })
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(cells.iter().enumerate().flat_map(|(r, row)| {
            let y = (n_rows - 1 - r) as f64;
            row.iter().enumerate().map(move |(c, &value)| {
                Rectangle::new([(c as f64, y), (c as f64 + 1.0, y + 1.0)], shade(value, max).filled())
            })
        }))
        .context("Failed to draw heatmap cells")?;
    Ok(())
}

fn draw_placeholder(root: &Area<'_>, title: &str, message: &str) -> Result<()> {
    let area = root
        .titled(title, ("sans-serif", 20).into_font())
        .context("Failed to draw title")?;
    let (w, h) = area.dim_in_pixel();
    let style = TextStyle::from(("sans-serif", 20).into_font().color(&BLACK))
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(message.to_string(), (w as i32 / 2, h as i32 / 2), style))
        .context("Failed to draw placeholder text")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shade_endpoints() {
        assert_eq!(shade(0, 10), RGBColor(255, 245, 240));
        assert_eq!(shade(10, 10), RGBColor(165, 15, 21));
        assert_eq!(shade(3, 0), RGBColor(255, 245, 240));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette(0), palette(10));
        assert_ne!(palette(0), palette(1));
    }

    #[test]
    fn test_wedge_geometry() {
        let points = wedge((100, 100), 50.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert_eq!(points[0], (100, 100));
        // Starts at 12 o'clock and ends at 3 o'clock.
        assert_eq!(points[1], (100, 50));
        assert_eq!(*points.last().unwrap(), (150, 100));
    }

    #[test]
    fn test_slice_layout_covers_extent() {
        let spans = slice_layout(&[1.0, 1.0, 2.0], 0, 400);
        assert_eq!(spans, vec![(0, 100), (100, 200), (200, 400)]);
        assert!(slice_layout(&[0.0], 0, 400).is_empty());
    }

    #[test]
    fn test_category_label_bounds() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&labels, 1.5), "b");
        assert_eq!(category_label(&labels, 2.0), "");
        assert_eq!(category_label(&labels, -0.5), "");
    }

    #[test]
    fn test_zero_sized_render_fails() {
        let chart = ChartSpec {
            id: "v".to_string(),
            title: "t".to_string(),
            body: ChartBody::Placeholder { message: "No Data Available".to_string() },
        };
        let options = RenderOptions { width: 0, height: 10 };
        assert!(render_chart(&chart, &options).is_err());
    }

    #[test]
    fn test_oversized_render_fails() {
        let chart = ChartSpec {
            id: "v".to_string(),
            title: "t".to_string(),
            body: ChartBody::Placeholder { message: "No Data Available".to_string() },
        };
        for (width, height) in [(u32::MAX, u32::MAX), (50_000, 50_000)] {
            let err = render_chart(&chart, &RenderOptions { width, height }).unwrap_err();
            assert!(err.to_string().contains("too large"));
        }
    }
}
