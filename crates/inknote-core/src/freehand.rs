//! Freehand stroke shaping.
//!
//! Turns an ordered list of pressure samples into a closed outline that can be
//! filled to render the stroke. The algorithm streamlines the input, derives a
//! per-point radius from (simulated) pressure, offsets both sides of the
//! centerline, rotates around sharp corners and closes the shape with a
//! round start cap and a flat end.

use crate::stroke::{MIN_STROKE_POINTS, Point};
use kurbo::{BezPath, Point as KPoint, Vec2};

/// How quickly simulated pressure follows drawing speed.
const RATE_OF_PRESSURE_CHANGE: f64 = 0.275;

/// Slightly more than PI so round caps fully close.
const FIXED_PI: f64 = std::f64::consts::PI + 0.0001;

/// Pressure assumed for the first sample when none was recorded.
const FIRST_POINT_PRESSURE: f64 = 0.25;

/// Pressure assumed for interpolated samples.
const FILL_PRESSURE: f64 = 0.5;

/// Centerline points closer than this to the end are skipped.
const END_NOISE_LENGTH: f64 = 3.0;

/// Outline options.
#[derive(Debug, Clone, Copy)]
pub struct OutlineOptions {
    /// Base diameter of the stroke.
    pub size: f64,
    /// How much pressure affects the radius (0 = constant width).
    pub thinning: f64,
    /// Minimum spacing of outline points, as a fraction of `size`.
    pub smoothing: f64,
    /// How strongly new samples are pulled towards the previous one.
    pub streamline: f64,
    /// Easing applied to the pressure-derived radius.
    pub easing: fn(f64) -> f64,
    /// Derive pressure from drawing speed instead of the recorded values.
    pub simulate_pressure: bool,
    /// The input is a complete stroke (the last sample is used verbatim).
    pub last: bool,
    /// Round start cap.
    pub cap_start: bool,
    /// Round end cap. When off the stroke ends flat at the last sample.
    pub cap_end: bool,
}

fn linear(t: f64) -> f64 {
    t
}

impl OutlineOptions {
    /// Fixed options used for pencil strokes of the given width.
    pub fn for_width(width: f64) -> Self {
        Self {
            size: width,
            thinning: 0.5,
            smoothing: 0.5,
            streamline: 0.5,
            easing: linear,
            simulate_pressure: true,
            last: true,
            cap_start: true,
            cap_end: false,
        }
    }
}

/// A streamlined centerline sample.
#[derive(Debug, Clone, Copy)]
struct StrokePoint {
    point: KPoint,
    pressure: f64,
    vector: Vec2,
    distance: f64,
    running_length: f64,
}

/// Outline polygon for `points`.
///
/// Fewer than two input points produce an empty outline.
pub fn stroke_outline(points: &[Point], options: &OutlineOptions) -> Vec<KPoint> {
    if points.len() < MIN_STROKE_POINTS {
        return Vec::new();
    }
    let centerline = stroke_points(points, options);
    outline_points(&centerline, options)
}

/// Filled outline path for a pencil stroke of the given width.
pub fn stroke_path(points: &[Point], width: f64) -> BezPath {
    outline_to_path(&stroke_outline(points, &OutlineOptions::for_width(width)))
}

/// Close an outline polygon into a path.
pub fn outline_to_path(outline: &[KPoint]) -> BezPath {
    let mut path = BezPath::new();
    let Some((first, rest)) = outline.split_first() else {
        return path;
    };
    path.move_to(*first);
    for point in rest {
        path.line_to(*point);
    }
    path.close_path();
    path
}

fn per(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

fn uni(v: Vec2) -> Vec2 {
    v / v.hypot()
}

fn rot_around(point: KPoint, center: KPoint, radians: f64) -> KPoint {
    let (s, c) = radians.sin_cos();
    let p = point - center;
    KPoint::new(p.x * c - p.y * s + center.x, p.x * s + p.y * c + center.y)
}

fn lerp_vec(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    a + (b - a) * t
}

fn stroke_radius(options: &OutlineOptions, pressure: f64) -> f64 {
    options.size * (options.easing)(0.5 - options.thinning * (0.5 - pressure))
}

fn simulated_pressure(previous: f64, distance: f64, size: f64) -> f64 {
    let speed = (distance / size).min(1.0);
    let rate = (1.0 - speed).min(1.0);
    (previous + (rate - previous) * (speed * RATE_OF_PRESSURE_CHANGE)).min(1.0)
}

fn stroke_points(input: &[Point], options: &OutlineOptions) -> Vec<StrokePoint> {
    let t = 0.15 + (1.0 - options.streamline) * 0.85;

    let mut samples: Vec<(KPoint, Option<f64>)> = input
        .iter()
        .map(|p| (p.position(), Some(p.pressure)))
        .collect();

    // Two samples give too little to streamline; fill in three more between them.
    if let [(first, first_pressure), (last, _)] = samples[..] {
        samples = vec![(first, first_pressure)];
        for i in 1..5 {
            samples.push((first.lerp(last, i as f64 / 4.0), None));
        }
    }

    let Some(&(origin, origin_pressure)) = samples.first() else {
        return Vec::new();
    };

    let mut result = vec![StrokePoint {
        point: origin,
        pressure: origin_pressure.filter(|p| *p >= 0.0).unwrap_or(FIRST_POINT_PRESSURE),
        vector: Vec2::new(1.0, 1.0),
        distance: 0.0,
        running_length: 0.0,
    }];

    let mut reached_minimum_length = false;
    let mut running_length = 0.0;
    let mut previous = origin;
    let max = samples.len() - 1;

    for (i, &(sample, pressure)) in samples.iter().enumerate().skip(1) {
        let point = if options.last && i == max {
            sample
        } else {
            previous.lerp(sample, t)
        };
        if point == previous {
            continue;
        }

        let distance = point.distance(previous);
        running_length += distance;

        if i < max && !reached_minimum_length {
            if running_length < options.size {
                continue;
            }
            reached_minimum_length = true;
        }

        result.push(StrokePoint {
            point,
            pressure: pressure.filter(|p| *p >= 0.0).unwrap_or(FILL_PRESSURE),
            vector: uni(previous - point),
            distance,
            running_length,
        });
        previous = point;
    }

    result[0].vector = result.get(1).map_or(Vec2::ZERO, |p| p.vector);
    result
}

fn outline_points(points: &[StrokePoint], options: &OutlineOptions) -> Vec<KPoint> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    if options.size <= 0.0 {
        return Vec::new();
    }

    let total_length = last.running_length;
    let min_distance = (options.size * options.smoothing).powi(2);

    let mut left: Vec<KPoint> = Vec::new();
    let mut right: Vec<KPoint> = Vec::new();

    let mut previous_pressure = points.iter().take(10).fold(first.pressure, |acc, curr| {
        let pressure = if options.simulate_pressure {
            simulated_pressure(acc, curr.distance, options.size)
        } else {
            curr.pressure
        };
        (acc + pressure) / 2.0
    });

    let mut radius = stroke_radius(options, last.pressure);
    let mut first_radius: Option<f64> = None;
    let mut previous_vector = first.vector;
    let mut pl = first.point;
    let mut pr = first.point;
    let mut previous_was_sharp = false;

    for (i, current) in points.iter().enumerate() {
        let is_last = i == points.len() - 1;
        if !is_last && total_length - current.running_length < END_NOISE_LENGTH {
            continue;
        }

        let mut pressure = current.pressure;
        if options.thinning != 0.0 {
            if options.simulate_pressure {
                pressure = simulated_pressure(previous_pressure, current.distance, options.size);
            }
            radius = stroke_radius(options, pressure);
        } else {
            radius = options.size / 2.0;
        }
        if first_radius.is_none() {
            first_radius = Some(radius);
        }
        radius = radius.max(0.01);

        let next_vector = if is_last { current.vector } else { points[i + 1].vector };
        let next_dpr = if is_last { 1.0 } else { current.vector.dot(next_vector) };
        let previous_dpr = current.vector.dot(previous_vector);

        let is_sharp = previous_dpr < 0.0 && !previous_was_sharp;
        let next_is_sharp = next_dpr < 0.0;

        if is_sharp || next_is_sharp {
            let offset = per(previous_vector) * radius;
            let step = 1.0 / 13.0;
            let mut t = 0.0;
            let mut tl = pl;
            let mut tr = pr;
            while t <= 1.0 {
                tl = rot_around(current.point - offset, current.point, FIXED_PI * t);
                left.push(tl);
                tr = rot_around(current.point + offset, current.point, FIXED_PI * -t);
                right.push(tr);
                t += step;
            }
            pl = tl;
            pr = tr;
            if next_is_sharp {
                previous_was_sharp = true;
            }
            continue;
        }

        previous_was_sharp = false;

        if is_last {
            let offset = per(current.vector) * radius;
            left.push(current.point - offset);
            right.push(current.point + offset);
            continue;
        }

        let offset = per(lerp_vec(next_vector, current.vector, next_dpr)) * radius;

        let tl = current.point - offset;
        if i <= 1 || (pl - tl).hypot2() > min_distance {
            left.push(tl);
            pl = tl;
        }

        let tr = current.point + offset;
        if i <= 1 || (pr - tr).hypot2() > min_distance {
            right.push(tr);
            pr = tr;
        }

        previous_pressure = pressure;
        previous_vector = current.vector;
    }

    let first_point = first.point;

    if points.len() == 1 {
        // Every sample collapsed onto one spot: draw a dot.
        let last_point = first_point + Vec2::new(1.0, 1.0);
        let start = first_point + uni(per(first_point - last_point)) * -first_radius.unwrap_or(radius);
        let step = 1.0 / 13.0;
        let mut dot = Vec::new();
        let mut t = step;
        while t <= 1.0 {
            dot.push(rot_around(start, first_point, FIXED_PI * 2.0 * t));
            t += step;
        }
        return dot;
    }

    let last_point = last.point;

    let mut start_cap = Vec::new();
    match (left.first(), right.first()) {
        (_, Some(&right_first)) if options.cap_start => {
            let step = 1.0 / 13.0;
            let mut t = step;
            while t <= 1.0 {
                start_cap.push(rot_around(right_first, first_point, FIXED_PI * t));
                t += step;
            }
        }
        (Some(&left_first), Some(&right_first)) => {
            let corners = left_first - right_first;
            let offset_a = corners * 0.5;
            let offset_b = corners * 0.51;
            start_cap.extend([
                first_point - offset_a,
                first_point - offset_b,
                first_point + offset_b,
                first_point + offset_a,
            ]);
        }
        _ => {}
    }

    let direction = per(-last.vector);
    let mut end_cap = Vec::new();
    if options.cap_end {
        let start = last_point + direction * radius;
        let step = 1.0 / 29.0;
        let mut t = step;
        while t < 1.0 {
            end_cap.push(rot_around(start, last_point, FIXED_PI * 3.0 * t));
            t += step;
        }
    } else {
        end_cap.extend([
            last_point + direction * radius,
            last_point + direction * (radius * 0.99),
            last_point - direction * (radius * 0.99),
            last_point - direction * radius,
        ]);
    }

    let mut outline = left;
    outline.extend(end_cap);
    outline.extend(right.into_iter().rev());
    outline.extend(start_cap);
    outline
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{PathEl, Shape};

    fn diagonal() -> Vec<Point> {
        (0..5)
            .map(|i| Point::new(i as f64 * 10.0, i as f64 * 10.0, 0.1 + 0.2 * i as f64))
            .collect()
    }

    #[test]
    fn test_empty_for_short_input() {
        let options = OutlineOptions::for_width(4.0);
        assert!(stroke_outline(&[], &options).is_empty());
        assert!(stroke_outline(&[Point::new(1.0, 1.0, 0.5)], &options).is_empty());
        assert!(stroke_path(&[Point::new(1.0, 1.0, 0.5)], 4.0).elements().is_empty());
    }

    #[test]
    fn test_outline_is_deterministic() {
        let points = diagonal();
        let a = stroke_path(&points, 4.0);
        let b = stroke_path(&points, 4.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_is_closed() {
        let path = stroke_path(&diagonal(), 4.0);
        let elements = path.elements();
        assert!(matches!(elements.first(), Some(PathEl::MoveTo(_))));
        assert!(matches!(elements.last(), Some(PathEl::ClosePath)));
        assert!(elements.len() > 10);
    }

    #[test]
    fn test_outline_surrounds_centerline() {
        let points = diagonal();
        let bounds = stroke_path(&points, 4.0).bounding_box();
        // The start cap and width extend the outline a little past the samples.
        assert!(bounds.x0 < 1.0 && bounds.y0 < 1.0);
        assert!(bounds.x1 > 39.0 && bounds.y1 > 39.0);
        assert!(bounds.x1 < 45.0 && bounds.y1 < 45.0);
    }

    #[test]
    fn test_two_points_are_enough() {
        let points = [Point::new(0.0, 0.0, 0.5), Point::new(40.0, 0.0, 0.5)];
        assert!(!stroke_outline(&points, &OutlineOptions::for_width(2.0)).is_empty());
    }

    #[test]
    fn test_coincident_points_draw_a_dot() {
        let points = [Point::new(5.0, 5.0, 0.5), Point::new(5.0, 5.0, 0.5)];
        let outline = stroke_outline(&points, &OutlineOptions::for_width(4.0));
        assert!(!outline.is_empty());
        for p in &outline {
            assert!(p.distance(KPoint::new(5.0, 5.0)) <= 4.0);
        }
    }

    #[test]
    fn test_pencil_end_is_flat() {
        let points: Vec<Point> = (0..5)
            .map(|i| Point::new(i as f64 * 10.0, 0.0, 0.5))
            .collect();

        let flat = stroke_path(&points, 8.0).bounding_box();
        assert!(flat.x1 <= 40.0 + 1e-9);

        let options = OutlineOptions {
            cap_end: true,
            ..OutlineOptions::for_width(8.0)
        };
        let round = outline_to_path(&stroke_outline(&points, &options)).bounding_box();
        assert!(round.x1 > 41.0);
    }

    #[test]
    fn test_wider_strokes_cover_more() {
        let points = diagonal();
        let thin = stroke_path(&points, 2.0).bounding_box();
        let thick = stroke_path(&points, 12.0).bounding_box();
        assert!(thick.area() > thin.area());
    }
}
