//! Decomposition of one source curve into host curve primitives.
//!
//! Every produced curve is open, at least one short-curve tolerance long and
//! one of the host's primitive kinds. Splines below degree three come out as
//! single spans; higher degree splines are split at their kinks and carry
//! clean knot vectors. Source order and direction are preserved.

use crate::geom::{Arc3, Conic, Curve, Curve3, Ellipse3, Line3, NurbsCurve3};
use crate::host::HostCurve;
use crate::knots::{KnotOwner, KnotTolerance, normalize_knots};
use crate::units::GeometryTolerance;

use super::error::ConversionError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub curves: Vec<HostCurve>,
    /// Pieces shorter than the short-curve tolerance, left out of `curves`.
    pub dropped: Vec<Curve>,
    /// Knot values a spline was split at.
    pub kinks: Vec<f64>,
    /// Near-duplicate knots that were snapped.
    pub snapped_knots: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    tolerance: GeometryTolerance,
    knots: KnotTolerance,
}

impl Segmenter {
    /// `tolerance` must be expressed in the units of the curves passed in.
    #[must_use]
    pub const fn new(tolerance: GeometryTolerance, knots: KnotTolerance) -> Self {
        Self { tolerance, knots }
    }

    pub fn segment(&self, curve: &Curve) -> Result<Segmentation, ConversionError> {
        if !self.tolerance.is_initialized() {
            return Err(ConversionError::ToleranceUnavailable);
        }
        let mut out = Segmentation::default();
        self.push_curve(curve, &mut out)?;
        log::trace!(
            "{} -> {} segment(s), {} dropped",
            curve.kind_name(),
            out.curves.len(),
            out.dropped.len()
        );
        if out.curves.is_empty() {
            return Err(ConversionError::unsupported(
                curve.kind_name(),
                format!("no piece is longer than {}", self.tolerance.short_curve),
            ));
        }
        Ok(out)
    }

    fn push_curve(&self, curve: &Curve, out: &mut Segmentation) -> Result<(), ConversionError> {
        match curve {
            Curve::PolyCurve(segments) => {
                for segment in segments {
                    self.push_curve(segment, out)?;
                }
            }
            Curve::Polyline(polyline) => {
                for line in polyline.segments() {
                    self.push_line(line, out);
                }
            }
            Curve::Line(line) => self.push_line(*line, out),
            _ if curve.is_closed_within(self.tolerance.closed_curve_gap()) => {
                let (head, tail) = split_closed(curve).ok_or_else(|| {
                    ConversionError::unsupported(curve.kind_name(), "closed curve could not be split")
                })?;
                self.push_curve(&head, out)?;
                self.push_curve(&tail, out)?;
            }
            Curve::Arc(arc) => self.push_host(HostCurve::Arc(positive_sweep_arc(*arc)), curve, out),
            Curve::Ellipse(ellipse) => {
                self.push_host(HostCurve::Ellipse(positive_sweep_ellipse(*ellipse)), curve, out);
            }
            Curve::Nurbs(nurbs) => self.push_nurbs(nurbs, out),
        }
        Ok(())
    }

    fn push_line(&self, line: Line3, out: &mut Segmentation) {
        self.push_host(HostCurve::Line(line), &Curve::Line(line), out);
    }

    fn push_host(&self, host: HostCurve, source: &Curve, out: &mut Segmentation) {
        if host.length() < self.tolerance.short_curve {
            out.dropped.push(source.clone());
        } else {
            out.curves.push(host);
        }
    }

    fn push_nurbs(&self, nurbs: &NurbsCurve3, out: &mut Segmentation) {
        let nurbs = nurbs.clamped();
        match nurbs.degree {
            1 => {
                for w in nurbs.control_points.windows(2) {
                    self.push_line(Line3::new(w[0], w[1]), out);
                }
            }
            2 => {
                for span in nurbs.spans() {
                    match span.as_conic(self.tolerance.vertex) {
                        Some(Conic::Line(line)) => self.push_line(line, out),
                        Some(Conic::Arc(arc)) => {
                            self.push_host(HostCurve::Arc(positive_sweep_arc(arc)), &Curve::Arc(arc), out);
                        }
                        Some(Conic::Ellipse(ellipse)) => self.push_host(
                            HostCurve::Ellipse(positive_sweep_ellipse(ellipse)),
                            &Curve::Ellipse(ellipse),
                            out,
                        ),
                        None => self.push_spline(span, out),
                    }
                }
            }
            degree => {
                let report = normalize_knots(&nurbs.knots, degree, KnotOwner::Curve, &self.knots);
                out.snapped_knots += report.snapped;
                let clean = NurbsCurve3 {
                    knots: report.knots,
                    ..nurbs
                };
                if report.kinks.is_empty() {
                    self.push_spline(clean, out);
                } else {
                    log::trace!("splitting degree {degree} spline at {:?}", report.kinks);
                    for piece in clean.split_at_parameters(&report.kinks) {
                        self.push_spline(piece, out);
                    }
                    out.kinks.extend(report.kinks);
                }
            }
        }
    }

    /// Pushes one piece that needs no further splitting, re-snapping its knots.
    fn push_spline(&self, mut piece: NurbsCurve3, out: &mut Segmentation) {
        let report = normalize_knots(&piece.knots, piece.degree, KnotOwner::Curve, &self.knots);
        out.snapped_knots += report.snapped;
        piece.knots = report.knots;
        let source = Curve::Nurbs(piece.clone());
        self.push_host(HostCurve::NurbSpline(piece), &source, out);
    }
}

/// Splits a closed curve into two open halves of equal length.
/// Halves rather than quarter points: two open pieces are all the host needs.
fn split_closed(curve: &Curve) -> Option<(Curve, Curve)> {
    match curve {
        Curve::Arc(arc) => {
            let half = 0.5 * arc.sweep_angle;
            Some((
                Curve::Arc(arc.sub_arc(arc.start_angle, half)),
                Curve::Arc(arc.sub_arc(arc.start_angle + half, half)),
            ))
        }
        Curve::Ellipse(ellipse) => {
            let half = 0.5 * ellipse.sweep_angle;
            Some((
                Curve::Ellipse(ellipse.sub_arc(ellipse.start_angle, half)),
                Curve::Ellipse(ellipse.sub_arc(ellipse.start_angle + half, half)),
            ))
        }
        Curve::Nurbs(nurbs) => {
            let clamped = Curve::Nurbs(nurbs.clamped());
            let t = clamped.parameter_at_length(0.5 * clamped.length());
            let Curve::Nurbs(clamped) = clamped else {
                return None;
            };
            let (head, tail) = clamped.split_at(t)?;
            Some((Curve::Nurbs(head), Curve::Nurbs(tail)))
        }
        Curve::Line(_) | Curve::Polyline(_) | Curve::PolyCurve(_) => None,
    }
}

fn positive_sweep_arc(arc: Arc3) -> Arc3 {
    if arc.sweep_angle >= 0.0 {
        return arc;
    }
    Arc3 {
        y_axis: -arc.y_axis,
        start_angle: -arc.start_angle,
        sweep_angle: -arc.sweep_angle,
        ..arc
    }
}

fn positive_sweep_ellipse(ellipse: Ellipse3) -> Ellipse3 {
    if ellipse.sweep_angle >= 0.0 {
        return ellipse;
    }
    Ellipse3 {
        y_axis: -ellipse.y_axis,
        start_angle: -ellipse.start_angle,
        sweep_angle: -ellipse.sweep_angle,
        ..ellipse
    }
}
