//! Neutral XML interchange format read by the host importer.
//!
//! A document holds solids; each face carries its surface and its loops as
//! closed point chains already oriented along the face normal. Edges are not
//! stored, the importer rebuilds shared edges by welding chain vertices.
//! Materials are not part of the format.

use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{NurbsSurface, Point3, Vec3};

use super::{BrepKind, HostError, HostPlane, HostSurface};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("interchange i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interchange xml error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("malformed interchange document: {0}")]
    Malformed(String),
}

impl From<InterchangeError> for HostError {
    fn from(err: InterchangeError) -> Self {
        match err {
            InterchangeError::Io(e) => Self::Io(e.to_string()),
            other => Self::Import(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeDocument {
    #[serde(rename = "@version")]
    pub version: u32,
    #[serde(rename = "@units")]
    pub units: String,
    #[serde(default, rename = "solid")]
    pub solids: Vec<InterchangeSolid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeSolid {
    #[serde(rename = "@kind")]
    pub kind: String,
    #[serde(default, rename = "face")]
    pub faces: Vec<InterchangeFace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeFace {
    #[serde(rename = "@reversed")]
    pub reversed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<InterchangePlane>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurbs: Option<InterchangeNurbs>,
    #[serde(default, rename = "loop")]
    pub loops: Vec<InterchangeLoop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterchangePlane {
    #[serde(rename = "@ox")]
    pub ox: f64,
    #[serde(rename = "@oy")]
    pub oy: f64,
    #[serde(rename = "@oz")]
    pub oz: f64,
    #[serde(rename = "@xx")]
    pub xx: f64,
    #[serde(rename = "@xy")]
    pub xy: f64,
    #[serde(rename = "@xz")]
    pub xz: f64,
    #[serde(rename = "@yx")]
    pub yx: f64,
    #[serde(rename = "@yy")]
    pub yy: f64,
    #[serde(rename = "@yz")]
    pub yz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeNurbs {
    #[serde(rename = "@degree_u")]
    pub degree_u: usize,
    #[serde(rename = "@degree_v")]
    pub degree_v: usize,
    #[serde(rename = "@u_count")]
    pub u_count: usize,
    #[serde(rename = "@v_count")]
    pub v_count: usize,
    /// Space separated.
    #[serde(rename = "@knots_u")]
    pub knots_u: String,
    #[serde(rename = "@knots_v")]
    pub knots_v: String,
    #[serde(default, rename = "point")]
    pub points: Vec<InterchangePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeLoop {
    #[serde(default, rename = "point")]
    pub points: Vec<InterchangePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterchangePoint {
    #[serde(rename = "@x")]
    pub x: f64,
    #[serde(rename = "@y")]
    pub y: f64,
    #[serde(rename = "@z")]
    pub z: f64,
    #[serde(default, rename = "@w", skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
}

impl From<Point3> for InterchangePoint {
    fn from(p: Point3) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
            w: None,
        }
    }
}

impl From<InterchangePoint> for Point3 {
    fn from(p: InterchangePoint) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl InterchangeDocument {
    #[must_use]
    pub fn new(units: &str) -> Self {
        Self {
            version: FORMAT_VERSION,
            units: units.to_owned(),
            solids: Vec::new(),
        }
    }

    pub fn from_xml_str(input: &str) -> Result<Self, InterchangeError> {
        let document: Self = from_str(input)?;
        if document.version != FORMAT_VERSION {
            return Err(InterchangeError::Malformed(format!(
                "unsupported version {}",
                document.version
            )));
        }
        Ok(document)
    }

    pub fn to_xml_string(&self) -> Result<String, InterchangeError> {
        Ok(quick_xml::se::to_string_with_root("interchange", self)?)
    }
}

impl InterchangeSolid {
    #[must_use]
    pub fn brep_kind(&self) -> Option<BrepKind> {
        BrepKind::parse(&self.kind)
    }
}

impl InterchangeFace {
    pub fn set_surface(&mut self, surface: &HostSurface) {
        match surface {
            HostSurface::Plane(plane) => {
                self.plane = Some(InterchangePlane {
                    ox: plane.origin.x,
                    oy: plane.origin.y,
                    oz: plane.origin.z,
                    xx: plane.x_dir.x,
                    xy: plane.x_dir.y,
                    xz: plane.x_dir.z,
                    yx: plane.y_dir.x,
                    yy: plane.y_dir.y,
                    yz: plane.y_dir.z,
                });
            }
            HostSurface::Nurbs(nurbs) => {
                let join = |knots: &[f64]| knots.iter().map(f64::to_string).collect::<Vec<_>>().join(" ");
                self.nurbs = Some(InterchangeNurbs {
                    degree_u: nurbs.degree_u,
                    degree_v: nurbs.degree_v,
                    u_count: nurbs.u_count,
                    v_count: nurbs.v_count,
                    knots_u: join(&nurbs.knots_u),
                    knots_v: join(&nurbs.knots_v),
                    points: nurbs
                        .control_points
                        .iter()
                        .enumerate()
                        .map(|(i, p)| InterchangePoint {
                            w: nurbs.weights.as_ref().map(|w| w[i]),
                            ..InterchangePoint::from(*p)
                        })
                        .collect(),
                });
            }
        }
    }

    /// The face surface; `None` when neither a plane nor a NURBS record is present.
    pub fn surface(&self) -> Result<Option<HostSurface>, InterchangeError> {
        if let Some(p) = self.plane {
            return Ok(Some(HostSurface::Plane(HostPlane {
                origin: Point3::new(p.ox, p.oy, p.oz),
                x_dir: Vec3::new(p.xx, p.xy, p.xz),
                y_dir: Vec3::new(p.yx, p.yy, p.yz),
            })));
        }
        let Some(nurbs) = &self.nurbs else {
            return Ok(None);
        };
        let parse = |text: &str| -> Result<Vec<f64>, InterchangeError> {
            text.split_whitespace()
                .map(|k| k.parse::<f64>().map_err(|e| InterchangeError::Malformed(e.to_string())))
                .collect()
        };
        let weights = if nurbs.points.iter().any(|p| p.w.is_some()) {
            Some(nurbs.points.iter().map(|p| p.w.unwrap_or(1.0)).collect())
        } else {
            None
        };
        let surface = NurbsSurface::new(
            nurbs.degree_u,
            nurbs.degree_v,
            nurbs.u_count,
            nurbs.v_count,
            nurbs.points.iter().map(|p| Point3::from(*p)).collect(),
            parse(&nurbs.knots_u)?,
            parse(&nurbs.knots_v)?,
            weights,
        )
        .map_err(|e| InterchangeError::Malformed(e.to_string()))?;
        Ok(Some(HostSurface::Nurbs(surface)))
    }
}
