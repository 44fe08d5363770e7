//! Last-resort route for solids the host builder refuses: write the solid
//! to a neutral interchange file, import it into a scratch document and copy
//! the result out. Face materials do not survive the trip.

use std::io::Write;
use std::path::Path;

use crate::geom::{Brep, Surface};
use crate::host::interchange::{InterchangeDocument, InterchangeFace, InterchangeLoop, InterchangePoint, InterchangeSolid};
use crate::host::{BrepKind, HostError, HostKernel, HostSolid, HostSurface, ScratchDocument};
use crate::knots::KnotTolerance;
use crate::units::UnitSystem;

use super::assembler::{host_surface, snapped_surface};
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};

/// Edge samples per loop polygon; lines contribute their end points only.
const SAMPLES_PER_EDGE: usize = 8;

/// Neutral document holding `brep`, which must be in host units. A NURBS
/// face the host cannot hold is written with its own surface and reported,
/// never left for the importer to flatten.
pub fn export_brep(
    brep: &Brep,
    kind: BrepKind,
    knots: &KnotTolerance,
    diagnostics: &mut Diagnostics,
) -> InterchangeDocument {
    let mut document = InterchangeDocument::new(UnitSystem::HOST.abbreviation());
    let mut solid = InterchangeSolid {
        kind: kind.as_str().to_owned(),
        faces: Vec::with_capacity(brep.faces.len()),
    };
    for (index, face) in brep.faces.iter().enumerate() {
        let mut record = InterchangeFace {
            reversed: face.reversed,
            plane: None,
            nurbs: None,
            loops: face
                .loops
                .iter()
                .map(|l| InterchangeLoop {
                    points: brep
                        .loop_polygon(face, l, SAMPLES_PER_EDGE)
                        .into_iter()
                        .map(InterchangePoint::from)
                        .collect(),
                })
                .collect(),
        };
        // Only a degenerate plane goes without a record; the importer refits it.
        match (host_surface(&face.surface, knots), &face.surface) {
            (Ok(surface), _) => record.set_surface(&surface),
            (Err(err), Surface::Nurbs(nurbs)) => {
                diagnostics.emit(
                    Diagnostic::warning(
                        DiagnosticKind::UnsupportedGeometry,
                        format!("face {index} was exported with its discontinuous surface: {err}"),
                    )
                    .with_subject(face.surface.clone()),
                );
                record.set_surface(&HostSurface::Nurbs(snapped_surface(nurbs, knots).0));
            }
            (Err(_), Surface::Plane(_)) => {}
        }
        solid.faces.push(record);
    }
    document.solids.push(solid);
    document
}

/// Writes `document` to a uniquely named temporary file, imports it into
/// `scratch` and returns a copy of the first imported solid. The file is
/// removed on every path out of this function.
pub fn import_through_file<K: HostKernel + ?Sized>(
    kernel: &K,
    document: &InterchangeDocument,
    directory: Option<&Path>,
    scratch: &mut ScratchDocument,
) -> Result<HostSolid, HostError> {
    let xml = document.to_xml_string()?;
    let mut builder = tempfile::Builder::new();
    builder.prefix("brep-").suffix(".xml");
    let mut file = match directory {
        Some(directory) => builder.tempfile_in(directory)?,
        None => builder.tempfile()?,
    };
    file.write_all(xml.as_bytes())?;
    file.flush()?;
    log::debug!("interchange file {} ({} bytes)", file.path().display(), xml.len());

    let ids = kernel.import_interchange(file.path(), scratch)?;
    ids.iter()
        .find_map(|&id| scratch.get(id))
        .cloned()
        .ok_or_else(|| HostError::Import("import produced no solid".to_owned()))
}
