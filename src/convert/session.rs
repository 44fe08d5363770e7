//! The conversion session: one host kernel, one cache, one context stack.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use crate::geom::{Brep, Curve, GeometryValue, Mesh, Point3};
use crate::host::{BrepKind, DocumentId, HostGeometry, HostHandle, HostKernel, ScratchDocument};
use crate::units::{GeometryTolerance, Scale, ToleranceContext, ToleranceScope};

use super::assembler::{Assembler, Assembly, brep_kind};
use super::cache::{CacheStats, GeometryCache};
use super::config::{CachePolicy, EngineConfig};
use super::context::ConversionContext;
use super::decoder::decode_geometry;
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::error::ConversionError;
use super::interchange::{export_brep, import_through_file};
use super::mesh::encode_mesh;
use super::segmenter::Segmenter;
use super::signature::GeometrySignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub encoded: usize,
    pub decoded: usize,
    pub fallback_invocations: usize,
    pub discarded_faces: usize,
    pub cache: CacheStats,
}

/// Converts geometry between the source model and one host kernel.
///
/// Every value is scaled from the configured model units to host units
/// exactly once on the way in, and back on the way out.
#[derive(Debug)]
pub struct ConversionSession<K: HostKernel> {
    kernel: K,
    config: EngineConfig,
    tolerances: ToleranceContext,
    cache: GeometryCache,
    context: ConversionContext,
    stack: Vec<ConversionContext>,
    diagnostics: Diagnostics,
    scratch: Option<ScratchDocument>,
    stats: SessionStats,
}

impl<K: HostKernel> ConversionSession<K> {
    pub fn new(kernel: K, config: EngineConfig) -> Self {
        let mut tolerances = ToleranceContext::new(config.model_units, config.page_units);
        let base = kernel.tolerances();
        if base.is_initialized() {
            tolerances.initialize(base);
        } else {
            log::warn!("host kernel has no tolerances yet; conversions will fail");
        }
        Self {
            kernel,
            cache: GeometryCache::new(config.cache_policy),
            config,
            tolerances,
            context: ConversionContext::default(),
            stack: Vec::new(),
            diagnostics: Diagnostics::default(),
            scratch: None,
            stats: SessionStats::default(),
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// NaN until the host has supplied its tolerances.
    #[must_use]
    pub fn tolerance(&self, scope: ToleranceScope) -> GeometryTolerance {
        self.tolerances.get(scope)
    }

    pub fn context(&self) -> &ConversionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ConversionContext {
        &mut self.context
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn set_cache_policy(&mut self, policy: CachePolicy) {
        self.config.cache_policy = policy;
        self.cache.set_policy(policy);
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cache: self.cache.stats(),
            ..self.stats
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.entries()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain()
    }

    /// Called for every diagnostic as it is emitted.
    pub fn set_diagnostic_callback(&mut self, callback: impl FnMut(&Diagnostic) + 'static) {
        self.diagnostics.set_callback(Some(Box::new(callback)));
    }

    /// The interchange scratch document, once the fallback has needed one.
    pub fn scratch_document(&self) -> Option<&ScratchDocument> {
        self.scratch.as_ref()
    }

    /// Makes `context` current until the returned scope is dropped.
    pub fn enter_context(&mut self, context: ConversionContext) -> ContextScope<'_, K> {
        let previous = std::mem::replace(&mut self.context, context);
        self.stack.push(previous);
        ContextScope { session: self }
    }

    /// Enters `document`, keeping the current attributes only when it is the
    /// document already current.
    pub fn enter_document(&mut self, document: DocumentId) -> ContextScope<'_, K> {
        let context = self.context.entering(document);
        self.enter_context(context)
    }

    /// Pins cached geometry until the returned region is dropped.
    pub fn keep_alive(&mut self) -> KeepAliveRegion<'_, K> {
        if !self.cache.begin_region() {
            log::debug!("nested keep-alive region");
        }
        KeepAliveRegion { session: self }
    }

    /// Source geometry to host geometry.
    pub fn encode(&mut self, value: &GeometryValue) -> Result<HostHandle, ConversionError> {
        if !self.tolerances.is_initialized() {
            return Err(ConversionError::ToleranceUnavailable);
        }
        self.stats.encoded += 1;
        let factor = self.config.model_units.to_host_factor();
        let tolerance = self.tolerances.get(ToleranceScope::Internal);

        let key = self
            .cache
            .is_enabled()
            .then(|| GeometrySignature::of(value, factor, tolerance.vertex));
        if let Some(key) = key {
            if let Some(handle) = self.cache.try_get(key) {
                return Ok(handle);
            }
        }

        log::debug!("encoding {} (factor {factor})", value.kind_name());
        let scaled = value.in_other_units(factor);
        let geometry = self.dispatch(&scaled, &tolerance)?;
        let handle = Rc::new(geometry);
        if let Some(key) = key {
            self.cache.add(key, &handle);
        }
        Ok(handle)
    }

    /// Host geometry back to source geometry in model units.
    pub fn decode(&mut self, geometry: &HostGeometry) -> Result<GeometryValue, ConversionError> {
        if !self.tolerances.is_initialized() {
            return Err(ConversionError::ToleranceUnavailable);
        }
        self.stats.decoded += 1;
        log::debug!("decoding {}", geometry.kind_name());
        let tolerance = self.tolerances.get(ToleranceScope::Internal);
        let value = decode_geometry(geometry, &tolerance, &self.config.ngon, &mut self.diagnostics)?;
        Ok(value.into_other_units(self.config.model_units.to_host_factor().recip()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    fn dispatch(&mut self, value: &GeometryValue, tolerance: &GeometryTolerance) -> Result<HostGeometry, ConversionError> {
        match value {
            GeometryValue::Point(point) => Ok(HostGeometry::Point(self.kernel.create_point(*point)?)),
            GeometryValue::PointCloud(points) => self.encode_points(points),
            GeometryValue::Curve(curve) => self.encode_curve(curve, tolerance),
            GeometryValue::Surface(surface) => {
                let brep = Brep::from_surface(surface.clone(), tolerance.short_curve)
                    .map_err(|e| ConversionError::unsupported("surface", e.to_string()))?;
                self.encode_brep(&brep, tolerance)
            }
            GeometryValue::Brep(brep) => {
                brep.validate()
                    .map_err(|e| ConversionError::unsupported("brep", e.to_string()))?;
                self.encode_brep(brep, tolerance)
            }
            GeometryValue::Extrusion(extrusion) => {
                let brep = extrusion
                    .to_brep(tolerance.closed_curve_gap())
                    .map_err(|e| ConversionError::unsupported("extrusion", e.to_string()))?;
                self.encode_brep(&brep, tolerance)
            }
            GeometryValue::SubD(subd) => {
                let mesh = subd.to_mesh(self.config.subd_levels);
                let brep = mesh_as_brep(mesh, tolerance)?;
                self.encode_brep(&brep, tolerance)
            }
            GeometryValue::Mesh(mesh) => Ok(HostGeometry::Mesh(encode_mesh(
                &self.kernel,
                mesh,
                tolerance,
                &self.context,
                &mut self.diagnostics,
            )?)),
        }
    }

    fn encode_points(&mut self, points: &[Point3]) -> Result<HostGeometry, ConversionError> {
        let mut created = Vec::with_capacity(points.len());
        for point in points {
            match self.kernel.create_point(*point) {
                Ok(point) => created.push(point),
                Err(err) => self.diagnostics.emit(
                    Diagnostic::warning(DiagnosticKind::HostPlatformFailure, err.to_string()).with_subject(*point),
                ),
            }
        }
        if created.is_empty() {
            return Err(ConversionError::NothingProduced { kind: "point cloud" });
        }
        Ok(HostGeometry::Points(created))
    }

    fn encode_curve(&mut self, curve: &Curve, tolerance: &GeometryTolerance) -> Result<HostGeometry, ConversionError> {
        let segmentation = Segmenter::new(*tolerance, self.config.knot_tolerance).segment(curve)?;
        for piece in segmentation.dropped {
            self.diagnostics.emit(
                Diagnostic::warning(
                    DiagnosticKind::ToleranceViolation,
                    format!("{} piece shorter than {} dropped", piece.kind_name(), tolerance.short_curve),
                )
                .with_subject(piece),
            );
        }

        let mut curves = Vec::with_capacity(segmentation.curves.len());
        let mut last_error = None;
        for piece in segmentation.curves {
            match self.kernel.create_curve(piece.clone()) {
                Ok(created) => curves.push(created),
                Err(err) => {
                    self.diagnostics.emit(
                        Diagnostic::warning(DiagnosticKind::HostPlatformFailure, err.to_string())
                            .with_subject(piece.to_curve()),
                    );
                    last_error = Some(err);
                }
            }
        }
        if curves.is_empty() {
            return Err(last_error.map_or(ConversionError::NothingProduced { kind: curve.kind_name() }, Into::into));
        }
        Ok(HostGeometry::Curves(curves))
    }

    fn encode_brep(&mut self, brep: &Brep, tolerance: &GeometryTolerance) -> Result<HostGeometry, ConversionError> {
        let assembly = Assembler::new(&self.kernel, *tolerance, self.config.knot_tolerance, &mut self.diagnostics)
            .assemble(brep, &self.context);
        match assembly {
            Assembly::Complete(solid) => Ok(HostGeometry::Solid(solid)),
            Assembly::Partial { solid, discarded_faces } => {
                self.stats.discarded_faces += discarded_faces;
                Ok(HostGeometry::Solid(solid))
            }
            Assembly::Nothing { discarded_faces } => {
                self.stats.discarded_faces += discarded_faces;
                if !self.config.interchange_fallback {
                    return Err(ConversionError::NothingProduced { kind: "brep" });
                }
                self.fallback(brep, brep_kind(brep.orientation))
            }
        }
    }

    fn fallback(&mut self, brep: &Brep, kind: BrepKind) -> Result<HostGeometry, ConversionError> {
        self.stats.fallback_invocations += 1;
        log::debug!("direct assembly produced nothing; trying the interchange fallback");
        if self.context.material.is_some() || self.context.face_materials.iter().any(Option::is_some) {
            self.diagnostics.emit(Diagnostic::remark(
                DiagnosticKind::PartialAssemblyFailure,
                "face materials are not carried through the interchange fallback",
            ));
        }

        let document = export_brep(brep, kind, &self.config.knot_tolerance, &mut self.diagnostics);
        let scratch = self.scratch.get_or_insert_with(ScratchDocument::default);
        let result = import_through_file(&self.kernel, &document, self.config.interchange_dir.as_deref(), scratch);
        scratch.clear();

        match result {
            Ok(solid) => Ok(HostGeometry::Solid(solid)),
            Err(err) => {
                self.diagnostics.emit(
                    Diagnostic::warning(
                        DiagnosticKind::HostPlatformFailure,
                        format!("interchange fallback failed: {err}"),
                    )
                    .with_subject(brep.clone()),
                );
                Err(ConversionError::NothingProduced { kind: "brep" })
            }
        }
    }

    fn restore_context(&mut self) {
        if let Some(previous) = self.stack.pop() {
            self.context = previous;
        }
    }
}

/// Polyhedral brep of a mesh once its short edges are gone.
fn mesh_as_brep(mut mesh: Mesh, tolerance: &GeometryTolerance) -> Result<Brep, ConversionError> {
    while mesh.collapse_short_edges(tolerance.short_curve) > 0 {}
    if mesh.faces.is_empty() {
        return Err(ConversionError::NothingProduced { kind: "subd" });
    }
    Brep::from_mesh(&mesh, tolerance.vertex).map_err(|e| ConversionError::unsupported("subd", e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope guards
// ─────────────────────────────────────────────────────────────────────────────

/// Restores the previous conversion context when dropped.
pub struct ContextScope<'a, K: HostKernel> {
    session: &'a mut ConversionSession<K>,
}

impl<K: HostKernel> Deref for ContextScope<'_, K> {
    type Target = ConversionSession<K>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<K: HostKernel> DerefMut for ContextScope<'_, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<K: HostKernel> Drop for ContextScope<'_, K> {
    fn drop(&mut self) {
        self.session.restore_context();
    }
}

/// Ends the cache keep-alive region when dropped.
pub struct KeepAliveRegion<'a, K: HostKernel> {
    session: &'a mut ConversionSession<K>,
}

impl<K: HostKernel> Deref for KeepAliveRegion<'_, K> {
    type Target = ConversionSession<K>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<K: HostKernel> DerefMut for KeepAliveRegion<'_, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<K: HostKernel> Drop for KeepAliveRegion<'_, K> {
    fn drop(&mut self) {
        self.session.cache.end_region();
    }
}
