//! Entity type sets used to classify the geometric payload.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Entity types that describe solid bodies.
pub const SOLID_ENTITIES: &[&str] = &[
    "MANIFOLD_SOLID_BREP",
    "BREP_WITH_VOIDS",
    "SHELL_BASED_SURFACE_MODEL",
    "FACETED_BREP",
    "ADVANCED_BREP_SHAPE_REPRESENTATION",
    "CSG_SOLID",
    "BLOCK",
    "RIGHT_ANGULAR_WEDGE",
    "SPHERE",
    "TORUS",
];

/// Entity types that describe surfaces.
pub const SURFACE_ENTITIES: &[&str] = &[
    "ADVANCED_FACE",
    "FACE_SURFACE",
    "B_SPLINE_SURFACE",
    "B_SPLINE_SURFACE_WITH_KNOTS",
    "BOUNDED_SURFACE",
    "CURVE_BOUNDED_SURFACE",
    "RECTANGULAR_COMPOSITE_SURFACE",
    "CLOSED_SHELL",
    "OPEN_SHELL",
    "PLANE",
    "CYLINDRICAL_SURFACE",
    "CONICAL_SURFACE",
    "SPHERICAL_SURFACE",
    "TOROIDAL_SURFACE",
    "SURFACE_OF_LINEAR_EXTRUSION",
    "SURFACE_OF_REVOLUTION",
];

static SOLID_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| SOLID_ENTITIES.iter().copied().collect());

static SURFACE_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| SURFACE_ENTITIES.iter().copied().collect());

/// Whether `type_name` (uppercase) is a solid entity.
pub fn is_solid(type_name: &str) -> bool {
    SOLID_SET.contains(type_name)
}

/// Whether `type_name` (uppercase) is a surface entity.
pub fn is_surface(type_name: &str) -> bool {
    SURFACE_SET.contains(type_name)
}
