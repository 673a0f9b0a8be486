//! Skeleton settings: the hierarchical segment tree of newer protocol
//! versions, the flat `Parent_ID` list of older ones, and the flat-array
//! view reconstructed from either.

use std::collections::HashMap;

use qtm_xml::{Document, Element};
use tracing::{debug, trace};

use crate::model::{Position, Rotation};
use crate::value::{
    attr_f32_or_nan, attr_f64_or_nan, attr_value, child_f64_or_nan, push_f64, required_attr,
    required_attr_text, set_attr_f32, set_attr_f64,
};
use crate::version::{Feature, ProtocolVersion};
use crate::{SettingsError, SETTINGS_ROOT};

/// One degree of freedom axis of a segment joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeOfFreedomKind {
    RotationX,
    RotationY,
    RotationZ,
    TranslationX,
    TranslationY,
    TranslationZ,
}

impl DegreeOfFreedomKind {
    pub const ALL: [DegreeOfFreedomKind; 6] = [
        DegreeOfFreedomKind::RotationX,
        DegreeOfFreedomKind::RotationY,
        DegreeOfFreedomKind::RotationZ,
        DegreeOfFreedomKind::TranslationX,
        DegreeOfFreedomKind::TranslationY,
        DegreeOfFreedomKind::TranslationZ,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            DegreeOfFreedomKind::RotationX => "RotationX",
            DegreeOfFreedomKind::RotationY => "RotationY",
            DegreeOfFreedomKind::RotationZ => "RotationZ",
            DegreeOfFreedomKind::TranslationX => "TranslationX",
            DegreeOfFreedomKind::TranslationY => "TranslationY",
            DegreeOfFreedomKind::TranslationZ => "TranslationZ",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(text))
    }
}

/// Position and rotation pair of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentTransform {
    pub position: Position,
    pub rotation: Rotation,
}

/// Coupling of one degree of freedom to another segment's.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupling {
    pub segment: String,
    pub degree_of_freedom: DegreeOfFreedomKind,
    pub coefficient: f64,
}

/// One degree of freedom with its constraint, couplings and solver goal.
#[derive(Debug, Clone, PartialEq)]
pub struct DegreeOfFreedom {
    pub kind: DegreeOfFreedomKind,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub couplings: Vec<Coupling>,
    pub goal_value: f64,
    pub goal_weight: f64,
}

/// Marker attached to a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMarker {
    pub name: String,
    pub position: Position,
    pub weight: f64,
}

/// Rigid body attached to a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRigidBody {
    pub name: String,
    pub transform: SegmentTransform,
    pub weight: f64,
}

/// One segment of the hierarchical skeleton tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonSegmentHierarchical {
    pub name: String,
    pub id: u32,
    pub solver: Option<String>,
    pub transform: SegmentTransform,
    pub default_transform: SegmentTransform,
    pub degrees_of_freedom: Vec<DegreeOfFreedom>,
    pub endpoint: Option<Position>,
    pub markers: Vec<SegmentMarker>,
    pub rigid_bodies: Vec<SegmentRigidBody>,
    pub children: Vec<SkeletonSegmentHierarchical>,
}

/// A hierarchical skeleton definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonHierarchical {
    pub name: String,
    pub scale: f64,
    pub root: Option<SkeletonSegmentHierarchical>,
}

/// One entry of the flat segment array.
///
/// The array is in pre-order: `parent_index` is `-1` for the root and
/// otherwise points at an earlier entry whose id equals `parent_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonSegment {
    pub name: String,
    pub id: u32,
    pub parent_id: u32,
    pub parent_index: i32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

/// A skeleton as a flat segment array.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub name: String,
    pub segments: Vec<SkeletonSegment>,
}

/// The `Skeletons` settings section.
///
/// `skeletons` is populated for every version; `hierarchical` only when
/// the hierarchical schema is in effect.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkeletonSettings {
    pub skeletons: Vec<Skeleton>,
    pub hierarchical: Vec<SkeletonHierarchical>,
}

/// Read the `Skeletons` section, or `Ok(None)` when it is absent.
pub fn read_skeleton_settings(
    root: &Element,
    version: ProtocolVersion,
) -> Result<Option<SkeletonSettings>, SettingsError> {
    let Some(elem) = root.child("Skeletons") else {
        return Ok(None);
    };

    let mut settings = SkeletonSettings::default();
    if version.supports(Feature::HierarchicalSkeleton) {
        for skeleton_elem in elem.children("Skeleton") {
            let name = required_attr_text(skeleton_elem, "Name")?.to_string();
            let scale = skeleton_elem.child_parsed("Scale").unwrap_or(f64::NAN);

            let mut segments = Vec::new();
            let mut index_by_id = HashMap::new();
            let root_segment = match skeleton_elem
                .child("Segments")
                .and_then(|segments_elem| segments_elem.child("Segment"))
            {
                Some(segment_elem) => Some(read_segment_tree(
                    segment_elem,
                    version,
                    0,
                    -1,
                    &mut index_by_id,
                    &mut segments,
                )?),
                None => None,
            };
            settings.hierarchical.push(SkeletonHierarchical {
                name: name.clone(),
                scale,
                root: root_segment,
            });
            settings.skeletons.push(Skeleton { name, segments });
        }
    } else {
        for skeleton_elem in elem.children("Skeleton") {
            settings.skeletons.push(read_flat_skeleton(skeleton_elem)?);
        }
    }

    debug!(skeletons = settings.skeletons.len(), "read skeleton settings");
    Ok(Some(settings))
}

/// Depth-first segment read. The id map entry and the flat array entry
/// for a segment are recorded before its children recurse, which keeps
/// the flat array in pre-order.
fn read_segment_tree(
    elem: &Element,
    version: ProtocolVersion,
    parent_id: u32,
    parent_index: i32,
    index_by_id: &mut HashMap<u32, usize>,
    flat: &mut Vec<SkeletonSegment>,
) -> Result<SkeletonSegmentHierarchical, SettingsError> {
    let name = required_attr_text(elem, "Name")?.to_string();
    let id: u32 = required_attr(elem, "ID")?;
    if index_by_id.contains_key(&id) {
        return Err(SettingsError::DuplicateSegmentId(id));
    }
    index_by_id.insert(id, flat.len());
    trace!(segment = %name, id, "read skeleton segment");

    let default_transform = elem
        .child("DefaultTransform")
        .map(read_transform)
        .unwrap_or_default();
    flat.push(SkeletonSegment {
        name: name.clone(),
        id,
        parent_id,
        parent_index,
        position: [
            default_transform.position.x as f32,
            default_transform.position.y as f32,
            default_transform.position.z as f32,
        ],
        rotation: [
            default_transform.rotation.x as f32,
            default_transform.rotation.y as f32,
            default_transform.rotation.z as f32,
            default_transform.rotation.w as f32,
        ],
    });
    let flat_index = (flat.len() - 1) as i32;

    let mut segment = SkeletonSegmentHierarchical {
        name,
        id,
        solver: elem.attribute("Solver").map(str::to_string),
        transform: elem.child("Transform").map(read_transform).unwrap_or_default(),
        default_transform,
        degrees_of_freedom: read_degrees_of_freedom(elem, version)?,
        endpoint: elem.child("Endpoint").map(read_position_attrs),
        markers: read_markers(elem),
        rigid_bodies: read_rigid_bodies(elem),
        children: Vec::new(),
    };
    for child_elem in elem.children("Segment") {
        let child = read_segment_tree(child_elem, version, id, flat_index, index_by_id, flat)?;
        segment.children.push(child);
    }
    Ok(segment)
}

fn read_transform(elem: &Element) -> SegmentTransform {
    SegmentTransform {
        position: elem
            .child("Position")
            .map(read_position_attrs)
            .unwrap_or_default(),
        rotation: elem
            .child("Rotation")
            .map(read_rotation_attrs)
            .unwrap_or_default(),
    }
}

fn read_position_attrs(elem: &Element) -> Position {
    Position::new(
        attr_f64_or_nan(elem, "X"),
        attr_f64_or_nan(elem, "Y"),
        attr_f64_or_nan(elem, "Z"),
    )
}

fn read_rotation_attrs(elem: &Element) -> Rotation {
    Rotation::new(
        attr_f64_or_nan(elem, "X"),
        attr_f64_or_nan(elem, "Y"),
        attr_f64_or_nan(elem, "Z"),
        attr_f64_or_nan(elem, "W"),
    )
}

fn read_degrees_of_freedom(
    segment: &Element,
    version: ProtocolVersion,
) -> Result<Vec<DegreeOfFreedom>, SettingsError> {
    let mut dofs = Vec::new();
    let Some(container) = segment.child("DegreesOfFreedom") else {
        return Ok(dofs);
    };

    for kind in DegreeOfFreedomKind::ALL {
        let Some(elem) = container.child(kind.wire_name()) else {
            continue;
        };
        let (lower_bound, upper_bound) = if version.supports(Feature::DofConstraintElement) {
            match elem.child("Constraint") {
                Some(constraint) => (
                    attr_f64_or_nan(constraint, "LowerBound"),
                    attr_f64_or_nan(constraint, "UpperBound"),
                ),
                None => (f64::NAN, f64::NAN),
            }
        } else {
            (
                attr_f64_or_nan(elem, "LowerBound"),
                attr_f64_or_nan(elem, "UpperBound"),
            )
        };

        let mut couplings = Vec::new();
        if let Some(couplings_elem) = elem.child("Couplings") {
            for coupling_elem in couplings_elem.children("Coupling") {
                let kind_text = required_attr_text(coupling_elem, "DegreeOfFreedom")?;
                let degree_of_freedom =
                    DegreeOfFreedomKind::from_wire(kind_text).ok_or_else(|| {
                        SettingsError::InvalidValue("DegreeOfFreedom".into(), kind_text.into())
                    })?;
                couplings.push(Coupling {
                    segment: coupling_elem.attribute("Segment").unwrap_or_default().to_string(),
                    degree_of_freedom,
                    coefficient: attr_f64_or_nan(coupling_elem, "Coefficient"),
                });
            }
        }

        let (goal_value, goal_weight) = match elem.child("Goal") {
            Some(goal) => (attr_f64_or_nan(goal, "Value"), attr_f64_or_nan(goal, "Weight")),
            None => (f64::NAN, f64::NAN),
        };

        dofs.push(DegreeOfFreedom {
            kind,
            lower_bound,
            upper_bound,
            couplings,
            goal_value,
            goal_weight,
        });
    }
    Ok(dofs)
}

fn read_markers(segment: &Element) -> Vec<SegmentMarker> {
    let mut markers = Vec::new();
    if let Some(markers_elem) = segment.child("Markers") {
        for marker_elem in markers_elem.children("Marker") {
            markers.push(SegmentMarker {
                name: marker_elem.attribute("Name").unwrap_or_default().to_string(),
                position: marker_elem
                    .child("Position")
                    .map(read_position_attrs)
                    .unwrap_or_default(),
                weight: child_f64_or_nan(marker_elem, "Weight"),
            });
        }
    }
    markers
}

fn read_rigid_bodies(segment: &Element) -> Vec<SegmentRigidBody> {
    let mut bodies = Vec::new();
    if let Some(bodies_elem) = segment.child("RigidBodies") {
        for body_elem in bodies_elem.children("RigidBody") {
            bodies.push(SegmentRigidBody {
                name: body_elem.attribute("Name").unwrap_or_default().to_string(),
                transform: body_elem
                    .child("Transform")
                    .map(read_transform)
                    .unwrap_or_default(),
                weight: child_f64_or_nan(body_elem, "Weight"),
            });
        }
    }
    bodies
}

fn read_flat_skeleton(elem: &Element) -> Result<Skeleton, SettingsError> {
    let name = required_attr_text(elem, "Name")?.to_string();
    let mut index_by_id: HashMap<u32, usize> = HashMap::new();
    let mut segments = Vec::new();

    for segment_elem in elem.children("Segment") {
        let segment_name = required_attr_text(segment_elem, "Name")?.to_string();
        let id: u32 = required_attr(segment_elem, "ID")?;
        if index_by_id.contains_key(&id) {
            return Err(SettingsError::DuplicateSegmentId(id));
        }

        // Unknown or absent parent ids make the segment a root.
        let parent_id = attr_value::<u32>(segment_elem, "Parent_ID").unwrap_or(0);
        let parent_index = attr_value::<u32>(segment_elem, "Parent_ID")
            .and_then(|pid| index_by_id.get(&pid).copied())
            .map(|index| index as i32)
            .unwrap_or(-1);

        let position = match segment_elem.child("Position") {
            Some(position_elem) => [
                attr_f32_or_nan(position_elem, "X"),
                attr_f32_or_nan(position_elem, "Y"),
                attr_f32_or_nan(position_elem, "Z"),
            ],
            None => [f32::NAN; 3],
        };
        let rotation = match segment_elem.child("Rotation") {
            Some(rotation_elem) => [
                attr_f32_or_nan(rotation_elem, "X"),
                attr_f32_or_nan(rotation_elem, "Y"),
                attr_f32_or_nan(rotation_elem, "Z"),
                attr_f32_or_nan(rotation_elem, "W"),
            ],
            None => [f32::NAN; 4],
        };

        index_by_id.insert(id, segments.len());
        segments.push(SkeletonSegment {
            name: segment_name,
            id,
            parent_id,
            parent_index,
            position,
            rotation,
        });
    }
    Ok(Skeleton { name, segments })
}

/// Build a settings document carrying the `Skeletons` section.
///
/// The hierarchical trees are emitted on versions that support them,
/// the flat arrays otherwise.
pub fn write_skeleton_settings(settings: &SkeletonSettings, version: ProtocolVersion) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Skeletons"));

    if version.supports(Feature::HierarchicalSkeleton) {
        for skeleton in &settings.hierarchical {
            let skeleton_elem = elem.push(
                Element::new("Skeleton").with_attribute("Name", skeleton.name.as_str()),
            );
            push_f64(skeleton_elem, "Scale", skeleton.scale, 6);
            if let Some(root_segment) = &skeleton.root {
                let segments_elem = skeleton_elem.push(Element::new("Segments"));
                write_segment(segments_elem, root_segment, version);
            }
        }
    } else {
        for skeleton in &settings.skeletons {
            write_flat_skeleton(elem, skeleton);
        }
    }

    Document::new(root)
}

fn write_segment(
    parent: &mut Element,
    segment: &SkeletonSegmentHierarchical,
    version: ProtocolVersion,
) {
    let mut seg = Element::new("Segment").with_attribute("Name", segment.name.as_str());
    seg.set_attribute("ID", segment.id.to_string());
    if let Some(solver) = &segment.solver {
        seg.set_attribute("Solver", solver.as_str());
    }
    let elem = parent.push(seg);

    write_transform(elem, "Transform", &segment.transform);
    write_transform(elem, "DefaultTransform", &segment.default_transform);

    if !segment.degrees_of_freedom.is_empty() {
        let container = elem.push(Element::new("DegreesOfFreedom"));
        for dof in &segment.degrees_of_freedom {
            write_degree_of_freedom(container, dof, version);
        }
    }
    if let Some(endpoint) = &segment.endpoint {
        let mut endpoint_elem = Element::new("Endpoint");
        set_position_attrs(&mut endpoint_elem, *endpoint);
        elem.push(endpoint_elem);
    }
    if !segment.markers.is_empty() {
        let markers_elem = elem.push(Element::new("Markers"));
        for marker in &segment.markers {
            let marker_elem = markers_elem
                .push(Element::new("Marker").with_attribute("Name", marker.name.as_str()));
            let mut position = Element::new("Position");
            set_position_attrs(&mut position, marker.position);
            marker_elem.push(position);
            push_f64(marker_elem, "Weight", marker.weight, 6);
        }
    }
    if !segment.rigid_bodies.is_empty() {
        let bodies_elem = elem.push(Element::new("RigidBodies"));
        for body in &segment.rigid_bodies {
            let body_elem = bodies_elem
                .push(Element::new("RigidBody").with_attribute("Name", body.name.as_str()));
            write_transform(body_elem, "Transform", &body.transform);
            push_f64(body_elem, "Weight", body.weight, 6);
        }
    }

    for child in &segment.children {
        write_segment(elem, child, version);
    }
}

fn write_transform(parent: &mut Element, name: &str, transform: &SegmentTransform) {
    let elem = parent.push(Element::new(name));
    let mut position = Element::new("Position");
    set_position_attrs(&mut position, transform.position);
    elem.push(position);
    let mut rotation = Element::new("Rotation");
    set_rotation_attrs(&mut rotation, transform.rotation);
    elem.push(rotation);
}

fn set_position_attrs(elem: &mut Element, position: Position) {
    set_attr_f64(elem, "X", position.x, 6);
    set_attr_f64(elem, "Y", position.y, 6);
    set_attr_f64(elem, "Z", position.z, 6);
}

fn set_rotation_attrs(elem: &mut Element, rotation: Rotation) {
    set_attr_f64(elem, "X", rotation.x, 6);
    set_attr_f64(elem, "Y", rotation.y, 6);
    set_attr_f64(elem, "Z", rotation.z, 6);
    set_attr_f64(elem, "W", rotation.w, 6);
}

fn write_degree_of_freedom(parent: &mut Element, dof: &DegreeOfFreedom, version: ProtocolVersion) {
    let elem = parent.push(Element::new(dof.kind.wire_name()));
    if version.supports(Feature::DofConstraintElement) {
        if !dof.lower_bound.is_nan() || !dof.upper_bound.is_nan() {
            let mut constraint = Element::new("Constraint");
            set_attr_f64(&mut constraint, "LowerBound", dof.lower_bound, 6);
            set_attr_f64(&mut constraint, "UpperBound", dof.upper_bound, 6);
            elem.push(constraint);
        }
    } else {
        set_attr_f64(elem, "LowerBound", dof.lower_bound, 6);
        set_attr_f64(elem, "UpperBound", dof.upper_bound, 6);
    }

    if !dof.couplings.is_empty() {
        let couplings_elem = elem.push(Element::new("Couplings"));
        for coupling in &dof.couplings {
            let mut coupling_elem = Element::new("Coupling")
                .with_attribute("Segment", coupling.segment.as_str())
                .with_attribute("DegreeOfFreedom", coupling.degree_of_freedom.wire_name());
            set_attr_f64(&mut coupling_elem, "Coefficient", coupling.coefficient, 6);
            couplings_elem.push(coupling_elem);
        }
    }
    if !dof.goal_value.is_nan() || !dof.goal_weight.is_nan() {
        let mut goal = Element::new("Goal");
        set_attr_f64(&mut goal, "Value", dof.goal_value, 6);
        set_attr_f64(&mut goal, "Weight", dof.goal_weight, 6);
        elem.push(goal);
    }
}

fn write_flat_skeleton(parent: &mut Element, skeleton: &Skeleton) {
    let skeleton_elem =
        parent.push(Element::new("Skeleton").with_attribute("Name", skeleton.name.as_str()));
    for segment in &skeleton.segments {
        let mut seg = Element::new("Segment").with_attribute("Name", segment.name.as_str());
        seg.set_attribute("ID", segment.id.to_string());
        if segment.parent_index >= 0 {
            seg.set_attribute("Parent_ID", segment.parent_id.to_string());
        }
        let elem = skeleton_elem.push(seg);

        let position = elem.push(Element::new("Position"));
        set_attr_f32(position, "X", segment.position[0], 6);
        set_attr_f32(position, "Y", segment.position[1], 6);
        set_attr_f32(position, "Z", segment.position[2], 6);
        let rotation = elem.push(Element::new("Rotation"));
        set_attr_f32(rotation, "X", segment.rotation[0], 6);
        set_attr_f32(rotation, "Y", segment.rotation[1], 6);
        set_attr_f32(rotation, "Z", segment.rotation[2], 6);
        set_attr_f32(rotation, "W", segment.rotation[3], 6);
    }
}
