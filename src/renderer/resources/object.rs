use color_eyre::eyre::eyre;
use color_eyre::Result;
use glam::{Vec3, Vec4};
use crate::renderer::resources::vertex::Vertex;

/// A list of vertices plus where the object sits in the world.
///
/// The renderer copies the vertex bytes on registration, so the caller is free to drop
/// or reuse its own value afterwards. `placement` is carried along but not read by the
/// pipeline yet.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryObject {
    pub vertices: Vec<Vertex>,
    pub placement: Vec4,
}

impl GeometryObject {
    pub fn new(vertices: Vec<Vertex>, placement: Vec4) -> Self {
        Self {
            vertices,
            placement,
        }
    }

    /// Closed triangle outline, drawn as a line strip that returns to its first vertex
    pub fn triangle() -> Self {
        let color = Vec4::new(0.2, 0.5, 0.5, 1.0);
        let vertices = vec![
            Vertex::new(Vec4::new(0.0, -0.5, 0.0, 1.0), color), // Top
            Vertex::new(Vec4::new(0.5, 0.5, 0.0, 1.0), color),  // Bottom right
            Vertex::new(Vec4::new(-0.5, 0.5, 0.0, 1.0), color), // Bottom left
            Vertex::new(Vec4::new(0.0, -0.5, 0.0, 1.0), color), // Top again
        ];

        Self::new(vertices, Vec4::W)
    }

    /// Line-strip object through `points`, every vertex sharing `color`
    pub fn curve(points: &[Vec3], color: Vec4) -> Self {
        let vertices = points
            .iter()
            .map(|point| Vertex::new(point.extend(1.0), color))
            .collect();

        Self::new(vertices, Vec4::W)
    }

    /// Same as [`GeometryObject::curve`] but with the coordinates split per axis
    pub fn curve_from_components(
        x: &[f32],
        y: &[f32],
        z: &[f32],
        color: Vec4,
    ) -> Result<Self> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(eyre!(
                "Curve component lengths differ: x={}, y={}, z={}",
                x.len(),
                y.len(),
                z.len(),
            ));
        }

        let points = x
            .iter()
            .zip(y)
            .zip(z)
            .map(|((&x, &y), &z)| Vec3::new(x, y, z))
            .collect::<Vec<_>>();

        Ok(Self::curve(&points, color))
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_outline_is_closed() {
        let triangle = GeometryObject::triangle();
        assert_eq!(triangle.vertex_count(), 4);
        assert_eq!(triangle.vertices.first(), triangle.vertices.last());
        assert_eq!(triangle.as_bytes().len(), 4 * 32);
    }

    #[test]
    fn curve_points_get_unit_w() {
        let curve = GeometryObject::curve(
            &[Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 0.5)],
            Vec4::ONE,
        );
        assert_eq!(curve.vertex_count(), 2);
        assert_eq!(curve.vertices[0].position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(curve.vertices[1].position.w, 1.0);
        assert_eq!(curve.vertices[1].color, Vec4::ONE);
    }

    #[test]
    fn curve_from_components_zips_axes() {
        let curve = GeometryObject::curve_from_components(
            &[0.0, 1.0, 2.0],
            &[0.0, 1.0, 4.0],
            &[0.0, 0.0, 0.0],
            Vec4::X,
        )
        .unwrap();
        assert_eq!(curve.vertex_count(), 3);
        assert_eq!(curve.vertices[2].position, Vec4::new(2.0, 4.0, 0.0, 1.0));
    }

    #[test]
    fn curve_from_components_rejects_mismatched_lengths() {
        let result = GeometryObject::curve_from_components(
            &[0.0, 1.0],
            &[0.0],
            &[0.0, 1.0],
            Vec4::X,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_object_has_no_bytes() {
        let object = GeometryObject::new(Vec::new(), Vec4::W);
        assert_eq!(object.vertex_count(), 0);
        assert!(object.as_bytes().is_empty());
    }
}
