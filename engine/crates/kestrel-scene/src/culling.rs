/// 包围球，primitive 的剔除代理体
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    pub center: glam::Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: glam::Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// 视锥体，由 view-projection 矩阵提取出 6 个平面
///
/// 平面方程 ax + by + cz + d = 0，法线指向视锥体内部，
/// 提取方式为 Gribb-Hartmann：用矩阵的行向量相加减
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// left, right, bottom, top, near, far
    planes: [glam::Vec4; 6],
}

impl Frustum {
    pub fn from_view_proj(view_proj: &glam::Mat4) -> Self {
        let row0 = view_proj.row(0);
        let row1 = view_proj.row(1);
        let row2 = view_proj.row(2);
        let row3 = view_proj.row(3);

        let planes = [
            normalize_plane(row3 + row0), // left
            normalize_plane(row3 - row0), // right
            normalize_plane(row3 + row1), // bottom
            normalize_plane(row3 - row1), // top
            normalize_plane(row2),        // near, Vulkan 深度范围 [0, 1]
            normalize_plane(row3 - row2), // far
        ];
        Self { planes }
    }

    /// 包围球是否与视锥体相交（保守判定，不会漏剔可见物体）
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes.iter().all(|plane| {
            let signed_distance = plane.truncate().dot(sphere.center) + plane.w;
            signed_distance >= -sphere.radius
        })
    }
}

fn normalize_plane(plane: glam::Vec4) -> glam::Vec4 {
    let normal_len = plane.truncate().length();
    plane / normal_len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        // 相机位于原点看向 -Z
        let proj = glam::Mat4::perspective_rh(60_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        let view = glam::Mat4::look_at_rh(glam::Vec3::ZERO, glam::Vec3::NEG_Z, glam::Vec3::Y);
        Frustum::from_view_proj(&(proj * view))
    }

    #[test]
    fn test_sphere_in_front_is_visible() {
        let frustum = test_frustum();
        let sphere = BoundingSphere::new(glam::vec3(0.0, 0.0, -10.0), 1.0);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_behind_camera_is_culled() {
        let frustum = test_frustum();
        let sphere = BoundingSphere::new(glam::vec3(0.0, 0.0, 10.0), 1.0);
        assert!(!frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_beyond_far_plane_is_culled() {
        let frustum = test_frustum();
        let sphere = BoundingSphere::new(glam::vec3(0.0, 0.0, -200.0), 1.0);
        assert!(!frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_straddling_side_plane_is_visible() {
        let frustum = test_frustum();
        // 中心在视锥体外，但半径足够大可以跨过侧面
        let sphere = BoundingSphere::new(glam::vec3(-20.0, 0.0, -10.0), 15.0);
        assert!(frustum.intersects_sphere(&sphere));
    }
}
