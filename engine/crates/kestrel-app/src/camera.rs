use kestrel_renderer::renderer::CameraMatrices;

pub struct Camera {
    pub position: glam::Vec3,

    pub euler_yaw_deg: f32,
    pub euler_pitch_deg: f32,
    pub euler_roll_deg: f32,

    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// 相机的上参考向量
    const CAMERA_UP: glam::Vec3 = glam::Vec3::new(0.0, 1.0, 0.0);

    /// YXZ 表示 Y(yaw)-X(Pitch)-Z(Roll) 的旋转顺序
    const CAMERA_EULER: glam::EulerRot = glam::EulerRot::YXZ;

    /// 没有旋转的情况下，相机看向的是 -Z
    const CAMERA_FORWARD: glam::Vec3 = glam::Vec3::new(0.0, 0.0, -1.0);

    const CAMERA_RIGHT: glam::Vec3 = glam::Vec3::new(1.0, 0.0, 0.0);

    const K_PITCH: f32 = 89.5;

    #[inline]
    fn yaw_rad(&self) -> f32 {
        self.euler_yaw_deg.to_radians()
    }

    #[inline]
    fn pitch_rad(&self) -> f32 {
        self.euler_pitch_deg.to_radians()
    }

    #[inline]
    fn roll_rad(&self) -> f32 {
        self.euler_roll_deg.to_radians()
    }

    fn rotation(&self) -> glam::Mat4 {
        glam::Mat4::from_euler(Self::CAMERA_EULER, self.yaw_rad(), self.pitch_rad(), self.roll_rad())
    }

    pub fn view_matrix(&self) -> glam::Mat4 {
        let dir = self.rotation().transform_vector3(Self::CAMERA_FORWARD);
        glam::Mat4::look_to_rh(self.position, dir, Self::CAMERA_UP)
    }

    /// Vulkan 的 NDC Y 轴向下，投影矩阵在此翻转 Y
    pub fn projection_matrix(&self, aspect: f32) -> glam::Mat4 {
        let mut proj = glam::Mat4::perspective_rh(self.fov_y_deg.to_radians(), aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn matrices(&self, aspect: f32) -> CameraMatrices {
        CameraMatrices {
            view: self.view_matrix(),
            proj: self.projection_matrix(aspect),
        }
    }

    pub fn camera_forward(&self) -> glam::Vec3 {
        self.rotation().transform_vector3(Self::CAMERA_FORWARD)
    }

    pub fn camera_right(&self) -> glam::Vec3 {
        self.rotation().transform_vector3(Self::CAMERA_RIGHT)
    }

    /// 朝相机看向的方向进行移动
    pub fn move_forward(&mut self, length: f32) {
        self.position += self.camera_forward() * length;
    }

    pub fn move_right(&mut self, length: f32) {
        self.position += self.camera_right() * length;
    }

    /// 朝世界的 Up 进行移动
    pub fn move_up(&mut self, length: f32) {
        self.position += Self::CAMERA_UP * length;
    }

    pub fn rotate_yaw(&mut self, angle: f32) {
        self.euler_yaw_deg += angle;
        self.euler_yaw_deg %= 360.0;
        if self.euler_yaw_deg < 0.0 {
            self.euler_yaw_deg += 360.0;
        }
    }

    pub fn rotate_pitch(&mut self, angle: f32) {
        self.euler_pitch_deg += angle;
        self.euler_pitch_deg = self.euler_pitch_deg.clamp(-Self::K_PITCH, Self::K_PITCH);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: glam::Vec3::new(0.0, 0.0, 0.0),
            euler_yaw_deg: 0.0,
            euler_pitch_deg: 0.0,
            euler_roll_deg: 0.0,
            fov_y_deg: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_mat4_near(a: glam::Mat4, b: glam::Mat4, epsilon: f32) {
        for (col_a, col_b) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert!((col_a - col_b).abs() < epsilon, "matrices differ: {a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_view_matrix_composed_with_inverse_is_identity() {
        // 任意位姿下 view * view^-1 都应该是单位阵
        let poses = [
            (glam::Vec3::ZERO, 0.0, 0.0),
            (glam::vec3(3.0, -2.0, 7.5), 45.0, 30.0),
            (glam::vec3(-10.0, 5.0, 0.1), 181.0, -80.0),
        ];
        for (position, yaw, pitch) in poses {
            let camera = Camera {
                position,
                euler_yaw_deg: yaw,
                euler_pitch_deg: pitch,
                ..Default::default()
            };
            let view = camera.view_matrix();
            assert_mat4_near(view * view.inverse(), glam::Mat4::IDENTITY, 1e-5);
        }
    }

    #[test]
    fn test_default_camera_looks_along_negative_z() {
        let camera = Camera::default();
        let forward = camera.camera_forward();
        assert!((forward - glam::Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let proj = camera.projection_matrix(16.0 / 9.0);
        // Vulkan clip space Y 向下
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate_pitch(200.0);
        assert!(camera.euler_pitch_deg <= 89.5);
        camera.rotate_pitch(-400.0);
        assert!(camera.euler_pitch_deg >= -89.5);
    }
}
