pub mod resolver;
pub mod store;

pub mod geometry {
    use std::ops::{Add, Neg, Sub};

    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示。z = 0 即平面点。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Self = Self(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        /// 返回从当前点指向 `other` 的向量（终点减起点）。
        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        /// 三个坐标轴分别取算术平均。先减半再相加，接近浮点上限的坐标也不会溢出。
        #[inline]
        pub fn midpoint(self, other: Point3) -> Self {
            Self(self.0 * 0.5 + other.0 * 0.5)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn is_planar(self) -> bool {
            self.0.z == 0.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量。二维向量一律按 z = 0 参与运算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const ZERO: Self = Self(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn from_points(start: Point3, end: Point3) -> Self {
            start.vector_to(end)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn add(self, other: Vector3) -> Vector3 {
            Vector3(self.0 + other.0)
        }

        #[inline]
        pub fn subtract(self, other: Vector3) -> Vector3 {
            Vector3(self.0 - other.0)
        }

        /// 点积。中间乘积溢出时改用缩放后的分量重算，真实值超出范围才得到 ±inf。
        pub fn dot(self, other: Vector3) -> f64 {
            let direct = self.0.dot(other.0);
            if direct.is_finite() {
                return direct;
            }
            let (a, scale_a) = self.unit_scaled();
            let (b, scale_b) = other.unit_scaled();
            rescale(a.dot(b), scale_a, scale_b)
        }

        /// 叉积，溢出处理同 [`Vector3::dot`]。
        pub fn cross(self, other: Vector3) -> Vector3 {
            let direct = self.0.cross(other.0);
            if direct.is_finite() {
                return Vector3(direct);
            }
            let (a, scale_a) = self.unit_scaled();
            let (b, scale_b) = other.unit_scaled();
            let c = a.cross(b);
            Vector3::new(
                rescale(c.x, scale_a, scale_b),
                rescale(c.y, scale_a, scale_b),
                rescale(c.z, scale_a, scale_b),
            )
        }

        /// 欧氏范数。分量平方和溢出时按最大分量缩放后再求。
        pub fn magnitude(self) -> f64 {
            let direct = self.0.length();
            if direct.is_finite() {
                return direct;
            }
            let (unit, scale) = self.unit_scaled();
            unit.length() * scale
        }

        /// 各分量绝对值中的最大者。
        #[inline]
        pub fn max_abs(self) -> f64 {
            self.0.abs().max_element()
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        /// 除以最大分量绝对值，使各分量落在 [-1, 1]。零向量和非有限向量原样返回，比例为 1。
        fn unit_scaled(self) -> (DVec3, f64) {
            let scale = self.max_abs();
            if scale == 0.0 || !scale.is_finite() {
                (self.0, 1.0)
            } else {
                (self.0 / scale, scale)
            }
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn is_zero(self) -> bool {
            self.0 == DVec3::ZERO
        }

        /// 两向量夹角（角度制）。任一向量为零向量时无定义，返回 `None`。
        ///
        /// 余弦值先截断到 [-1, 1]，近似平行或反平行时浮点误差不会越出 `acos` 定义域。
        /// 夹角与长度无关，先把两个向量各自缩放到单位量级，大坐标不会让余弦变成 NaN。
        pub fn angle_degrees(self, other: Vector3) -> Option<f64> {
            let (a, _) = self.unit_scaled();
            let (b, _) = other.unit_scaled();
            let mag_a = a.length();
            let mag_b = b.length();
            if mag_a == 0.0 || mag_b == 0.0 {
                return None;
            }
            let cos_theta = a.dot(b) / (mag_a * mag_b);
            if !cos_theta.is_finite() {
                return None;
            }
            Some(cos_theta.clamp(-1.0, 1.0).acos().to_degrees())
        }

        /// XY 平面内逆时针旋转 90°：(dx, dy) -> (-dy, dx)，z 分量丢弃。
        #[inline]
        pub fn perpendicular_xy(self) -> Vector3 {
            Vector3::new(-self.0.y, self.0.x, 0.0)
        }

        /// 投影到 XY 平面。
        #[inline]
        pub fn planar(self) -> Vector3 {
            Vector3::new(self.0.x, self.0.y, 0.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Vector3 {
            Vector3(self.0 * factor)
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    impl From<[f64; 3]> for Vector3 {
        fn from(value: [f64; 3]) -> Self {
            Self(DVec3::from_array(value))
        }
    }

    impl Add for Vector3 {
        type Output = Vector3;

        fn add(self, rhs: Vector3) -> Vector3 {
            Vector3(self.0 + rhs.0)
        }
    }

    impl Sub for Vector3 {
        type Output = Vector3;

        fn sub(self, rhs: Vector3) -> Vector3 {
            Vector3(self.0 - rhs.0)
        }
    }

    impl Neg for Vector3 {
        type Output = Vector3;

        fn neg(self) -> Vector3 {
            Vector3(-self.0)
        }
    }

    /// 缩放空间里的结果乘回两个比例。零保持为零，避免 0 * inf 得到 NaN。
    #[inline]
    fn rescale(value: f64, scale_a: f64, scale_b: f64) -> f64 {
        if value == 0.0 {
            0.0
        } else {
            value * scale_a * scale_b
        }
    }

    /// 便于按元组调用的夹角函数，语义同 [`Vector3::angle_degrees`]。
    #[inline]
    pub fn angle_between(a: Vector3, b: Vector3) -> Option<f64> {
        a.angle_degrees(b)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn basic_operations_match_component_formulas() {
            let a = Vector3::new(1.0, 2.0, 3.0);
            let b = Vector3::new(4.0, -5.0, 6.0);

            assert_eq!(a + b, Vector3::new(5.0, -3.0, 9.0));
            assert_eq!(a - b, Vector3::new(-3.0, 7.0, -3.0));
            assert!((a.dot(b) - 12.0).abs() < 1e-12);
            assert_eq!(a.cross(b), Vector3::new(27.0, 6.0, -13.0));
            assert!((Vector3::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-12);
        }

        #[test]
        fn planar_cross_product_lives_on_z_axis() {
            let a = Vector3::new(1.0, 1.0, 0.0);
            let b = Vector3::new(1.0, -1.0, 0.0);
            let cross = a.cross(b);
            assert!(cross.x().abs() < 1e-12);
            assert!(cross.y().abs() < 1e-12);
            assert!((cross.z() + 2.0).abs() < 1e-12);
        }

        #[test]
        fn angle_is_undefined_for_zero_vector() {
            let angle = angle_between(Vector3::new(1.0, 0.0, 0.0), Vector3::ZERO);
            assert!(angle.is_none());
        }

        #[test]
        fn angle_clamps_near_parallel_inputs() {
            let a = Vector3::new(0.1, 0.2, 0.3);
            let b = a.scale(3.0);
            let angle = a.angle_degrees(b).expect("non-zero vectors");
            assert!(angle.is_finite());
            assert!(angle.abs() < 1e-5);

            let opposite = a.angle_degrees(-b).expect("non-zero vectors");
            assert!((opposite - 180.0).abs() < 1e-5);

            let right = Vector3::new(1.0, 0.0, 0.0)
                .angle_degrees(Vector3::new(0.0, 2.0, 0.0))
                .unwrap();
            assert!((right - 90.0).abs() < 1e-12);
        }

        #[test]
        fn large_components_do_not_overflow_intermediates() {
            let a = Vector3::new(1e200, 0.0, 0.0);
            assert_eq!(angle_between(a, a), Some(0.0));
            let right = angle_between(a, Vector3::new(0.0, 1e200, 0.0)).unwrap();
            assert!((right - 90.0).abs() < 1e-12);
            assert!(angle_between(a, Vector3::new(f64::NAN, 0.0, 0.0)).is_none());

            let length = Vector3::new(3e200, 4e200, 0.0).magnitude();
            assert!(((length - 5e200) / 5e200).abs() < 1e-12);
            let diagonal = Vector3::new(1e200, 1e200, 0.0);
            assert_eq!(diagonal.dot(Vector3::new(1e200, -1e200, 0.0)), 0.0);
            assert_eq!(diagonal.cross(diagonal), Vector3::ZERO);
            assert_eq!(a.dot(a), f64::INFINITY);
        }

        #[test]
        fn perpendicular_rotation_ignores_z() {
            let d = Vector3::new(2.0, 1.0, 7.0);
            let rotated = d.perpendicular_xy();
            assert_eq!(rotated, Vector3::new(-1.0, 2.0, 0.0));
            assert!(rotated.dot(d.planar()).abs() < 1e-12);
        }

        #[test]
        fn midpoint_is_equidistant() {
            let a = Point3::new(-1.0, 4.0, 2.0);
            let b = Point3::new(5.0, 0.0, -2.0);
            let m = a.midpoint(b);
            assert_eq!(m, Point3::new(2.0, 2.0, 0.0));
            assert!((a.distance(m) - m.distance(b)).abs() < 1e-12);

            let far = Point3::new(1e308, -1e308, 0.0);
            assert_eq!(far.midpoint(far), far);
            assert_eq!(far.midpoint(Point3::new(-1e308, 1e308, 0.0)), Point3::ORIGIN);
        }
    }
}
